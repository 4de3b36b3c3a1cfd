//! 配置文件与基准目录文件

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use zproj_core::datum::{BursaWolfParameters, Datum, DatumCatalog};
use zproj_core::ellipsoid::{Ellipsoid, LinearUnit};
use zproj_wkt::AnalyzerOptions;

/// 程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 日志级别（error/warn/info/debug/trace），命令行 `-v` 优先
    pub log_level: String,

    pub analyzer: AnalyzerOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            analyzer: AnalyzerOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// 椭球描述：已知名称或自定义参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EllipsoidSpec {
    Named(String),
    Custom {
        name: String,
        semi_major_axis: f64,
        #[serde(default)]
        semi_minor_axis: Option<f64>,
        #[serde(default)]
        inverse_flattening: Option<f64>,
        #[serde(default)]
        unit: LinearUnit,
    },
}

impl EllipsoidSpec {
    pub fn build(&self) -> Result<Ellipsoid> {
        match self {
            EllipsoidSpec::Named(name) => well_known_ellipsoid(name),
            EllipsoidSpec::Custom {
                name,
                semi_major_axis,
                semi_minor_axis,
                inverse_flattening,
                unit,
            } => {
                let ellipsoid = match (inverse_flattening, semi_minor_axis) {
                    (Some(ivf), _) => {
                        Ellipsoid::from_inverse_flattening(name.as_str(), *semi_major_axis, *ivf, *unit)
                    }
                    (None, Some(b)) => Ellipsoid::from_axes(name.as_str(), *semi_major_axis, *b, *unit),
                    (None, None) => Ellipsoid::sphere(name.as_str(), *semi_major_axis, *unit),
                };
                ellipsoid.with_context(|| format!("ellipsoid {}", name))
            }
        }
    }
}

/// 按名称取内置椭球
pub fn well_known_ellipsoid(name: &str) -> Result<Ellipsoid> {
    let normalized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    Ok(match normalized.as_str() {
        "wgs84" => Ellipsoid::wgs84(),
        "grs80" => Ellipsoid::grs80(),
        "clarke1866" => Ellipsoid::clarke_1866(),
        "sphere" => Ellipsoid::sphere("Sphere", 6_371_000.0, LinearUnit::Metre)?,
        _ => bail!("unknown ellipsoid '{}'", name),
    })
}

/// 目录文件中的一条转换参数，目标按名称引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSpec {
    pub target: String,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    #[serde(default)]
    pub dz: f64,
    #[serde(default)]
    pub ex: f64,
    #[serde(default)]
    pub ey: f64,
    #[serde(default)]
    pub ez: f64,
    #[serde(default)]
    pub ppm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatumSpec {
    pub name: String,
    #[serde(default)]
    pub ellipsoid: Option<EllipsoidSpec>,
    #[serde(default)]
    pub shifts: Vec<ShiftSpec>,
}

/// 基准目录文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub datums: Vec<DatumSpec>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading datum catalog {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing datum catalog {}", path.display()))
    }

    /// 构建基准目录：先登记全部基准，再按名称连接转换参数
    pub fn build(&self) -> Result<DatumCatalog> {
        let mut catalog = DatumCatalog::new();
        for spec in &self.datums {
            if catalog.find(&spec.name).is_some() {
                bail!("duplicate datum '{}'", spec.name);
            }
            let mut datum = Datum::new(spec.name.as_str());
            if let Some(ellipsoid) = &spec.ellipsoid {
                datum = datum.with_ellipsoid(ellipsoid.build()?);
            }
            catalog.add(datum);
        }

        for spec in &self.datums {
            let source = catalog
                .find(&spec.name)
                .with_context(|| format!("datum '{}' vanished", spec.name))?;
            for shift in &spec.shifts {
                let target = catalog.find(&shift.target).with_context(|| {
                    format!("datum '{}' shifts to unknown datum '{}'", spec.name, shift.target)
                })?;
                catalog.add_shift(
                    source,
                    BursaWolfParameters {
                        target,
                        dx: shift.dx,
                        dy: shift.dy,
                        dz: shift.dz,
                        ex: shift.ex,
                        ey: shift.ey,
                        ez: shift.ez,
                        ppm: shift.ppm,
                    },
                );
            }
        }
        tracing::debug!("loaded {} datums", catalog.len());
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zproj_core::datum_shift::DatumShiftResolver;

    const CATALOG: &str = r#"{
        "datums": [
            { "name": "WGS84", "ellipsoid": "WGS 84" },
            { "name": "ED50",
              "ellipsoid": { "name": "International 1924", "semi_major_axis": 6378388.0, "inverse_flattening": 297.0 },
              "shifts": [ { "target": "WGS84", "dx": -87, "dy": -98, "dz": -121 } ] },
            { "name": "NAD27", "ellipsoid": "clarke_1866",
              "shifts": [ { "target": "WGS84", "dx": -8, "dy": 160, "dz": 176 } ] }
        ]
    }"#;

    #[test]
    fn test_catalog_file_builds_graph() {
        let file: CatalogFile = serde_json::from_str(CATALOG).unwrap();
        let catalog = file.build().unwrap();
        assert_eq!(catalog.len(), 3);

        let ed50 = catalog.find("ed50").unwrap();
        let nad27 = catalog.find("NAD27").unwrap();
        let ellipsoid = catalog.get(ed50).unwrap().ellipsoid.as_ref().unwrap();
        assert_eq!(ellipsoid.inverse_flattening(), 297.0);

        let m = DatumShiftResolver::new(&catalog)
            .resolve(ed50, nad27)
            .unwrap()
            .unwrap();
        assert!((m.get(0, 3) - (-87.0 + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_shift_target() {
        let file: CatalogFile = serde_json::from_str(
            r#"{ "datums": [ { "name": "A", "shifts": [ { "target": "B", "dx": 1 } ] } ] }"#,
        )
        .unwrap();
        assert!(file.build().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "analyzer": { "default_trailing_ordinates": 1 } }"#).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.analyzer.default_trailing_ordinates, 1);
        assert!(config.analyzer.factory.use_pool);
    }

    #[test]
    fn test_well_known_ellipsoids() {
        assert_eq!(well_known_ellipsoid("GRS 80").unwrap().semi_major_axis(), 6_378_137.0);
        assert!(well_known_ellipsoid("sphere").unwrap().is_sphere());
        assert!(well_known_ellipsoid("bessel").is_err());
    }
}
