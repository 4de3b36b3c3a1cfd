//! ZPROJ 命令行程序
//! 解析变换文本并应用到坐标，计算大地线距离，查询基准转换路径

mod config;
mod input;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use zproj_core::datum_shift::DatumShiftResolver;
use zproj_core::filter::{Coordinate, CoordinateFilter};
use zproj_core::math::Point2;
use zproj_wkt::{to_wkt_with, Element, WktAnalyzer};

use crate::config::{well_known_ellipsoid, AppConfig, CatalogFile};
use crate::input::{format_coordinate, InputParser};

/// 坐标变换工具
#[derive(Parser)]
#[command(name = "zproj", version, about = "Coordinate transform toolkit")]
struct Cli {
    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 输出更多日志（可重复）
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a transform to coordinates
    Transform {
        /// Transform text, or @path to read it from a file
        wkt: String,
        /// Coordinates: x,y  x,y,z  @dx,dy  @length<angle
        #[arg(required = true, allow_hyphen_values = true)]
        coordinates: Vec<String>,
    },

    /// Apply the inverse of a transform to coordinates
    Inverse {
        /// Transform text, or @path to read it from a file
        wkt: String,
        #[arg(required = true, allow_hyphen_values = true)]
        coordinates: Vec<String>,
    },

    /// Print the element tree and the normalized transform text
    Format {
        /// Transform text, or @path to read it from a file
        wkt: String,
    },

    /// Geodesic distance between two lon,lat points (degrees)
    Distance {
        /// wgs84, grs80, clarke1866 or sphere
        #[arg(long, default_value = "wgs84")]
        ellipsoid: String,
        #[arg(allow_hyphen_values = true)]
        from: String,
        #[arg(allow_hyphen_values = true)]
        to: String,
    },

    /// Resolve the datum shift matrix between two datums of a catalog
    DatumPath {
        /// JSON datum catalog
        catalog: PathBuf,
        source: String,
        target: String,
    },
}

fn log_level(verbose: u8, configured: &str) -> Level {
    match verbose {
        0 => configured.parse().unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// `@path` 读取文件，否则原样返回
fn read_wkt(argument: &str) -> Result<String> {
    match argument.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("reading transform from {}", path)),
        None => Ok(argument.to_string()),
    }
}

fn apply(filter: &CoordinateFilter, coordinates: &[String]) -> Result<()> {
    let mut points = InputParser::parse_all(coordinates.iter().map(String::as_str))?;
    filter.filter_all(&mut points)?;
    for point in &points {
        println!("{}", format_coordinate(point));
    }
    Ok(())
}

fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let analyzer = WktAnalyzer::new(config.analyzer.clone());

    match cli.command {
        Commands::Transform { wkt, coordinates } => {
            let analysis = analyzer.parse(&read_wkt(&wkt)?)?;
            info!(
                "transform {} -> {} dimensions",
                analysis.transform.source_dimensions(),
                analysis.transform.target_dimensions()
            );
            apply(&analysis.filter, &coordinates)
        }
        Commands::Inverse { wkt, coordinates } => {
            let analysis = analyzer.parse(&read_wkt(&wkt)?)?;
            let inverse = analysis.transform.inverse()?;
            apply(&CoordinateFilter::new(inverse), &coordinates)
        }
        Commands::Format { wkt } => {
            let text = read_wkt(&wkt)?;
            let element = Element::parse(&text)?;
            println!("{}", element);
            match analyzer.analyze(&element)? {
                Some(analysis) => println!("{}", to_wkt_with(&analysis.transform, analyzer.options())),
                None => println!("({} is not a math transform)", element.keyword()),
            }
            Ok(())
        }
        Commands::Distance { ellipsoid, from, to } => {
            let ellipsoid = well_known_ellipsoid(&ellipsoid)?;
            let from = InputParser::parse(&from, None)?;
            let to = InputParser::parse(&to, None)?;
            let geodesic = ellipsoid.geodesic(&lon_lat(&from), &lon_lat(&to))?;
            println!("{:.3} ({:?})", geodesic.distance, ellipsoid.unit());
            println!("azimuth {:.6}", geodesic.azimuth);
            Ok(())
        }
        Commands::DatumPath {
            catalog,
            source,
            target,
        } => {
            let catalog = CatalogFile::load(&catalog)?.build()?;
            let find = |name: &str| {
                catalog
                    .find(name)
                    .with_context(|| format!("unknown datum '{}'", name))
            };
            let (source_id, target_id) = (find(&source)?, find(&target)?);
            match DatumShiftResolver::new(&catalog).resolve(source_id, target_id)? {
                Some(matrix) => println!("{}", matrix),
                None => println!("no path from {} to {}", source, target),
            }
            Ok(())
        }
    }
}

fn lon_lat(c: &Coordinate) -> Point2 {
    Point2::new(c.x, c.y)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    // 初始化日志
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(log_level(cli.verbose, &config.log_level))
            .with_writer(std::io::stderr)
            .finish(),
    )?;

    if config.analyzer.default_trailing_ordinates > 0 {
        info!(
            "PASSTHROUGH_MT defaults to {} trailing ordinates",
            config.analyzer.default_trailing_ordinates
        );
    }

    run(cli, config)
}
