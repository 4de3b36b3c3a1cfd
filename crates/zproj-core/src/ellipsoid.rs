//! 参考椭球
//!
//! 长半轴加短半轴或反扁率定义椭球；`ivf_definitive` 记录哪个参数是定义值，
//! 另一个由其推导，避免往返换算的浮点误差。

use crate::error::{Result, TransformError};
use crate::geodesic::{self, Geodesic};
use crate::math::Point2;
use serde::{Deserialize, Serialize};

/// 长度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearUnit {
    #[default]
    Metre,
    Kilometre,
    Foot,
    UsSurveyFoot,
}

impl LinearUnit {
    /// 一个单位对应的米数
    pub fn to_metres(&self) -> f64 {
        match self {
            LinearUnit::Metre => 1.0,
            LinearUnit::Kilometre => 1000.0,
            LinearUnit::Foot => 0.3048,
            LinearUnit::UsSurveyFoot => 1200.0 / 3937.0,
        }
    }

    /// 把以本单位表示的 `value` 换算到 `target` 单位
    pub fn convert(&self, value: f64, target: LinearUnit) -> f64 {
        if *self == target {
            return value;
        }
        value * self.to_metres() / target.to_metres()
    }
}

/// 参考椭球
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    pub name: String,
    semi_major_axis: f64,
    semi_minor_axis: f64,
    inverse_flattening: f64,
    ivf_definitive: bool,
    unit: LinearUnit,
}

impl Ellipsoid {
    /// WGS 84
    pub fn wgs84() -> Self {
        Self::build("WGS84", 6_378_137.0, f64::NAN, 298.257_223_563, true, LinearUnit::Metre)
    }

    /// GRS 1980
    pub fn grs80() -> Self {
        Self::build("GRS 1980", 6_378_137.0, f64::NAN, 298.257_222_101, true, LinearUnit::Metre)
    }

    /// Clarke 1866（短半轴为定义值）
    pub fn clarke_1866() -> Self {
        Self::build(
            "Clarke 1866",
            6_378_206.4,
            6_356_583.8,
            f64::NAN,
            false,
            LinearUnit::Metre,
        )
    }

    /// 由长短半轴创建
    pub fn from_axes(
        name: impl Into<String>,
        semi_major_axis: f64,
        semi_minor_axis: f64,
        unit: LinearUnit,
    ) -> Result<Self> {
        check_axis("semi_major_axis", semi_major_axis)?;
        check_axis("semi_minor_axis", semi_minor_axis)?;
        Ok(Self::build(name, semi_major_axis, semi_minor_axis, f64::NAN, false, unit))
    }

    /// 由长半轴和反扁率创建；反扁率为无穷大或 0 时为球体
    pub fn from_inverse_flattening(
        name: impl Into<String>,
        semi_major_axis: f64,
        inverse_flattening: f64,
        unit: LinearUnit,
    ) -> Result<Self> {
        check_axis("semi_major_axis", semi_major_axis)?;
        if inverse_flattening.is_nan() || inverse_flattening < 0.0 {
            return Err(TransformError::InvalidParameter {
                name: "inverse_flattening".to_string(),
                reason: format!("must be non-negative, found {}", inverse_flattening),
            });
        }
        if inverse_flattening == 0.0 || inverse_flattening.is_infinite() {
            return Self::sphere(name, semi_major_axis, unit);
        }
        Ok(Self::build(name, semi_major_axis, f64::NAN, inverse_flattening, true, unit))
    }

    /// 创建球体
    pub fn sphere(name: impl Into<String>, radius: f64, unit: LinearUnit) -> Result<Self> {
        check_axis("radius", radius)?;
        Ok(Self::build(name, radius, radius, f64::INFINITY, false, unit))
    }

    fn build(
        name: impl Into<String>,
        semi_major_axis: f64,
        semi_minor_axis: f64,
        inverse_flattening: f64,
        ivf_definitive: bool,
        unit: LinearUnit,
    ) -> Self {
        let (semi_minor_axis, inverse_flattening) = if ivf_definitive {
            (semi_major_axis * (1.0 - 1.0 / inverse_flattening), inverse_flattening)
        } else if semi_major_axis == semi_minor_axis {
            (semi_minor_axis, f64::INFINITY)
        } else {
            (
                semi_minor_axis,
                semi_major_axis / (semi_major_axis - semi_minor_axis),
            )
        };
        Self {
            name: name.into(),
            semi_major_axis,
            semi_minor_axis,
            inverse_flattening,
            ivf_definitive,
            unit,
        }
    }

    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_minor_axis
    }

    /// 反扁率，球体为正无穷
    pub fn inverse_flattening(&self) -> f64 {
        self.inverse_flattening
    }

    /// 反扁率是否为定义值
    pub fn is_ivf_definitive(&self) -> bool {
        self.ivf_definitive
    }

    pub fn unit(&self) -> LinearUnit {
        self.unit
    }

    pub fn flattening(&self) -> f64 {
        if self.inverse_flattening.is_infinite() {
            0.0
        } else {
            1.0 / self.inverse_flattening
        }
    }

    /// 第一偏心率
    pub fn eccentricity(&self) -> f64 {
        let f = self.flattening();
        (2.0 * f - f * f).sqrt()
    }

    pub fn is_sphere(&self) -> bool {
        self.semi_major_axis == self.semi_minor_axis
    }

    /// 两个地理坐标（经度、纬度，十进制度）之间的大地线距离，单位与椭球轴长相同
    pub fn orthodromic_distance(&self, from: &Point2, to: &Point2) -> Result<f64> {
        Ok(self.geodesic(from, to)?.distance)
    }

    /// 两点之间的大地线（距离与起点方位角）
    pub fn geodesic(&self, from: &Point2, to: &Point2) -> Result<Geodesic> {
        geodesic::inverse(self.semi_major_axis, self.flattening(), from, to)
    }
}

fn check_axis(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TransformError::InvalidParameter {
            name: name.to_string(),
            reason: format!("must be a positive length, found {}", value),
        })
    }
}
