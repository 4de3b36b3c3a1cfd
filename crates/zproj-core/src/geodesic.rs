//! 大地线计算
//!
//! 椭球上使用 Vincenty 反算公式；球体使用大圆公式。
//! 近对跖点时 Vincenty 迭代可能不收敛，此时退回平均半径球上的大圆距离。

use crate::error::{Result, TransformError};
use crate::math::Point2;

/// Vincenty 迭代的最大次数
const MAX_ITERATIONS: usize = 100;

/// λ 收敛阈值（弧度）
const CONVERGENCE: f64 = 1e-12;

/// 大地线反算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodesic {
    /// 距离，单位与长半轴相同
    pub distance: f64,
    /// 起点处的方位角（度，自北顺时针，0..360）
    pub azimuth: f64,
}

fn check_point(p: &Point2) -> Result<()> {
    if !p.x.is_finite() || !p.y.is_finite() || p.y.abs() > 90.0 {
        return Err(TransformError::OutOfDomain(format!(
            "({}, {}) is not a valid longitude/latitude",
            p.x, p.y
        )));
    }
    Ok(())
}

fn normalize_azimuth(radians: f64) -> f64 {
    let deg = radians.to_degrees();
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

/// 球面大圆距离与方位角
fn great_circle(radius: f64, from: &Point2, to: &Point2) -> Geodesic {
    let (lat1, lat2) = (from.y.to_radians(), to.y.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (to.x - from.x).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let central = 2.0 * h.sqrt().min(1.0).asin();
    let azimuth = (dlon.sin() * lat2.cos())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos());

    Geodesic {
        distance: radius * central,
        azimuth: normalize_azimuth(azimuth),
    }
}

/// 大地线反算
///
/// `a` 为长半轴，`f` 为扁率；点为（经度, 纬度）十进制度。
pub fn inverse(a: f64, f: f64, from: &Point2, to: &Point2) -> Result<Geodesic> {
    check_point(from)?;
    check_point(to)?;
    if f == 0.0 {
        return Ok(great_circle(a, from, to));
    }

    let b = a * (1.0 - f);
    let l = (to.x - from.x).to_radians();
    let u1 = ((1.0 - f) * from.y.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * to.y.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;
    let (mut sin_sigma, mut cos_sigma, mut sigma) = (0.0, 0.0, 0.0);
    let (mut cos_sq_alpha, mut cos_2sigma_m) = (0.0, 0.0);
    let (mut sin_lambda, mut cos_lambda) = (0.0, 0.0);

    for _ in 0..MAX_ITERATIONS {
        (sin_lambda, cos_lambda) = lambda.sin_cos();
        sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // 重合点
            return Ok(Geodesic {
                distance: 0.0,
                azimuth: 0.0,
            });
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // 赤道线上 cos²α = 0
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));
        if (lambda - previous).abs() < CONVERGENCE {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::debug!(
            "Vincenty inverse did not converge between {} and {}, using great circle",
            from,
            to
        );
        return Ok(great_circle((2.0 * a + b) / 3.0, from, to));
    }

    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

    let distance = b * big_a * (sigma - delta_sigma);
    let azimuth = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);

    Ok(Geodesic {
        distance,
        azimuth: normalize_azimuth(azimuth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGS84_A: f64 = 6_378_137.0;
    const WGS84_F: f64 = 1.0 / 298.257_223_563;

    #[test]
    fn test_one_degree_on_equator() {
        let g = inverse(WGS84_A, WGS84_F, &Point2::new(0.0, 0.0), &Point2::new(1.0, 0.0)).unwrap();
        assert!((g.distance - 111_319.491).abs() < 0.01);
        assert!((g.azimuth - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let g = inverse(WGS84_A, WGS84_F, &Point2::new(0.0, 0.0), &Point2::new(0.0, 1.0)).unwrap();
        assert!((g.distance - 110_574.389).abs() < 0.01);
        assert!((g.distance - 111_320.0).abs() < 1_000.0);
        assert!(g.azimuth.abs() < 1e-9);
    }

    #[test]
    fn test_flinders_peak_to_buninyong() {
        // Vincenty 原论文的经典算例
        let flinders = Point2::new(144.0 + 25.0 / 60.0 + 29.52440 / 3600.0, -(37.0 + 57.0 / 60.0 + 3.72030 / 3600.0));
        let buninyong = Point2::new(143.0 + 55.0 / 60.0 + 35.38390 / 3600.0, -(37.0 + 39.0 / 60.0 + 10.15610 / 3600.0));
        let grs80_f = 1.0 / 298.257_222_101;
        let g = inverse(6_378_137.0, grs80_f, &flinders, &buninyong).unwrap();
        assert!((g.distance - 54_972.271).abs() < 0.01);
        assert!((g.azimuth - (306.0 + 52.0 / 60.0 + 5.37 / 3600.0)).abs() < 1e-4);
    }

    #[test]
    fn test_coincident_points() {
        let p = Point2::new(12.5, 41.9);
        assert_eq!(inverse(WGS84_A, WGS84_F, &p, &p).unwrap().distance, 0.0);
    }

    #[test]
    fn test_sphere_quarter_meridian() {
        let r = 6_371_000.0;
        let g = inverse(r, 0.0, &Point2::new(0.0, 0.0), &Point2::new(0.0, 90.0)).unwrap();
        assert!((g.distance - r * std::f64::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_falls_back() {
        let g = inverse(WGS84_A, WGS84_F, &Point2::new(0.0, 0.0), &Point2::new(179.7, 0.5)).unwrap();
        assert!(g.distance > 19_900_000.0 && g.distance < 20_100_000.0);
    }

    #[test]
    fn test_invalid_latitude() {
        assert!(inverse(WGS84_A, WGS84_F, &Point2::new(0.0, 91.0), &Point2::new(0.0, 0.0)).is_err());
    }
}
