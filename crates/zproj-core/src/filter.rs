//! 坐标过滤器
//!
//! 将任意变换原地应用到 2D/3D 坐标上，供几何遍历逐点调用。

use crate::error::FilterError;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};

/// 可变坐标，`z` 为 NaN 表示没有 Z 值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: f64::NAN }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn has_z(&self) -> bool {
        !self.z.is_nan()
    }
}

/// 绑定到一个变换的坐标过滤器
#[derive(Debug, Clone)]
pub struct CoordinateFilter {
    transform: Transform,
}

impl CoordinateFilter {
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// 原地变换坐标
    ///
    /// 2D 变换保持 `z` 不变；3D 变换把缺失的 `z` 视为 0，且只在原坐标有 `z` 时写回。
    /// 任何底层失败都转换为 [`FilterError`]，坐标保持原值。
    pub fn filter(&self, coordinate: &mut Coordinate) -> Result<(), FilterError> {
        let dimensions = (
            self.transform.source_dimensions(),
            self.transform.target_dimensions(),
        );
        match dimensions {
            (2, 2) => {
                let out = self.transform.transform(&[coordinate.x, coordinate.y])?;
                coordinate.x = out[0];
                coordinate.y = out[1];
            }
            (3, 3) => {
                let z = if coordinate.has_z() { coordinate.z } else { 0.0 };
                let out = self.transform.transform(&[coordinate.x, coordinate.y, z])?;
                coordinate.x = out[0];
                coordinate.y = out[1];
                if coordinate.has_z() {
                    coordinate.z = out[2];
                }
            }
            (source, target) => {
                return Err(FilterError {
                    message: format!(
                        "cannot apply a {}D to {}D transform to a coordinate",
                        source, target
                    ),
                })
            }
        }
        Ok(())
    }

    /// 依次变换整个坐标序列，遇到第一个失败即停止
    pub fn filter_all(&self, coordinates: &mut [Coordinate]) -> Result<(), FilterError> {
        for (i, coordinate) in coordinates.iter_mut().enumerate() {
            self.filter(coordinate).map_err(|err| {
                tracing::debug!("coordinate filter aborted at index {}: {}", i, err);
                err
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::AffineTransform2D;
    use crate::math::approx_eq;
    use crate::matrix::Matrix;

    #[test]
    fn test_2d_filter_keeps_z() {
        let filter = CoordinateFilter::new(Transform::affine(AffineTransform2D::translation(1.0, 2.0)));
        let mut c = Coordinate::new_3d(1.0, 1.0, 7.0);
        filter.filter(&mut c).unwrap();
        assert_eq!(c, Coordinate::new_3d(2.0, 3.0, 7.0));

        let mut c = Coordinate::new(0.0, 0.0);
        filter.filter(&mut c).unwrap();
        assert!(!c.has_z());
        assert!(approx_eq(c.y, 2.0));
    }

    #[test]
    fn test_3d_filter() {
        let mut m = Matrix::identity(4);
        m.set(2, 3, 100.0);
        let filter = CoordinateFilter::new(Transform::from_matrix(&m).unwrap());

        let mut c = Coordinate::new_3d(1.0, 2.0, 3.0);
        filter.filter(&mut c).unwrap();
        assert!(approx_eq(c.z, 103.0));

        let mut c = Coordinate::new(1.0, 2.0);
        filter.filter(&mut c).unwrap();
        assert!(!c.has_z());
        assert!(approx_eq(c.x, 1.0));
    }

    #[test]
    fn test_filter_all_stops_on_failure() {
        // 第三行使 w = x，x 为 0 时无法变换
        let m = Matrix::from_rows(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[1.0, 0.0, 0.0]]).unwrap();
        let filter = CoordinateFilter::new(Transform::from_matrix(&m).unwrap());
        let mut coords = [
            Coordinate::new(2.0, 4.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(4.0, 4.0),
        ];
        assert!(filter.filter_all(&mut coords).is_err());
        assert!(approx_eq(coords[0].y, 2.0));
        // 失败之后的坐标未被处理
        assert_eq!((coords[2].x, coords[2].y), (4.0, 4.0));
    }
}
