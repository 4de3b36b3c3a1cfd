//! 2D仿射变换适配器
//!
//! 以 2×3 系数矩阵表示的缩放/错切/平移映射：
//!
//! ```text
//! | x' |   | m00 m01 m02 |   | x |
//! | y' | = | m10 m11 m12 | * | y |
//! | 1  |   |  0   0   1  |   | 1 |
//! ```
//!
//! 适配器构造后不可变；逆变换在首次使用时计算并缓存。

use crate::error::{Result, TransformError};
use crate::math::{BoundingBox2, Point2};
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// 2D仿射变换
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffineTransform2D {
    m00: f64,
    m01: f64,
    m02: f64,
    m10: f64,
    m11: f64,
    m12: f64,
    /// 逆变换系数缓存（`None` 表示不可逆）
    #[serde(skip)]
    inverse: OnceLock<Option<[f64; 6]>>,
}

impl AffineTransform2D {
    /// 按行给出六个系数
    pub fn new(m00: f64, m01: f64, m02: f64, m10: f64, m11: f64, m12: f64) -> Self {
        Self {
            m00,
            m01,
            m02,
            m10,
            m11,
            m12,
            inverse: OnceLock::new(),
        }
    }

    fn from_coefficients(c: [f64; 6]) -> Self {
        Self::new(c[0], c[1], c[2], c[3], c[4], c[5])
    }

    /// 创建单位变换
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// 创建平移变换
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::new(1.0, 0.0, dx, 0.0, 1.0, dy)
    }

    /// 创建缩放变换（绕原点）
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, 0.0, sy, 0.0)
    }

    /// 创建旋转变换（绕原点，弧度）
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, -sin, 0.0, sin, cos, 0.0)
    }

    /// 从 3×3 仿射矩阵创建，最后一行必须是 `[0 0 1]`
    pub fn from_matrix(matrix: &Matrix) -> Result<Self> {
        if matrix.row_count() != 3 || matrix.col_count() != 3 || !matrix.is_affine() {
            return Err(TransformError::MatrixShape {
                rows: matrix.row_count(),
                cols: matrix.col_count(),
                expected: "a 3x3 affine matrix".to_string(),
            });
        }
        Ok(Self::new(
            matrix.get(0, 0),
            matrix.get(0, 1),
            matrix.get(0, 2),
            matrix.get(1, 0),
            matrix.get(1, 1),
            matrix.get(1, 2),
        ))
    }

    /// 转换为 3×3 矩阵
    pub fn to_matrix(&self) -> Matrix {
        let mut m = Matrix::identity(3);
        let c = self.coefficients();
        for (i, v) in c.iter().enumerate() {
            m.set(i / 3, i % 3, *v);
        }
        m
    }

    /// 行主序的六个系数 `[m00, m01, m02, m10, m11, m12]`
    pub fn coefficients(&self) -> [f64; 6] {
        [self.m00, self.m01, self.m02, self.m10, self.m11, self.m12]
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// 组合两个变换（self 在后，other 在前）
    pub fn then(&self, other: &AffineTransform2D) -> Self {
        let (a, b) = (self, other);
        Self::new(
            a.m00 * b.m00 + a.m01 * b.m10,
            a.m00 * b.m01 + a.m01 * b.m11,
            a.m00 * b.m02 + a.m01 * b.m12 + a.m02,
            a.m10 * b.m00 + a.m11 * b.m10,
            a.m10 * b.m01 + a.m11 * b.m11,
            a.m10 * b.m02 + a.m11 * b.m12 + a.m12,
        )
    }

    /// 变换一个点
    pub fn transform_point(&self, point: &Point2) -> Point2 {
        Point2::new(
            self.m00 * point.x + self.m01 * point.y + self.m02,
            self.m10 * point.x + self.m11 * point.y + self.m12,
        )
    }

    /// 变换包围盒
    ///
    /// 映射四个角点后取新的轴对齐包围盒。对旋转/错切变换这是保守的外包框。
    pub fn transform_bounds(&self, bounds: &BoundingBox2) -> BoundingBox2 {
        if bounds.is_empty() {
            return *bounds;
        }
        BoundingBox2::from_points(bounds.corners().iter().map(|p| self.transform_point(p)))
    }

    /// 用逆变换映射包围盒，不可逆时失败
    pub fn inverse_transform_bounds(&self, bounds: &BoundingBox2) -> Result<BoundingBox2> {
        Ok(self.inverse()?.transform_bounds(bounds))
    }

    /// 用逆变换映射一个点
    pub fn inverse_transform_point(&self, point: &Point2) -> Result<Point2> {
        let c = self.inverse_coefficients()?;
        Ok(Point2::new(
            c[0] * point.x + c[1] * point.y + c[2],
            c[3] * point.x + c[4] * point.y + c[5],
        ))
    }

    fn inverse_coefficients(&self) -> Result<[f64; 6]> {
        let cached = self.inverse.get_or_init(|| {
            let det = self.determinant();
            if det == 0.0 || !det.is_finite() {
                return None;
            }
            let (a, b, c, d, e, f) = (self.m00, self.m01, self.m02, self.m10, self.m11, self.m12);
            Some([
                e / det,
                -b / det,
                (b * f - c * e) / det,
                -d / det,
                a / det,
                (c * d - a * f) / det,
            ])
        });
        cached.ok_or(TransformError::SingularMatrix)
    }

    /// 获取逆变换
    ///
    /// 返回的适配器已预先缓存本变换作为其逆，因此 `inverse(inverse(t))` 与 `t` 系数一致。
    pub fn inverse(&self) -> Result<Self> {
        let coefficients = self.inverse_coefficients()?;
        let inverse = Self::from_coefficients(coefficients);
        let _ = inverse.inverse.set(Some(self.coefficients()));
        Ok(inverse)
    }

    pub fn is_invertible(&self) -> bool {
        self.inverse_coefficients().is_ok()
    }

    /// 是否在容差内为单位变换
    pub fn is_identity(&self, tolerance: f64) -> bool {
        let tolerance = tolerance.abs();
        let expected = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        self.coefficients()
            .iter()
            .zip(expected.iter())
            .all(|(v, e)| (v - e).abs() <= tolerance)
    }

    /// 消除反复组合带来的浮点漂移
    ///
    /// 仅当所有系数都在 `tolerance` 内接近整数，且取整后两行都不全为零时，
    /// 才整体取整；否则原样返回。
    pub fn round(&self, tolerance: f64) -> Self {
        let tolerance = tolerance.abs();
        let coefficients = self.coefficients();
        let mut rounded = [0.0; 6];
        for (dst, v) in rounded.iter_mut().zip(coefficients.iter()) {
            let r = v.round();
            if !((v - r).abs() <= tolerance) {
                return self.clone();
            }
            *dst = r;
        }
        let row0_zero = rounded[0] == 0.0 && rounded[1] == 0.0;
        let row1_zero = rounded[3] == 0.0 && rounded[4] == 0.0;
        if row0_zero || row1_zero {
            return self.clone();
        }
        Self::from_coefficients(rounded)
    }
}

impl Default for AffineTransform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl PartialEq for AffineTransform2D {
    fn eq(&self, other: &Self) -> bool {
        self.coefficients()
            .iter()
            .zip(other.coefficients().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for AffineTransform2D {}

impl Hash for AffineTransform2D {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for v in self.coefficients() {
            v.to_bits().hash(state);
        }
    }
}
