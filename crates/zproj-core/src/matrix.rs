//! 通用矩阵代数
//!
//! 行列数在构造时固定、元素可变的数值矩阵，基于 `nalgebra::DMatrix`。
//!
//! - 每个原地操作（`invert`、`multiply_mut` 等）都有一个纯函数版本，
//!   以及写入调用方提供的目标矩阵的 `*_into` 版本
//! - `PartialEq`/`Hash` 按位比较元素，可作为稳定的集合/映射键；
//!   近似比较请使用 [`Matrix::equals`]

use crate::error::{Result, TransformError};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 数值矩阵
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matrix {
    data: DMatrix<f64>,
}

impl Matrix {
    /// 创建全零矩阵
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: DMatrix::zeros(rows, cols),
        }
    }

    /// 创建 `size`×`size` 单位矩阵
    pub fn identity(size: usize) -> Self {
        Self {
            data: DMatrix::identity(size, size),
        }
    }

    /// 创建对角线为 1 的矩形矩阵
    pub fn identity_rect(rows: usize, cols: usize) -> Self {
        Self {
            data: DMatrix::identity(rows, cols),
        }
    }

    /// 按行主序从切片创建
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(TransformError::MatrixShape {
                rows,
                cols,
                expected: format!("{} values", values.len()),
            });
        }
        Ok(Self {
            data: DMatrix::from_row_slice(rows, cols, values),
        })
    }

    /// 从行数组创建，所有行必须等长
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(TransformError::MatrixShape {
                rows: rows.len(),
                cols: bad.len(),
                expected: format!("rows of length {}", cols),
            });
        }
        let values: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::from_row_slice(rows.len(), cols, &values)
    }

    pub fn from_dmatrix(data: DMatrix<f64>) -> Self {
        Self { data }
    }

    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn row_count(&self) -> usize {
        self.data.nrows()
    }

    pub fn col_count(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_square(&self) -> bool {
        self.row_count() == self.col_count()
    }

    /// 获取元素
    ///
    /// # Panics
    /// 索引越界时 panic，与切片索引一致
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// 设置元素
    ///
    /// # Panics
    /// 索引越界时 panic
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[(row, col)] = value;
    }

    /// 按行主序导出所有元素
    pub fn to_row_vec(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.row_count() * self.col_count());
        for r in 0..self.row_count() {
            for c in 0..self.col_count() {
                values.push(self.data[(r, c)]);
            }
        }
        values
    }

    /// 原地重置为单位矩阵（对角线为 1，其余为 0）
    pub fn set_identity(&mut self) {
        self.data.fill_with_identity();
    }

    /// 是否在容差内为单位矩阵
    ///
    /// 非方阵也可以是"单位"的：对角线为 1、其余为 0。
    pub fn is_identity(&self, tolerance: f64) -> bool {
        let tolerance = tolerance.abs();
        for r in 0..self.row_count() {
            for c in 0..self.col_count() {
                let expected = if r == c { 1.0 } else { 0.0 };
                if !((self.data[(r, c)] - expected).abs() <= tolerance) {
                    return false;
                }
            }
        }
        true
    }

    /// 最后一行是否为 `[0 … 0 1]`（不要求方阵）
    pub fn is_affine(&self) -> bool {
        if self.row_count() == 0 || self.col_count() == 0 {
            return false;
        }
        let (last_row, last_col) = (self.row_count() - 1, self.col_count() - 1);
        (0..self.col_count()).all(|c| {
            let expected = if c == last_col { 1.0 } else { 0.0 };
            self.data[(last_row, c)] == expected
        })
    }

    /// 容差内逐元素比较
    pub fn equals(&self, other: &Matrix, tolerance: f64) -> bool {
        self.data.shape() == other.data.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    // ------------------------------------------------------------------
    // 转置
    // ------------------------------------------------------------------

    pub fn transpose(&self) -> Matrix {
        Self {
            data: self.data.transpose(),
        }
    }

    /// 转置写入 `dst`，`dst` 必须是 cols×rows
    pub fn transpose_into(&self, dst: &mut Matrix) -> Result<()> {
        if dst.row_count() != self.col_count() || dst.col_count() != self.row_count() {
            return Err(dst.shape_error(format!(
                "{}x{}",
                self.col_count(),
                self.row_count()
            )));
        }
        self.data.transpose_to(&mut dst.data);
        Ok(())
    }

    /// 原地转置，仅适用于方阵（行列数不可改变）
    pub fn transpose_mut(&mut self) -> Result<()> {
        self.require_square()?;
        self.data.transpose_mut();
        Ok(())
    }

    // ------------------------------------------------------------------
    // 行列式与求逆
    // ------------------------------------------------------------------

    pub fn determinant(&self) -> Result<f64> {
        self.require_square()?;
        Ok(self.data.determinant())
    }

    /// 逆矩阵
    ///
    /// 行列式恰好为零（或非有限值）时返回 `SingularMatrix`。
    /// 接近零时是否视为奇异由调用方决定。
    pub fn inverse(&self) -> Result<Matrix> {
        let det = self.determinant()?;
        if det == 0.0 || !det.is_finite() {
            return Err(TransformError::SingularMatrix);
        }
        self.data
            .clone()
            .try_inverse()
            .map(Matrix::from_dmatrix)
            .ok_or(TransformError::SingularMatrix)
    }

    /// 求逆写入 `dst`，`dst` 必须与自身同形
    pub fn invert_into(&self, dst: &mut Matrix) -> Result<()> {
        if dst.data.shape() != self.data.shape() {
            return Err(dst.shape_error(format!("{}x{}", self.row_count(), self.col_count())));
        }
        *dst = self.inverse()?;
        Ok(())
    }

    /// 原地求逆；失败时自身保持不变
    pub fn invert(&mut self) -> Result<()> {
        *self = self.inverse()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // 乘法与加法
    // ------------------------------------------------------------------

    /// 矩阵乘积 `self × other`
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.col_count() != other.row_count() {
            return Err(TransformError::MatrixShape {
                rows: other.row_count(),
                cols: other.col_count(),
                expected: format!("{} rows", self.col_count()),
            });
        }
        Ok(Self {
            data: &self.data * &other.data,
        })
    }

    /// 乘积写入 `dst`
    pub fn multiply_into(&self, other: &Matrix, dst: &mut Matrix) -> Result<()> {
        let product = self.multiply(other)?;
        if dst.data.shape() != product.data.shape() {
            return Err(dst.shape_error(format!(
                "{}x{}",
                product.row_count(),
                product.col_count()
            )));
        }
        *dst = product;
        Ok(())
    }

    /// 原地乘法 `self = self × other`，要求 `other` 为 cols×cols 方阵
    pub fn multiply_mut(&mut self, other: &Matrix) -> Result<()> {
        if !other.is_square() || other.row_count() != self.col_count() {
            return Err(other.shape_error(format!(
                "{}x{}",
                self.col_count(),
                self.col_count()
            )));
        }
        self.data = &self.data * &other.data;
        Ok(())
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.require_same_shape(other)?;
        Ok(Self {
            data: &self.data + &other.data,
        })
    }

    pub fn add_into(&self, other: &Matrix, dst: &mut Matrix) -> Result<()> {
        self.require_same_shape(other)?;
        self.require_same_shape(dst)?;
        dst.data.copy_from(&self.data);
        dst.data += &other.data;
        Ok(())
    }

    pub fn add_mut(&mut self, other: &Matrix) -> Result<()> {
        self.require_same_shape(other)?;
        self.data += &other.data;
        Ok(())
    }

    fn require_square(&self) -> Result<()> {
        if self.is_square() {
            Ok(())
        } else {
            Err(self.shape_error("a square matrix".to_string()))
        }
    }

    fn require_same_shape(&self, other: &Matrix) -> Result<()> {
        if self.data.shape() == other.data.shape() {
            Ok(())
        } else {
            Err(other.shape_error(format!("{}x{}", self.row_count(), self.col_count())))
        }
    }

    fn shape_error(&self, expected: String) -> TransformError {
        TransformError::MatrixShape {
            rows: self.row_count(),
            cols: self.col_count(),
            expected,
        }
    }
}

impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.data.shape() == other.data.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Matrix {}

impl Hash for Matrix {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.shape().hash(state);
        for v in self.data.iter() {
            v.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.row_count() {
            write!(f, "[")?;
            for c in 0..self.col_count() {
                if c > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.data[(r, c)])?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
