//! 操作方法
//!
//! 参数化变换由按分类名注册的操作方法构建：
//! - `ParameterValues`: 有序的参数名/值表
//! - `OperationMethod`: 由参数表构建变换的提供者
//! - `ParameterizedTransform`: 方法自带数学实现的变换
//! - `AffineMethod`: 内置的 `"Affine"` 方法（`elt_<行>_<列>` 参数）

use crate::error::{Result, TransformError};
use crate::matrix::Matrix;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 参数值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(v) => Some(*v),
            ParameterValue::Text(_) => None,
        }
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParameterValue::Number(a), ParameterValue::Number(b)) => a.to_bits() == b.to_bits(),
            (ParameterValue::Text(a), ParameterValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParameterValue {}

impl Hash for ParameterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ParameterValue::Number(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            ParameterValue::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Number(v) => write!(f, "{}", v),
            ParameterValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Number(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::Text(s.to_string())
    }
}

/// 有序参数表
///
/// 参数名查找不区分大小写；同名参数后设置的覆盖先设置的。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterValues {
    entries: Vec<(String, ParameterValue)>,
}

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置参数，返回自身便于链式调用
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    /// 读取数值参数，缺省时返回 `default`，值为文本时报错
    pub fn number_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(ParameterValue::Number(v)) => Ok(*v),
            Some(ParameterValue::Text(s)) => Err(TransformError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a number, found \"{}\"", s),
            }),
        }
    }

    /// 读取必需的数值参数
    pub fn require_number(&self, name: &str) -> Result<f64> {
        if self.get(name).is_none() {
            return Err(TransformError::InvalidParameter {
                name: name.to_string(),
                reason: "missing value".to_string(),
            });
        }
        self.number_or(name, f64::NAN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 由方法自身实现坐标运算的变换
pub trait ParameterizedTransform: Send + Sync + fmt::Debug {
    /// 构建此变换的方法分类名
    fn method_name(&self) -> &str;

    /// 构建时使用的参数
    fn parameters(&self) -> &ParameterValues;

    fn source_dimensions(&self) -> usize {
        2
    }

    fn target_dimensions(&self) -> usize {
        2
    }

    /// 正向变换，`src`/`dst` 长度分别等于源/目标维数
    fn transform(&self, src: &[f64], dst: &mut [f64]) -> Result<()>;

    /// 逆向变换
    fn inverse_transform(&self, _src: &[f64], _dst: &mut [f64]) -> Result<()> {
        Err(TransformError::NoInverse {
            method: self.method_name().to_string(),
        })
    }

    fn is_invertible(&self) -> bool {
        false
    }
}

/// 操作方法提供者
///
/// 由外部按分类名注册（如 `"Transverse_Mercator"`），工厂只负责查询。
pub trait OperationMethod: Send + Sync + fmt::Debug {
    /// 分类名
    fn name(&self) -> &str;

    /// 别名
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// 由参数表构建变换
    fn create(&self, parameters: &ParameterValues) -> Result<Transform>;
}

/// 矩阵参数的最大行/列数
const MAX_MATRIX_SIZE: usize = 32;

/// 内置仿射方法
///
/// 参数 `num_row`、`num_col`（默认 3）以及 `elt_<行>_<列>`（默认单位矩阵）。
#[derive(Debug, Default)]
pub struct AffineMethod;

impl AffineMethod {
    pub const NAME: &'static str = "Affine";

    fn size(parameters: &ParameterValues, name: &str) -> Result<usize> {
        let value = parameters.number_or(name, 3.0)?;
        if value.fract() != 0.0 || value < 1.0 || value > MAX_MATRIX_SIZE as f64 {
            return Err(TransformError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected an integer in 1..={}, found {}", MAX_MATRIX_SIZE, value),
            });
        }
        Ok(value as usize)
    }

    /// 从参数表构建矩阵
    pub fn matrix(parameters: &ParameterValues) -> Result<Matrix> {
        let rows = Self::size(parameters, "num_row")?;
        let cols = Self::size(parameters, "num_col")?;
        let mut matrix = Matrix::identity_rect(rows, cols);
        // 最后一行默认是 [0 … 0 1]
        if rows != cols {
            for c in 0..cols {
                matrix.set(rows - 1, c, if c == cols - 1 { 1.0 } else { 0.0 });
            }
        }

        for (name, value) in parameters.iter() {
            let lower = name.to_ascii_lowercase();
            let Some(indices) = lower.strip_prefix("elt_") else {
                if lower != "num_row" && lower != "num_col" {
                    tracing::debug!("Affine: ignoring unknown parameter {}", name);
                }
                continue;
            };
            let invalid = |reason: String| TransformError::InvalidParameter {
                name: name.to_string(),
                reason,
            };
            let (r, c) = indices
                .split_once('_')
                .and_then(|(r, c)| Some((r.parse::<usize>().ok()?, c.parse::<usize>().ok()?)))
                .ok_or_else(|| invalid("expected elt_<row>_<col>".to_string()))?;
            if r >= rows || c >= cols {
                return Err(invalid(format!("index outside a {}x{} matrix", rows, cols)));
            }
            let v = value
                .as_number()
                .ok_or_else(|| invalid("expected a number".to_string()))?;
            matrix.set(r, c, v);
        }
        Ok(matrix)
    }

    /// 矩阵转换为参数表（只输出与默认值不同的元素）
    pub fn parameters(matrix: &Matrix) -> ParameterValues {
        let (rows, cols) = (matrix.row_count(), matrix.col_count());
        let mut parameters = ParameterValues::new();
        if rows != 3 {
            parameters.set("num_row", rows as f64);
        }
        if cols != 3 {
            parameters.set("num_col", cols as f64);
        }
        let default = Self::matrix(&parameters).unwrap_or_else(|_| Matrix::identity_rect(rows, cols));
        for r in 0..rows {
            for c in 0..cols {
                let v = matrix.get(r, c);
                if v.to_bits() != default.get(r, c).to_bits() {
                    parameters.set(format!("elt_{}_{}", r, c), v);
                }
            }
        }
        parameters
    }
}

impl OperationMethod for AffineMethod {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create(&self, parameters: &ParameterValues) -> Result<Transform> {
        Transform::from_matrix(&Self::matrix(parameters)?)
    }
}
