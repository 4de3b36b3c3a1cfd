//! 变换操作错误定义

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("No operation method registered for classification \"{classification}\"")]
    UnknownMethod { classification: String },

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Singular matrix")]
    SingularMatrix,

    #[error("Transform is not invertible")]
    NonInvertible {
        #[source]
        source: Box<TransformError>,
    },

    #[error("Invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Matrix shape mismatch: {rows}x{cols} where {expected} was required")]
    MatrixShape {
        rows: usize,
        cols: usize,
        expected: String,
    },

    #[error("Operation method \"{method}\" provides no inverse")]
    NoInverse { method: String },

    #[error("Point out of domain: {0}")]
    OutOfDomain(String),
}

impl TransformError {
    /// 将失败原因包装为不可逆错误
    pub fn non_invertible(source: TransformError) -> Self {
        match source {
            // 避免重复包装
            err @ TransformError::NonInvertible { .. } => err,
            other => TransformError::NonInvertible {
                source: Box::new(other),
            },
        }
    }
}

/// 坐标过滤器的运行时错误
///
/// 遍历大量坐标序列时，底层失败统一转换为此错误，由调用方决定是否放弃整个几何。
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Coordinate transform failed: {message}")]
pub struct FilterError {
    pub message: String,
}

impl From<TransformError> for FilterError {
    fn from(err: TransformError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
