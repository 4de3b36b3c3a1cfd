//! WKT 解析与分析错误定义

use thiserror::Error;
use zproj_core::error::TransformError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WktError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Malformed {keyword} element at offset {offset}: {message}")]
    Malformed {
        keyword: String,
        offset: usize,
        message: String,
    },

    #[error("{keyword} at offset {offset} is not a math transform")]
    UnexpectedKeyword { keyword: String, offset: usize },

    #[error(transparent)]
    Transform(#[from] TransformError),
}
