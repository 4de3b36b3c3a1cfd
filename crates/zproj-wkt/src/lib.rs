//! ZPROJ 文本格式处理
//!
//! - `element`: 括号嵌套文本到元素树
//! - `analyzer`: 元素树到可执行变换
//! - `format`: 变换回写为文本
//!
//! # 示例
//!
//! ```rust
//! let t = zproj_wkt::parse_transform(
//!     r#"CONCAT_MT[PARAM_MT["Affine", PARAMETER["elt_0_0", 2], PARAMETER["elt_1_1", 2]],
//!                  PARAM_MT["Affine", PARAMETER["elt_0_2", 1]]]"#,
//! )
//! .unwrap();
//! assert_eq!(t.transform(&[1.0, 1.0]).unwrap(), vec![3.0, 2.0]);
//! ```

pub mod analyzer;
pub mod element;
pub mod error;
pub mod format;

pub use analyzer::{Analysis, AnalyzerOptions, WktAnalyzer};
pub use element::{Element, Literal};
pub use error::WktError;
pub use format::{to_wkt, to_wkt_with};

use zproj_core::transform::Transform;

/// 用默认分析器解析一个变换
pub fn parse_transform(text: &str) -> Result<Transform, WktError> {
    Ok(WktAnalyzer::default().parse(text)?.transform)
}
