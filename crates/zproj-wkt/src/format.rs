//! 变换格式化为 WKT 文本
//!
//! 输出可以被 [`WktAnalyzer`](crate::analyzer::WktAnalyzer) 重新解析。
//! 矩阵变换写成 `PARAM_MT["Affine", ...]`，只列出与单位矩阵不同的元素；
//! 嵌套的串联被展平为一个 `CONCAT_MT`。

use crate::analyzer::{AnalyzerOptions, CONCAT_MT, INVERSE_MT, PARAMETER, PARAM_MT, PASSTHROUGH_MT};
use crate::element::{Element, Literal};
use zproj_core::matrix::Matrix;
use zproj_core::method::{AffineMethod, ParameterValue, ParameterValues};
use zproj_core::transform::{Transform, TransformKind};

/// 格式化为单行文本，直通变换的尾部分量数总是写明
pub fn to_wkt(transform: &Transform) -> String {
    to_element(transform, None).to_string()
}

/// 同 [`to_wkt`]，但尾部分量数等于 `options.default_trailing_ordinates` 时省略
pub fn to_wkt_with(transform: &Transform, options: &AnalyzerOptions) -> String {
    to_element(transform, Some(options.default_trailing_ordinates)).to_string()
}

/// 转换为元素树
pub fn to_element(transform: &Transform, implied_trailing: Option<usize>) -> Element {
    match transform.kind() {
        TransformKind::Affine(a) => matrix_element(&a.to_matrix()),
        TransformKind::Linear(l) => matrix_element(l.matrix()),
        TransformKind::Parameterized(p) => param_mt(p.method_name(), p.parameters()),
        TransformKind::Concatenated { .. } => {
            let mut steps = Vec::new();
            flatten(transform, &mut steps);
            Element::new(
                CONCAT_MT,
                Vec::new(),
                steps
                    .into_iter()
                    .map(|t| to_element(t, implied_trailing))
                    .collect(),
            )
        }
        TransformKind::PassThrough {
            first_affected,
            inner,
            trailing,
        } => {
            let mut parameters = vec![Literal::Number(*first_affected as f64)];
            if implied_trailing != Some(*trailing) {
                parameters.push(Literal::Number(*trailing as f64));
            }
            Element::new(
                PASSTHROUGH_MT,
                parameters,
                vec![to_element(inner, implied_trailing)],
            )
        }
        TransformKind::Inverse(of) => {
            Element::new(INVERSE_MT, Vec::new(), vec![to_element(of, implied_trailing)])
        }
    }
}

fn flatten<'t>(transform: &'t Transform, steps: &mut Vec<&'t Transform>) {
    match transform.kind() {
        TransformKind::Concatenated { first, second } => {
            flatten(first, steps);
            flatten(second, steps);
        }
        _ => steps.push(transform),
    }
}

fn matrix_element(matrix: &Matrix) -> Element {
    param_mt(AffineMethod::NAME, &AffineMethod::parameters(matrix))
}

fn param_mt(method: &str, parameters: &ParameterValues) -> Element {
    let children = parameters
        .iter()
        .map(|(name, value)| {
            let value = match value {
                ParameterValue::Number(v) => Literal::Number(*v),
                ParameterValue::Text(s) => Literal::Text(s.clone()),
            };
            Element::new(PARAMETER, vec![Literal::Text(name.to_string()), value], Vec::new())
        })
        .collect();
    Element::new(PARAM_MT, vec![Literal::Text(method.to_string())], children)
}
