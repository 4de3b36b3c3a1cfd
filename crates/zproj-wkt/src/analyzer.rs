//! WKT 变换分析器
//!
//! 在元素树上递归下降，识别四种变换产生式：
//!
//! | 关键字 | 结构 | 结果 |
//! |--------|------|------|
//! | `PARAM_MT` | `["方法名", PARAMETER[...]...]` | 参数化变换 |
//! | `CONCAT_MT` | `[mt1, mt2, ...]` | 依次串联 |
//! | `INVERSE_MT` | `[mt]` | 逆变换 |
//! | `PASSTHROUGH_MT` | `[k, mt]` 或 `[k, n, mt]` | 直通变换 |
//!
//! 顶层关键字不属于以上四种时返回 `Ok(None)`，调用方可以尝试其他解释。

use crate::element::{Element, Literal};
use crate::error::WktError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zproj_core::error::TransformError;
use zproj_core::factory::{FactoryConfig, MethodRegistry, TransformFactory};
use zproj_core::filter::CoordinateFilter;
use zproj_core::method::{ParameterValue, ParameterValues};
use zproj_core::transform::Transform;

pub const PARAM_MT: &str = "PARAM_MT";
pub const CONCAT_MT: &str = "CONCAT_MT";
pub const INVERSE_MT: &str = "INVERSE_MT";
pub const PASSTHROUGH_MT: &str = "PASSTHROUGH_MT";
pub const PARAMETER: &str = "PARAMETER";

/// 分析参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// `PASSTHROUGH_MT[k, mt]` 未写明时内部变换之后的直通分量数
    pub default_trailing_ordinates: usize,

    /// 分析器自建工厂时使用的参数
    pub factory: FactoryConfig,
}

/// 分析结果
#[derive(Debug, Clone)]
pub struct Analysis {
    pub transform: Transform,
    pub filter: CoordinateFilter,
}

impl Analysis {
    fn new(transform: Transform) -> Self {
        Self {
            filter: CoordinateFilter::new(transform.clone()),
            transform,
        }
    }
}

/// WKT 到变换的分析器
#[derive(Debug, Clone)]
pub struct WktAnalyzer {
    factory: Arc<TransformFactory>,
    options: AnalyzerOptions,
}

impl WktAnalyzer {
    /// 使用内置方法注册表创建
    pub fn new(options: AnalyzerOptions) -> Self {
        let factory = TransformFactory::new(MethodRegistry::with_builtin(), options.factory.clone());
        Self {
            factory: Arc::new(factory),
            options,
        }
    }

    /// 使用共享工厂创建（`options.factory` 被忽略）
    pub fn with_factory(factory: Arc<TransformFactory>, options: AnalyzerOptions) -> Self {
        Self { factory, options }
    }

    pub fn factory(&self) -> &Arc<TransformFactory> {
        &self.factory
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// 分析一个元素，非变换产生式返回 `Ok(None)`
    pub fn analyze(&self, element: &Element) -> Result<Option<Analysis>, WktError> {
        Ok(self.transform_of(element)?.map(Analysis::new))
    }

    /// 解析文本并要求顶层元素是变换产生式
    pub fn parse(&self, text: &str) -> Result<Analysis, WktError> {
        let element = Element::parse(text)?;
        self.analyze(&element)?
            .ok_or_else(|| WktError::UnexpectedKeyword {
                keyword: element.keyword().to_string(),
                offset: element.offset(),
            })
    }

    fn transform_of(&self, element: &Element) -> Result<Option<Transform>, WktError> {
        let transform = if element.is(PARAM_MT) {
            self.param_mt(element)?
        } else if element.is(CONCAT_MT) {
            self.concat_mt(element)?
        } else if element.is(INVERSE_MT) {
            self.inverse_mt(element)?
        } else if element.is(PASSTHROUGH_MT) {
            self.passthrough_mt(element)?
        } else {
            tracing::trace!("{} is not a transform production", element.keyword());
            return Ok(None);
        };
        Ok(Some(transform))
    }

    /// 子元素必须是变换产生式
    fn required(&self, parent: &Element, child: &Element) -> Result<Transform, WktError> {
        self.transform_of(child)?.ok_or_else(|| {
            parent.malformed(format!(
                "child {} at offset {} is not a math transform",
                child.keyword(),
                child.offset()
            ))
        })
    }

    fn single_child<'e>(&self, element: &'e Element) -> Result<&'e Element, WktError> {
        match element.children() {
            [child] => Ok(child),
            children => Err(element.malformed(format!(
                "expected exactly one math transform, found {}",
                children.len()
            ))),
        }
    }

    fn param_mt(&self, element: &Element) -> Result<Transform, WktError> {
        let classification = element.text(0)?;
        let mut parameters = ParameterValues::new();
        for parameter in element.children().iter().filter(|c| c.is(PARAMETER)) {
            if parameter.parameters().len() < 2 {
                continue;
            }
            let name = parameter.text(0)?;
            let value = match &parameter.parameters()[1] {
                Literal::Number(v) => ParameterValue::Number(*v),
                Literal::Text(s) | Literal::Identifier(s) => ParameterValue::Text(s.clone()),
            };
            parameters.set(name, value);
        }
        tracing::debug!(
            "PARAM_MT {} with {} parameters",
            classification,
            parameters.len()
        );
        Ok(self
            .factory
            .parameterized_transform(classification, &parameters)?)
    }

    fn concat_mt(&self, element: &Element) -> Result<Transform, WktError> {
        let mut children = element.children().iter();
        let first = children
            .next()
            .ok_or_else(|| element.malformed("expected at least one math transform"))?;
        let mut accumulated = self.required(element, first)?;
        for child in children {
            let next = self.required(element, child)?;
            accumulated = self.factory.concatenate(accumulated, next)?;
        }
        tracing::debug!(
            "CONCAT_MT of {} transforms: {} -> {} dimensions",
            element.children().len(),
            accumulated.source_dimensions(),
            accumulated.target_dimensions()
        );
        Ok(accumulated)
    }

    fn inverse_mt(&self, element: &Element) -> Result<Transform, WktError> {
        let inner = self.required(element, self.single_child(element)?)?;
        tracing::debug!("INVERSE_MT");
        inner
            .inverse()
            .map_err(|e| WktError::Transform(TransformError::non_invertible(e)))
    }

    fn passthrough_mt(&self, element: &Element) -> Result<Transform, WktError> {
        let first_affected = element.integer(0)?;
        let trailing = match element.parameters().len() {
            1 => self.options.default_trailing_ordinates,
            2 => element.integer(1)?,
            n => {
                return Err(element.malformed(format!(
                    "expected 1 or 2 ordinate counts, found {}",
                    n
                )))
            }
        };
        let inner = self.required(element, self.single_child(element)?)?;
        tracing::debug!(
            "PASSTHROUGH_MT first_affected={} trailing={}",
            first_affected,
            trailing
        );
        Ok(self.factory.pass_through(first_affected, inner, trailing)?)
    }
}

impl Default for WktAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zproj_core::filter::Coordinate;
    use zproj_core::math::approx_eq;
    use zproj_core::method::{OperationMethod, ParameterizedTransform};
    use zproj_core::transform::TransformKind;

    const SCALE_2: &str = r#"PARAM_MT["Affine", PARAMETER["elt_0_0", 2], PARAMETER["elt_1_1", 2]]"#;
    const SHIFT_X: &str = r#"PARAM_MT["Affine", PARAMETER["elt_0_2", 1]]"#;

    fn parse(text: &str) -> Transform {
        WktAnalyzer::default().parse(text).unwrap().transform
    }

    #[test]
    fn test_param_mt_affine() {
        let t = parse(r#"PARAM_MT["Affine", PARAMETER["elt_0_0", 2], PARAMETER["elt_1_1", 3]]"#);
        let a = t.as_affine().unwrap();
        assert_eq!(a.coefficients(), [2.0, 0.0, 0.0, 0.0, 3.0, 0.0]);
        assert_eq!(t.transform(&[1.0, 1.0]).unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_short_parameter_elements_are_skipped() {
        let t = parse(r#"PARAM_MT["affine", PARAMETER["elt_0_0"], PARAMETER["elt_0_2", 5]]"#);
        assert_eq!(t.transform(&[1.0, 1.0]).unwrap(), vec![6.0, 1.0]);
    }

    #[test]
    fn test_concat_applies_children_in_order() {
        let t = parse(&format!("CONCAT_MT[{}, {}]", SCALE_2, SHIFT_X));
        let p = t.transform(&[1.0, 1.0]).unwrap();
        assert!(approx_eq(p[0], 3.0) && approx_eq(p[1], 2.0));
    }

    #[test]
    fn test_concat_single_child() {
        let t = parse(&format!("CONCAT_MT[{}]", SHIFT_X));
        assert_eq!(t.transform(&[0.0, 0.0]).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_concat_empty_is_malformed() {
        let err = WktAnalyzer::default().parse("CONCAT_MT[]").unwrap_err();
        assert!(matches!(err, WktError::Malformed { .. }));
    }

    #[test]
    fn test_inverse_of_identity_is_same_instance() {
        let analyzer = WktAnalyzer::default();
        let identity = analyzer.parse(r#"PARAM_MT["Affine"]"#).unwrap().transform;
        let inverse = analyzer
            .parse(r#"INVERSE_MT[PARAM_MT["Affine"]]"#)
            .unwrap()
            .transform;
        assert!(inverse.ptr_eq(&identity));
    }

    #[test]
    fn test_inverse_of_scale() {
        let t = parse(&format!("INVERSE_MT[{}]", SCALE_2));
        assert_eq!(t.transform(&[4.0, 6.0]).unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_inverse_of_singular_is_non_invertible() {
        let err = WktAnalyzer::default()
            .parse(r#"INVERSE_MT[PARAM_MT["Affine", PARAMETER["elt_1_1", 0]]]"#)
            .unwrap_err();
        match err {
            WktError::Transform(TransformError::NonInvertible { source }) => {
                assert_eq!(*source, TransformError::SingularMatrix)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inverse_needs_one_child() {
        let err = WktAnalyzer::default()
            .parse(&format!("INVERSE_MT[{}, {}]", SCALE_2, SHIFT_X))
            .unwrap_err();
        assert!(matches!(err, WktError::Malformed { .. }));
    }

    #[test]
    fn test_passthrough_default_trailing() {
        let analyzer = WktAnalyzer::new(AnalyzerOptions {
            default_trailing_ordinates: 1,
            ..Default::default()
        });
        let t = analyzer
            .parse(&format!("PASSTHROUGH_MT[1, {}]", SCALE_2))
            .unwrap()
            .transform;
        assert_eq!(t.source_dimensions(), 4);
        assert_eq!(
            t.transform(&[7.0, 1.0, 2.0, 9.0]).unwrap(),
            vec![7.0, 2.0, 4.0, 9.0]
        );
    }

    #[test]
    fn test_passthrough_explicit_trailing() {
        let t = parse(&format!("PASSTHROUGH_MT[0, 2, {}]", SCALE_2));
        assert!(matches!(t.kind(), TransformKind::PassThrough { trailing: 2, .. }));
        assert_eq!(t.target_dimensions(), 4);
    }

    #[test]
    fn test_passthrough_rejects_bad_ordinate() {
        for text in [
            format!("PASSTHROUGH_MT[-1, {}]", SCALE_2),
            format!("PASSTHROUGH_MT[1.5, {}]", SCALE_2),
            format!("PASSTHROUGH_MT[\"one\", {}]", SCALE_2),
            format!("PASSTHROUGH_MT[1, 2, 3, {}]", SCALE_2),
            "PASSTHROUGH_MT[1]".to_string(),
        ] {
            let err = WktAnalyzer::default().parse(&text).unwrap_err();
            assert!(matches!(err, WktError::Malformed { .. }), "{}: {:?}", text, err);
        }
    }

    #[test]
    fn test_unknown_method() {
        let err = WktAnalyzer::default()
            .parse(r#"PARAM_MT["Transverse_Mercator", PARAMETER["k0", 0.9996]]"#)
            .unwrap_err();
        assert_eq!(
            err,
            WktError::Transform(TransformError::UnknownMethod {
                classification: "Transverse_Mercator".to_string()
            })
        );
    }

    #[test]
    fn test_unrecognized_top_level_is_unhandled() {
        let element = Element::parse(r#"GEOGCS["WGS 84"]"#).unwrap();
        assert!(WktAnalyzer::default().analyze(&element).unwrap().is_none());

        let err = WktAnalyzer::default().parse(r#"GEOGCS["WGS 84"]"#).unwrap_err();
        assert!(matches!(err, WktError::UnexpectedKeyword { offset: 0, .. }));
    }

    #[test]
    fn test_non_transform_child_is_malformed() {
        let err = WktAnalyzer::default()
            .parse(&format!("CONCAT_MT[{}, GEOGCS[\"x\"]]", SCALE_2))
            .unwrap_err();
        assert!(matches!(err, WktError::Malformed { .. }));
    }

    #[test]
    fn test_dimension_mismatch_in_concat() {
        let err = WktAnalyzer::default()
            .parse(&format!("CONCAT_MT[PASSTHROUGH_MT[0, 1, {}], {}]", SCALE_2, SHIFT_X))
            .unwrap_err();
        assert!(matches!(
            err,
            WktError::Transform(TransformError::DimensionMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_syntax_error_surfaces() {
        let err = WktAnalyzer::default().parse("PARAM_MT[\"Affine\"").unwrap_err();
        assert!(matches!(err, WktError::Syntax { offset: 17, .. }));
    }

    #[test]
    fn test_analysis_filter_mutates_coordinate() {
        let analysis = WktAnalyzer::default().parse(SCALE_2).unwrap();
        let mut c = Coordinate::new_3d(1.5, -2.0, 10.0);
        analysis.filter.filter(&mut c).unwrap();
        assert_eq!((c.x, c.y, c.z), (3.0, -4.0, 10.0));
    }

    #[derive(Debug)]
    struct Offset {
        parameters: ParameterValues,
        dx: f64,
    }

    impl ParameterizedTransform for Offset {
        fn method_name(&self) -> &str {
            "Offset"
        }

        fn parameters(&self) -> &ParameterValues {
            &self.parameters
        }

        fn transform(&self, src: &[f64], dst: &mut [f64]) -> zproj_core::error::Result<()> {
            dst[0] = src[0] + self.dx;
            dst[1] = src[1];
            Ok(())
        }
    }

    #[derive(Debug)]
    struct OffsetMethod;

    impl OperationMethod for OffsetMethod {
        fn name(&self) -> &str {
            "Offset"
        }

        fn create(&self, parameters: &ParameterValues) -> zproj_core::error::Result<Transform> {
            let dx = parameters.require_number("dx")?;
            Ok(Transform::parameterized(Arc::new(Offset {
                parameters: parameters.clone(),
                dx,
            })))
        }
    }

    #[test]
    fn test_registered_method_and_non_invertible_parameterized() {
        let mut registry = MethodRegistry::with_builtin();
        registry.register(Arc::new(OffsetMethod));
        let factory = Arc::new(TransformFactory::new(registry, FactoryConfig::default()));
        let analyzer = WktAnalyzer::with_factory(factory, AnalyzerOptions::default());

        let t = analyzer
            .parse(r#"PARAM_MT["Offset", PARAMETER["dx", 4]]"#)
            .unwrap()
            .transform;
        assert_eq!(t.transform(&[1.0, 1.0]).unwrap(), vec![5.0, 1.0]);

        let err = analyzer
            .parse(r#"INVERSE_MT[PARAM_MT["Offset", PARAMETER["dx", 4]]]"#)
            .unwrap_err();
        assert!(matches!(
            err,
            WktError::Transform(TransformError::NonInvertible { .. })
        ));
    }
}
