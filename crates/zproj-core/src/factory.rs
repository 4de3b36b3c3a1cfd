//! 变换组合工厂
//!
//! 构建基本变换（矩阵仿射、按方法名参数化）和组合变换（串联、直通）。
//! 可选的去重池在构建出与已有实例相等的变换时返回已有实例，
//! 这只是一种优化，调用方不应依赖引用相等。

use crate::error::{Result, TransformError};
use crate::matrix::Matrix;
use crate::method::{AffineMethod, OperationMethod, ParameterValues};
use crate::transform::{Transform, TransformKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// 工厂参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// 设置后，矩阵构建的2D仿射变换会按此容差取整
    pub rounding_tolerance: Option<f64>,

    /// 是否启用去重池
    pub use_pool: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            rounding_tolerance: None,
            use_pool: true,
        }
    }
}

/// 操作方法注册表
///
/// 分类名查找不区分大小写。
#[derive(Debug, Default, Clone)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn OperationMethod>>,
}

impl MethodRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置 `Affine` 方法的注册表
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AffineMethod));
        registry
    }

    fn key(name: &str) -> String {
        name.trim().to_ascii_lowercase()
    }

    /// 注册方法（按名称及所有别名），返回被替换的旧方法
    pub fn register(&mut self, method: Arc<dyn OperationMethod>) -> Option<Arc<dyn OperationMethod>> {
        for alias in method.aliases() {
            self.methods.insert(Self::key(alias), method.clone());
        }
        self.methods.insert(Self::key(method.name()), method)
    }

    pub fn get(&self, classification: &str) -> Option<Arc<dyn OperationMethod>> {
        self.methods.get(&Self::key(classification)).cloned()
    }

    pub fn contains(&self, classification: &str) -> bool {
        self.methods.contains_key(&Self::key(classification))
    }
}

/// 变换工厂
#[derive(Debug)]
pub struct TransformFactory {
    registry: MethodRegistry,
    config: FactoryConfig,
    pool: Mutex<HashSet<Transform>>,
}

impl TransformFactory {
    pub fn new(registry: MethodRegistry, config: FactoryConfig) -> Self {
        Self {
            registry,
            config,
            pool: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// 返回池中与 `transform` 相等的已有实例，或将其加入池中
    fn pooled(&self, transform: Transform) -> Transform {
        if !self.config.use_pool {
            return transform;
        }
        let mut pool = self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = pool.get(&transform) {
            tracing::trace!("transform pool hit");
            return existing.clone();
        }
        pool.insert(transform.clone());
        transform
    }

    /// 池中实例数
    pub fn pool_size(&self) -> usize {
        self.pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 按配置的容差对2D仿射变换取整
    fn rounded(&self, transform: Transform) -> Transform {
        let rounded = match (self.config.rounding_tolerance, transform.as_affine()) {
            (Some(tolerance), Some(affine)) => {
                let rounded = affine.round(tolerance);
                (rounded != *affine).then_some(rounded)
            }
            _ => None,
        };
        rounded.map_or(transform, Transform::affine)
    }

    /// 由齐次矩阵构建仿射变换
    pub fn affine_from_matrix(&self, matrix: &Matrix) -> Result<Transform> {
        let transform = Transform::from_matrix(matrix)?;
        Ok(self.pooled(self.rounded(transform)))
    }

    /// 串联变换：先 `first` 后 `second`
    ///
    /// 单位变换被省略，两个矩阵变换合并为一个矩阵，
    /// 前后直通分量相同的两个直通变换合并为一个直通变换。
    pub fn concatenate(&self, first: Transform, second: Transform) -> Result<Transform> {
        if first.target_dimensions() != second.source_dimensions() {
            return Err(TransformError::DimensionMismatch {
                context: "concatenation",
                expected: first.target_dimensions(),
                found: second.source_dimensions(),
            });
        }
        if first.is_identity() {
            return Ok(second);
        }
        if second.is_identity() {
            return Ok(first);
        }
        if let (Some(m1), Some(m2)) = (matrix_of(&first), matrix_of(&second)) {
            let product = m2.multiply(&m1)?;
            tracing::trace!(
                "merged concatenation into a {}x{} matrix",
                product.row_count(),
                product.col_count()
            );
            return self.affine_from_matrix(&product);
        }
        // 外层直通分量相同时只合并内部变换
        if let (
            TransformKind::PassThrough {
                first_affected: k1,
                inner: inner1,
                trailing: n1,
            },
            TransformKind::PassThrough {
                first_affected: k2,
                inner: inner2,
                trailing: n2,
            },
        ) = (first.kind(), second.kind())
        {
            if k1 == k2 && n1 == n2 && inner1.target_dimensions() == inner2.source_dimensions() {
                let inner = self.concatenate(inner1.clone(), inner2.clone())?;
                return self.pass_through(*k1, inner, *n1);
            }
        }
        Ok(self.pooled(Transform::concatenated(first, second)?))
    }

    /// 直通变换，总维数为 `first_affected + inner + trailing`
    pub fn pass_through(
        &self,
        first_affected: usize,
        inner: Transform,
        trailing: usize,
    ) -> Result<Transform> {
        if first_affected == 0 && trailing == 0 {
            return Ok(inner);
        }
        Ok(self.pooled(Transform::pass_through(first_affected, inner, trailing)))
    }

    /// 按方法分类名构建参数化变换
    pub fn parameterized_transform(
        &self,
        classification: &str,
        parameters: &ParameterValues,
    ) -> Result<Transform> {
        let method = self
            .registry
            .get(classification)
            .ok_or_else(|| TransformError::UnknownMethod {
                classification: classification.to_string(),
            })?;
        tracing::debug!(
            "creating {} transform with {} parameters",
            method.name(),
            parameters.len()
        );
        let transform = method.create(parameters)?;
        Ok(self.pooled(self.rounded(transform)))
    }
}

impl Default for TransformFactory {
    fn default() -> Self {
        Self::new(MethodRegistry::with_builtin(), FactoryConfig::default())
    }
}

/// 仿射与矩阵变换的齐次矩阵；组合变换不展开
fn matrix_of(transform: &Transform) -> Option<Matrix> {
    match transform.kind() {
        TransformKind::Affine(_) | TransformKind::Linear(_) => transform.to_matrix(),
        _ => None,
    }
}
