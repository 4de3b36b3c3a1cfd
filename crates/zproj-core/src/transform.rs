//! 坐标变换
//!
//! `Transform` 是对 [`TransformKind`] 的共享不可变引用：
//! - `Affine`: 2D仿射变换
//! - `Linear`: N 维齐次矩阵变换
//! - `Concatenated`: 先 `first` 后 `second`
//! - `PassThrough`: 只作用于一段连续坐标分量
//! - `Parameterized`: 由操作方法提供的变换
//! - `Inverse`: 参数化变换的逆
//!
//! 逆变换在首次请求时计算并缓存。缓存的逆变换从不反向引用原变换，
//! 因此共享引用之间不会形成环。参数化变换的逆视图会引用原变换，
//! 原变换只以弱引用记住它。

use crate::affine::AffineTransform2D;
use crate::error::{Result, TransformError};
use crate::math::Point2;
use crate::matrix::Matrix;
use crate::method::ParameterizedTransform;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// N 维齐次矩阵变换
///
/// (N+1)×(M+1) 矩阵把 M 维坐标映射到 N 维坐标；最后一行不是 `[0 … 0 1]` 时为射影变换。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinearTransform {
    matrix: Matrix,
}

impl LinearTransform {
    pub fn new(matrix: Matrix) -> Result<Self> {
        if matrix.row_count() < 2 || matrix.col_count() < 2 {
            return Err(TransformError::MatrixShape {
                rows: matrix.row_count(),
                cols: matrix.col_count(),
                expected: "at least 2x2".to_string(),
            });
        }
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn source_dimensions(&self) -> usize {
        self.matrix.col_count() - 1
    }

    pub fn target_dimensions(&self) -> usize {
        self.matrix.row_count() - 1
    }

    fn apply(&self, src: &[f64], dst: &mut [f64]) -> Result<()> {
        let m = &self.matrix;
        let (rows, cols) = (m.row_count(), m.col_count());
        let row_value = |r: usize| -> f64 {
            let mut sum = m.get(r, cols - 1);
            for (c, v) in src.iter().enumerate() {
                sum += m.get(r, c) * v;
            }
            sum
        };
        let w = row_value(rows - 1);
        if w == 0.0 || !w.is_finite() {
            return Err(TransformError::OutOfDomain(format!(
                "projective divisor is {} for {:?}",
                w, src
            )));
        }
        for (r, out) in dst.iter_mut().enumerate() {
            *out = row_value(r) / w;
        }
        Ok(())
    }
}

/// 变换的具体形态
#[derive(Debug)]
pub enum TransformKind {
    Affine(AffineTransform2D),
    Linear(LinearTransform),
    Concatenated {
        first: Transform,
        second: Transform,
    },
    PassThrough {
        first_affected: usize,
        inner: Transform,
        trailing: usize,
    },
    Parameterized(Arc<dyn ParameterizedTransform>),
    Inverse(Transform),
}

#[derive(Debug)]
struct TransformNode {
    kind: TransformKind,
    inverse: OnceLock<Transform>,
    inverse_view: Mutex<Weak<TransformNode>>,
}

/// 可执行的坐标变换
#[derive(Clone)]
pub struct Transform {
    node: Arc<TransformNode>,
}

impl Transform {
    fn new(kind: TransformKind) -> Self {
        Self {
            node: Arc::new(TransformNode {
                kind,
                inverse: OnceLock::new(),
                inverse_view: Mutex::new(Weak::new()),
            }),
        }
    }

    /// 2D单位变换
    pub fn identity2d() -> Self {
        Self::affine(AffineTransform2D::identity())
    }

    /// `dimensions` 维单位变换
    pub fn identity(dimensions: usize) -> Result<Self> {
        if dimensions == 2 {
            return Ok(Self::identity2d());
        }
        Self::from_matrix(&Matrix::identity(dimensions + 1))
    }

    pub fn affine(affine: AffineTransform2D) -> Self {
        Self::new(TransformKind::Affine(affine))
    }

    /// 从齐次矩阵创建：3×3 仿射矩阵得到 `Affine`，其余得到 `Linear`
    pub fn from_matrix(matrix: &Matrix) -> Result<Self> {
        if matrix.row_count() == 3 && matrix.col_count() == 3 && matrix.is_affine() {
            return Ok(Self::affine(AffineTransform2D::from_matrix(matrix)?));
        }
        Ok(Self::new(TransformKind::Linear(LinearTransform::new(
            matrix.clone(),
        )?)))
    }

    /// 串联两个变换，不做任何化简
    ///
    /// `first` 的目标维数必须等于 `second` 的源维数。
    pub fn concatenated(first: Transform, second: Transform) -> Result<Self> {
        if first.target_dimensions() != second.source_dimensions() {
            return Err(TransformError::DimensionMismatch {
                context: "concatenation",
                expected: first.target_dimensions(),
                found: second.source_dimensions(),
            });
        }
        Ok(Self::new(TransformKind::Concatenated { first, second }))
    }

    /// 只作用于 `first_affected..first_affected + inner` 分量的变换
    pub fn pass_through(first_affected: usize, inner: Transform, trailing: usize) -> Self {
        Self::new(TransformKind::PassThrough {
            first_affected,
            inner,
            trailing,
        })
    }

    pub fn parameterized(transform: Arc<dyn ParameterizedTransform>) -> Self {
        Self::new(TransformKind::Parameterized(transform))
    }

    pub fn kind(&self) -> &TransformKind {
        &self.node.kind
    }

    pub fn as_affine(&self) -> Option<&AffineTransform2D> {
        match self.kind() {
            TransformKind::Affine(a) => Some(a),
            _ => None,
        }
    }

    /// 是否与 `other` 为同一个共享实例
    pub fn ptr_eq(&self, other: &Transform) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn source_dimensions(&self) -> usize {
        match self.kind() {
            TransformKind::Affine(_) => 2,
            TransformKind::Linear(l) => l.source_dimensions(),
            TransformKind::Concatenated { first, .. } => first.source_dimensions(),
            TransformKind::PassThrough {
                first_affected,
                inner,
                trailing,
            } => first_affected + inner.source_dimensions() + trailing,
            TransformKind::Parameterized(p) => p.source_dimensions(),
            TransformKind::Inverse(of) => of.target_dimensions(),
        }
    }

    pub fn target_dimensions(&self) -> usize {
        match self.kind() {
            TransformKind::Affine(_) => 2,
            TransformKind::Linear(l) => l.target_dimensions(),
            TransformKind::Concatenated { second, .. } => second.target_dimensions(),
            TransformKind::PassThrough {
                first_affected,
                inner,
                trailing,
            } => first_affected + inner.target_dimensions() + trailing,
            TransformKind::Parameterized(p) => p.target_dimensions(),
            TransformKind::Inverse(of) => of.source_dimensions(),
        }
    }

    /// 是否为（精确的）单位变换
    pub fn is_identity(&self) -> bool {
        match self.kind() {
            TransformKind::Affine(a) => a.is_identity(0.0),
            TransformKind::Linear(l) => l.matrix().is_square() && l.matrix().is_identity(0.0),
            TransformKind::Concatenated { first, second } => {
                first.is_identity() && second.is_identity()
            }
            TransformKind::PassThrough { inner, .. } => inner.is_identity(),
            TransformKind::Parameterized(_) => false,
            TransformKind::Inverse(of) => of.is_identity(),
        }
    }

    /// 若变换可以表示为齐次矩阵则返回之
    pub fn to_matrix(&self) -> Option<Matrix> {
        match self.kind() {
            TransformKind::Affine(a) => Some(a.to_matrix()),
            TransformKind::Linear(l) => Some(l.matrix().clone()),
            TransformKind::Concatenated { first, second } => {
                second.to_matrix()?.multiply(&first.to_matrix()?).ok()
            }
            TransformKind::PassThrough {
                first_affected,
                inner,
                trailing,
            } => {
                // 射影内部变换的除数不作用于直通分量，无法嵌入
                let inner = inner.to_matrix().filter(Matrix::is_affine)?;
                Some(expand_pass_through(*first_affected, &inner, *trailing))
            }
            TransformKind::Parameterized(_) | TransformKind::Inverse(_) => None,
        }
    }

    /// 变换一个坐标，长度必须等于源维数
    pub fn transform(&self, src: &[f64]) -> Result<Vec<f64>> {
        if src.len() != self.source_dimensions() {
            return Err(TransformError::DimensionMismatch {
                context: "transform input",
                expected: self.source_dimensions(),
                found: src.len(),
            });
        }
        let mut dst = vec![0.0; self.target_dimensions()];
        self.apply(src, &mut dst)?;
        Ok(dst)
    }

    /// 变换一个2D点
    pub fn transform_point2(&self, point: &Point2) -> Result<Point2> {
        if let TransformKind::Affine(a) = self.kind() {
            return Ok(a.transform_point(point));
        }
        if self.target_dimensions() != 2 {
            return Err(TransformError::DimensionMismatch {
                context: "transform output",
                expected: 2,
                found: self.target_dimensions(),
            });
        }
        let out = self.transform(&[point.x, point.y])?;
        Ok(Point2::new(out[0], out[1]))
    }

    fn apply(&self, src: &[f64], dst: &mut [f64]) -> Result<()> {
        match self.kind() {
            TransformKind::Affine(a) => {
                let p = a.transform_point(&Point2::new(src[0], src[1]));
                dst[0] = p.x;
                dst[1] = p.y;
                Ok(())
            }
            TransformKind::Linear(l) => l.apply(src, dst),
            TransformKind::Concatenated { first, second } => {
                let mut buffer = vec![0.0; first.target_dimensions()];
                first.apply(src, &mut buffer)?;
                second.apply(&buffer, dst)
            }
            TransformKind::PassThrough {
                first_affected,
                inner,
                ..
            } => {
                let k = *first_affected;
                let (src_end, dst_end) = (k + inner.source_dimensions(), k + inner.target_dimensions());
                dst[..k].copy_from_slice(&src[..k]);
                inner.apply(&src[k..src_end], &mut dst[k..dst_end])?;
                dst[dst_end..].copy_from_slice(&src[src_end..]);
                Ok(())
            }
            TransformKind::Parameterized(p) => p.transform(src, dst),
            TransformKind::Inverse(of) => match of.kind() {
                TransformKind::Parameterized(p) => p.inverse_transform(src, dst),
                _ => of.inverse()?.apply(src, dst),
            },
        }
    }

    /// 获取逆变换
    ///
    /// 单位变换返回自身；逆的逆返回原实例；其余结果计算一次后缓存。
    pub fn inverse(&self) -> Result<Transform> {
        if self.is_identity() {
            return Ok(self.clone());
        }
        match self.kind() {
            TransformKind::Inverse(of) => return Ok(of.clone()),
            TransformKind::Parameterized(p) => {
                return if p.is_invertible() {
                    Ok(self.inverse_view())
                } else {
                    Err(TransformError::non_invertible(TransformError::NoInverse {
                        method: p.method_name().to_string(),
                    }))
                };
            }
            _ => {}
        }
        if let Some(cached) = self.node.inverse.get() {
            return Ok(cached.clone());
        }
        let inverse = self.compute_inverse().map_err(TransformError::non_invertible)?;
        Ok(self.node.inverse.get_or_init(|| inverse).clone())
    }

    /// 参数化变换的逆视图，仍有持有者时返回同一实例
    fn inverse_view(&self) -> Transform {
        let mut view = self
            .node
            .inverse_view
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(node) = view.upgrade() {
            return Transform { node };
        }
        let inverse = Self::new(TransformKind::Inverse(self.clone()));
        *view = Arc::downgrade(&inverse.node);
        inverse
    }

    fn compute_inverse(&self) -> Result<Transform> {
        match self.kind() {
            TransformKind::Affine(a) => Ok(Self::affine(a.inverse()?)),
            TransformKind::Linear(l) => Ok(Self::new(TransformKind::Linear(LinearTransform::new(
                l.matrix().inverse()?,
            )?))),
            TransformKind::Concatenated { first, second } => {
                Self::concatenated(second.inverse()?, first.inverse()?)
            }
            TransformKind::PassThrough {
                first_affected,
                inner,
                trailing,
            } => Ok(Self::pass_through(*first_affected, inner.inverse()?, *trailing)),
            TransformKind::Parameterized(_) | TransformKind::Inverse(_) => self.inverse(),
        }
    }

    pub fn is_invertible(&self) -> bool {
        self.inverse().is_ok()
    }
}

/// 将仿射内部矩阵嵌入到带前后直通分量的更大矩阵中
fn expand_pass_through(first_affected: usize, inner: &Matrix, trailing: usize) -> Matrix {
    let inner_src = inner.col_count() - 1;
    let inner_tgt = inner.row_count() - 1;
    let rows = first_affected + inner_tgt + trailing + 1;
    let cols = first_affected + inner_src + trailing + 1;
    let mut m = Matrix::zeros(rows, cols);

    for i in 0..first_affected {
        m.set(i, i, 1.0);
    }
    for r in 0..inner_tgt {
        for c in 0..inner_src {
            m.set(first_affected + r, first_affected + c, inner.get(r, c));
        }
        m.set(first_affected + r, cols - 1, inner.get(r, inner_src));
    }
    for i in 0..trailing {
        m.set(first_affected + inner_tgt + i, first_affected + inner_src + i, 1.0);
    }
    m.set(rows - 1, cols - 1, 1.0);
    m
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.kind(), other.kind()) {
            (TransformKind::Affine(a), TransformKind::Affine(b)) => a == b,
            (TransformKind::Linear(a), TransformKind::Linear(b)) => a == b,
            (
                TransformKind::Concatenated { first: a1, second: a2 },
                TransformKind::Concatenated { first: b1, second: b2 },
            ) => a1 == b1 && a2 == b2,
            (
                TransformKind::PassThrough {
                    first_affected: ka,
                    inner: ia,
                    trailing: na,
                },
                TransformKind::PassThrough {
                    first_affected: kb,
                    inner: ib,
                    trailing: nb,
                },
            ) => ka == kb && na == nb && ia == ib,
            (TransformKind::Parameterized(a), TransformKind::Parameterized(b)) => {
                a.method_name() == b.method_name() && a.parameters() == b.parameters()
            }
            (TransformKind::Inverse(a), TransformKind::Inverse(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Transform {}

impl Hash for Transform {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self.kind()).hash(state);
        match self.kind() {
            TransformKind::Affine(a) => a.hash(state),
            TransformKind::Linear(l) => l.hash(state),
            TransformKind::Concatenated { first, second } => {
                first.hash(state);
                second.hash(state);
            }
            TransformKind::PassThrough {
                first_affected,
                inner,
                trailing,
            } => {
                first_affected.hash(state);
                inner.hash(state);
                trailing.hash(state);
            }
            TransformKind::Parameterized(p) => {
                p.method_name().hash(state);
                p.parameters().hash(state);
            }
            TransformKind::Inverse(of) => of.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;
    use crate::method::ParameterValues;

    fn scale(s: f64) -> Transform {
        Transform::affine(AffineTransform2D::scale(s, s))
    }

    fn translate(dx: f64, dy: f64) -> Transform {
        Transform::affine(AffineTransform2D::translation(dx, dy))
    }

    fn assert_coords_eq(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(approx_eq(*x, *y), "{:?} != {:?}", a, b);
        }
    }

    /// 笛卡尔坐标 ↔ 极坐标（测试用参数化变换）
    #[derive(Debug)]
    struct Polar {
        parameters: ParameterValues,
    }

    impl ParameterizedTransform for Polar {
        fn method_name(&self) -> &str {
            "Polar"
        }

        fn parameters(&self) -> &ParameterValues {
            &self.parameters
        }

        fn transform(&self, src: &[f64], dst: &mut [f64]) -> Result<()> {
            dst[0] = src[0].hypot(src[1]);
            dst[1] = src[1].atan2(src[0]);
            Ok(())
        }

        fn inverse_transform(&self, src: &[f64], dst: &mut [f64]) -> Result<()> {
            dst[0] = src[0] * src[1].cos();
            dst[1] = src[0] * src[1].sin();
            Ok(())
        }

        fn is_invertible(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_concatenated_applies_first_then_second() {
        let t = Transform::concatenated(scale(2.0), translate(1.0, 0.0)).unwrap();
        assert_coords_eq(&t.transform(&[1.0, 1.0]).unwrap(), &[3.0, 2.0]);
    }

    #[test]
    fn test_concatenation_dimension_mismatch() {
        let three_d = Transform::identity(3).unwrap();
        let err = Transform::concatenated(scale(2.0), three_d).unwrap_err();
        assert_eq!(
            err,
            TransformError::DimensionMismatch {
                context: "concatenation",
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_concatenation_is_associative() {
        let a = scale(2.0);
        let b = translate(1.0, -4.0);
        let c = Transform::affine(AffineTransform2D::rotation(0.3));
        let left = Transform::concatenated(Transform::concatenated(a.clone(), b.clone()).unwrap(), c.clone()).unwrap();
        let right = Transform::concatenated(a, Transform::concatenated(b, c).unwrap()).unwrap();
        for p in [[0.0, 0.0], [1.5, -2.0], [100.0, 7.0]] {
            assert_coords_eq(&left.transform(&p).unwrap(), &right.transform(&p).unwrap());
        }
    }

    #[test]
    fn test_pass_through_dimensions() {
        for (k, n) in [(0, 0), (1, 0), (0, 2), (3, 1)] {
            let inner = Transform::from_matrix(&Matrix::identity_rect(3, 4)).unwrap();
            let t = Transform::pass_through(k, inner.clone(), n);
            assert_eq!(t.source_dimensions(), k + inner.source_dimensions() + n);
            assert_eq!(t.target_dimensions(), k + inner.target_dimensions() + n);
        }
    }

    #[test]
    fn test_pass_through_leaves_other_ordinates() {
        let t = Transform::pass_through(1, scale(10.0), 1);
        assert_coords_eq(&t.transform(&[1.0, 2.0, 3.0, 4.0]).unwrap(), &[1.0, 20.0, 30.0, 4.0]);

        let expanded = Transform::from_matrix(&t.to_matrix().unwrap()).unwrap();
        assert_coords_eq(&expanded.transform(&[1.0, 2.0, 3.0, 4.0]).unwrap(), &[1.0, 20.0, 30.0, 4.0]);
    }

    #[test]
    fn test_transform_input_dimension_checked() {
        assert!(matches!(
            scale(2.0).transform(&[1.0, 2.0, 3.0]),
            Err(TransformError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_identity_inverse_is_same_instance() {
        let id = Transform::identity2d();
        assert!(id.inverse().unwrap().ptr_eq(&id));
    }

    #[test]
    fn test_inverse_is_cached() {
        let t = Transform::concatenated(scale(2.0), translate(1.0, 3.0)).unwrap();
        let inv1 = t.inverse().unwrap();
        let inv2 = t.inverse().unwrap();
        assert!(inv1.ptr_eq(&inv2));
        assert_coords_eq(&inv1.transform(&t.transform(&[5.0, 6.0]).unwrap()).unwrap(), &[5.0, 6.0]);
    }

    #[test]
    fn test_double_inverse_round_trip() {
        let t = Transform::affine(AffineTransform2D::new(2.0, 0.5, 3.0, -1.0, 4.0, 1.0));
        let back = t.inverse().unwrap().inverse().unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_singular_is_non_invertible() {
        let t = scale(0.0);
        match t.inverse() {
            Err(TransformError::NonInvertible { source }) => {
                assert_eq!(*source, TransformError::SingularMatrix)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_linear_three_dimensional() {
        let mut m = Matrix::identity(4);
        m.set(0, 3, 10.0);
        m.set(2, 2, 2.0);
        let t = Transform::from_matrix(&m).unwrap();
        assert!(matches!(t.kind(), TransformKind::Linear(_)));
        assert_coords_eq(&t.transform(&[1.0, 2.0, 3.0]).unwrap(), &[11.0, 2.0, 6.0]);
        let inv = t.inverse().unwrap();
        assert_coords_eq(&inv.transform(&[11.0, 2.0, 6.0]).unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parameterized_inverse() {
        let t = Transform::parameterized(Arc::new(Polar {
            parameters: ParameterValues::new(),
        }));
        let inv = t.inverse().unwrap();
        assert!(matches!(inv.kind(), TransformKind::Inverse(_)));
        assert!(inv.inverse().unwrap().ptr_eq(&t));

        let polar = t.transform(&[0.0, 2.0]).unwrap();
        assert_coords_eq(&polar, &[2.0, std::f64::consts::FRAC_PI_2]);
        assert_coords_eq(&inv.transform(&polar).unwrap(), &[0.0, 2.0]);
    }

    #[test]
    fn test_parameterized_inverse_is_shared_while_alive() {
        let t = Transform::parameterized(Arc::new(Polar {
            parameters: ParameterValues::new(),
        }));
        let inv1 = t.inverse().unwrap();
        let inv2 = t.inverse().unwrap();
        assert!(inv1.ptr_eq(&inv2));
        assert!(inv1.inverse().unwrap().ptr_eq(&t));

        drop(inv1);
        drop(inv2);
        assert_eq!(Arc::strong_count(&t.node), 1);

        let again = t.inverse().unwrap();
        assert!(again.inverse().unwrap().ptr_eq(&t));
        drop(again);
        assert_eq!(Arc::strong_count(&t.node), 1);
    }

    #[test]
    fn test_projective_pass_through_has_no_matrix() {
        let inner = Transform::from_matrix(
            &Matrix::from_rows(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[1.0, 0.0, 1.0]]).unwrap(),
        )
        .unwrap();
        let t = Transform::pass_through(1, inner, 0);
        assert!(t.to_matrix().is_none());
        assert_coords_eq(&t.transform(&[5.0, 1.0, 2.0]).unwrap(), &[5.0, 0.5, 1.0]);
    }

    #[test]
    fn test_structural_equality() {
        let a = Transform::concatenated(scale(2.0), translate(1.0, 0.0)).unwrap();
        let b = Transform::concatenated(scale(2.0), translate(1.0, 0.0)).unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, Transform::concatenated(translate(1.0, 0.0), scale(2.0)).unwrap());
    }
}
