//! 基准转换路径搜索
//!
//! 在 Bursa-Wolf 参数图上查找源基准到目标基准的转换矩阵，依次尝试：
//! 1. 源基准上指向目标的参数（直接使用）
//! 2. 目标基准上指向源的参数（求逆）
//! 3. 两者共同的中间基准（分两段递归后组合）
//!
//! 找不到路径是正常结果（`Ok(None)`），不是错误。
//! 排除集按值传入每个递归分支，只约束当前分支，不影响兄弟分支。

use crate::datum::{DatumCatalog, DatumId};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::transform::Transform;
use std::collections::BTreeSet;

/// 递归分支中已作为端点出现的基准
pub type Exclusion = BTreeSet<DatumId>;

/// 基准转换路径解析器
#[derive(Debug, Clone, Copy)]
pub struct DatumShiftResolver<'a> {
    catalog: &'a DatumCatalog,
}

impl<'a> DatumShiftResolver<'a> {
    pub fn new(catalog: &'a DatumCatalog) -> Self {
        Self { catalog }
    }

    /// 求 `source` 到 `target` 的 4×4 地心转换矩阵
    ///
    /// 只有在需要求逆的参数矩阵奇异时才返回错误。
    pub fn resolve(&self, source: DatumId, target: DatumId) -> Result<Option<Matrix>> {
        self.resolve_excluding(source, target, &Exclusion::new())
    }

    /// 同 [`resolve`](Self::resolve)，但 `excluded` 中的基准不能再作为中间搜索的端点
    pub fn resolve_excluding(
        &self,
        source: DatumId,
        target: DatumId,
        excluded: &Exclusion,
    ) -> Result<Option<Matrix>> {
        let (Some(source_datum), Some(target_datum)) =
            (self.catalog.get(source), self.catalog.get(target))
        else {
            return Ok(None);
        };

        if let Some(parameters) = source_datum.shift_to(target) {
            tracing::trace!("datum shift {} -> {}: direct", source, target);
            return Ok(Some(parameters.to_matrix()));
        }

        if let Some(parameters) = target_datum.shift_to(source) {
            tracing::trace!("datum shift {} -> {}: inverse of {} -> {}", source, target, target, source);
            return parameters.to_matrix().inverse().map(Some);
        }

        if excluded.contains(&source) || excluded.contains(&target) {
            return Ok(None);
        }

        for source_step in source_datum.shifts() {
            for target_step in target_datum.shifts() {
                if source_step.target != target_step.target {
                    continue;
                }
                let intermediate = source_step.target;
                let mut branch = excluded.clone();
                branch.insert(source);
                branch.insert(target);

                tracing::trace!(
                    "datum shift {} -> {}: trying intermediate {}",
                    source,
                    target,
                    intermediate
                );
                let Some(step1) = self.resolve_excluding(source, intermediate, &branch)? else {
                    continue;
                };
                let Some(step2) = self.resolve_excluding(intermediate, target, &branch)? else {
                    continue;
                };
                // 最右侧的矩阵最先作用于源坐标
                return step2.multiply(&step1).map(Some);
            }
        }

        tracing::debug!("no datum shift path from {} to {}", source, target);
        Ok(None)
    }

    /// 以地心 3D 变换的形式返回路径
    pub fn resolve_transform(&self, source: DatumId, target: DatumId) -> Result<Option<Transform>> {
        self.resolve(source, target)?
            .map(|matrix| Transform::from_matrix(&matrix))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{BursaWolfParameters, Datum};
    use crate::error::TransformError;
    use crate::math::approx_eq;

    fn catalog_with(names: &[&str]) -> (DatumCatalog, Vec<DatumId>) {
        let mut catalog = DatumCatalog::new();
        let ids = names.iter().map(|n| catalog.add(Datum::new(*n))).collect();
        (catalog, ids)
    }

    fn apply(m: &Matrix, p: [f64; 3]) -> [f64; 3] {
        let t = Transform::from_matrix(m).unwrap();
        let out = t.transform(&p).unwrap();
        [out[0], out[1], out[2]]
    }

    #[test]
    fn test_direct_forward() {
        let (mut catalog, ids) = catalog_with(&["A", "B"]);
        catalog.add_shift(ids[0], BursaWolfParameters::translation(ids[1], 1.0, 2.0, 3.0));
        let m = DatumShiftResolver::new(&catalog).resolve(ids[0], ids[1]).unwrap().unwrap();
        assert_eq!(m.get(0, 3), 1.0);
    }

    #[test]
    fn test_direct_inverse() {
        let (mut catalog, ids) = catalog_with(&["A", "B"]);
        catalog.add_shift(ids[1], BursaWolfParameters::translation(ids[0], 1.0, 2.0, 3.0));
        let m = DatumShiftResolver::new(&catalog).resolve(ids[0], ids[1]).unwrap().unwrap();
        assert!(approx_eq(m.get(0, 3), -1.0));
        assert!(approx_eq(m.get(2, 3), -3.0));
    }

    #[test]
    fn test_singular_inverse_fails() {
        let (mut catalog, ids) = catalog_with(&["A", "B"]);
        let degenerate = BursaWolfParameters {
            ppm: -1e6,
            ..BursaWolfParameters::identity(ids[0])
        };
        catalog.add_shift(ids[1], degenerate);
        let err = DatumShiftResolver::new(&catalog).resolve(ids[0], ids[1]).unwrap_err();
        assert_eq!(err, TransformError::SingularMatrix);
    }

    #[test]
    fn test_common_intermediate_order() {
        // A -> W 平移 (10,0,0) 后放大 2 倍；B -> W 平移 (0,5,0)
        let (mut catalog, ids) = catalog_with(&["A", "B", "W"]);
        let (a, b, w) = (ids[0], ids[1], ids[2]);
        catalog.add_shift(a, BursaWolfParameters {
            dx: 10.0,
            ppm: 1e6,
            ..BursaWolfParameters::identity(w)
        });
        catalog.add_shift(b, BursaWolfParameters::translation(w, 0.0, 5.0, 0.0));

        let m = DatumShiftResolver::new(&catalog).resolve(a, b).unwrap().unwrap();
        // A: (1,1,1) -> W: (12,2,2) -> B: (12,-3,2)
        let out = apply(&m, [1.0, 1.0, 1.0]);
        assert!(approx_eq(out[0], 12.0) && approx_eq(out[1], -3.0) && approx_eq(out[2], 2.0));
    }

    #[test]
    fn test_no_path_is_not_an_error() {
        let (catalog, ids) = catalog_with(&["X", "Y"]);
        assert_eq!(DatumShiftResolver::new(&catalog).resolve(ids[0], ids[1]), Ok(None));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let (mut catalog, ids) = catalog_with(&["A", "B"]);
        catalog.add_shift(ids[0], BursaWolfParameters::translation(ids[1], 1.0, 0.0, 0.0));
        catalog.add_shift(ids[0], BursaWolfParameters::translation(ids[1], 9.0, 0.0, 0.0));
        let m = DatumShiftResolver::new(&catalog).resolve(ids[0], ids[1]).unwrap().unwrap();
        assert_eq!(m.get(0, 3), 1.0);
    }

    #[test]
    fn test_cycle_terminates() {
        // A -> B -> C -> A 的环，外加各自指向 D 的孤立边
        let (mut catalog, ids) = catalog_with(&["A", "B", "C", "D", "E"]);
        let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        catalog.add_shift(a, BursaWolfParameters::translation(b, 1.0, 0.0, 0.0));
        catalog.add_shift(b, BursaWolfParameters::translation(c, 1.0, 0.0, 0.0));
        catalog.add_shift(c, BursaWolfParameters::translation(a, 1.0, 0.0, 0.0));
        catalog.add_shift(a, BursaWolfParameters::translation(d, 0.0, 1.0, 0.0));
        catalog.add_shift(e, BursaWolfParameters::translation(d, 0.0, 2.0, 0.0));

        let resolver = DatumShiftResolver::new(&catalog);
        // A -> B 再经 B 的逆回到 A
        let round_trip = resolver.resolve(a, a).unwrap().unwrap();
        assert!(round_trip.is_identity(1e-12));
        for &x in &ids {
            for &y in &ids {
                let _ = resolver.resolve(x, y);
            }
        }
        assert!(resolver.resolve(a, e).unwrap().is_some());
    }

    #[test]
    fn test_exclusion_blocks_intermediate_search() {
        let (mut catalog, ids) = catalog_with(&["A", "B", "W"]);
        catalog.add_shift(ids[0], BursaWolfParameters::translation(ids[2], 1.0, 0.0, 0.0));
        catalog.add_shift(ids[1], BursaWolfParameters::translation(ids[2], 0.0, 1.0, 0.0));
        let resolver = DatumShiftResolver::new(&catalog);

        let excluded: Exclusion = [ids[0]].into_iter().collect();
        assert_eq!(resolver.resolve_excluding(ids[0], ids[1], &excluded), Ok(None));
        assert!(resolver.resolve(ids[0], ids[1]).unwrap().is_some());
    }

    #[test]
    fn test_unknown_handle_has_no_path() {
        let (catalog, ids) = catalog_with(&["A"]);
        assert_eq!(
            DatumShiftResolver::new(&catalog).resolve(ids[0], DatumId(42)),
            Ok(None)
        );
    }

    #[test]
    fn test_resolve_transform() {
        let (mut catalog, ids) = catalog_with(&["A", "B"]);
        catalog.add_shift(ids[0], BursaWolfParameters::translation(ids[1], 1.0, 2.0, 3.0));
        let t = DatumShiftResolver::new(&catalog)
            .resolve_transform(ids[0], ids[1])
            .unwrap()
            .unwrap();
        assert_eq!(t.source_dimensions(), 3);
        assert_eq!(t.transform(&[0.0, 0.0, 0.0]).unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
