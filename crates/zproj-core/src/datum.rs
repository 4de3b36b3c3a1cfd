//! 大地基准与 Bursa-Wolf 参数
//!
//! 基准存放在 [`DatumCatalog`] 中，转换参数通过 [`DatumId`] 句柄引用目标基准，
//! 因此基准之间可以相互（甚至循环）引用而不涉及所有权。

use crate::ellipsoid::Ellipsoid;
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// 角秒到弧度
const SEC_TO_RAD: f64 = PI / (180.0 * 3600.0);

/// 基准句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatumId(pub usize);

impl fmt::Display for DatumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bursa-Wolf 七参数
///
/// 平移（米）、旋转（角秒）、尺度（百万分之一），描述到 `target` 基准的地心坐标转换。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BursaWolfParameters {
    pub target: DatumId,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    #[serde(default)]
    pub dz: f64,
    #[serde(default)]
    pub ex: f64,
    #[serde(default)]
    pub ey: f64,
    #[serde(default)]
    pub ez: f64,
    #[serde(default)]
    pub ppm: f64,
}

impl BursaWolfParameters {
    /// 创建恒等参数
    pub fn identity(target: DatumId) -> Self {
        Self {
            target,
            dx: 0.0,
            dy: 0.0,
            dz: 0.0,
            ex: 0.0,
            ey: 0.0,
            ez: 0.0,
            ppm: 0.0,
        }
    }

    /// 仅含平移的参数
    pub fn translation(target: DatumId, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            dx,
            dy,
            dz,
            ..Self::identity(target)
        }
    }

    pub fn is_identity(&self) -> bool {
        self.is_translation() && self.dx == 0.0 && self.dy == 0.0 && self.dz == 0.0
    }

    /// 是否只有平移分量
    pub fn is_translation(&self) -> bool {
        self.ex == 0.0 && self.ey == 0.0 && self.ez == 0.0 && self.ppm == 0.0
    }

    /// 转换为 4×4 地心仿射矩阵
    pub fn to_matrix(&self) -> Matrix {
        let s = 1.0 + self.ppm / 1e6;
        let rs = SEC_TO_RAD * s;
        let mut m = Matrix::identity(4);
        let rows = [
            [s, -self.ez * rs, self.ey * rs, self.dx],
            [self.ez * rs, s, -self.ex * rs, self.dy],
            [-self.ey * rs, self.ex * rs, s, self.dz],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m.set(r, c, *v);
            }
        }
        m
    }

    /// 从 4×4 仿射矩阵反推参数（假定旋转为小角度），矩阵形状不符时返回 `None`
    pub fn from_matrix(target: DatumId, matrix: &Matrix) -> Option<Self> {
        if matrix.row_count() != 4 || matrix.col_count() != 4 || !matrix.is_affine() {
            return None;
        }
        let s = (matrix.get(0, 0) + matrix.get(1, 1) + matrix.get(2, 2)) / 3.0;
        let rs = SEC_TO_RAD * s;
        Some(Self {
            target,
            dx: matrix.get(0, 3),
            dy: matrix.get(1, 3),
            dz: matrix.get(2, 3),
            ex: 0.5 * (matrix.get(2, 1) - matrix.get(1, 2)) / rs,
            ey: 0.5 * (matrix.get(0, 2) - matrix.get(2, 0)) / rs,
            ez: 0.5 * (matrix.get(1, 0) - matrix.get(0, 1)) / rs,
            ppm: (s - 1.0) * 1e6,
        })
    }
}

/// 大地基准
#[derive(Debug, Clone)]
pub struct Datum {
    pub name: String,
    pub ellipsoid: Option<Ellipsoid>,
    shifts: Vec<BursaWolfParameters>,
}

impl Datum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ellipsoid: None,
            shifts: Vec::new(),
        }
    }

    pub fn with_ellipsoid(mut self, ellipsoid: Ellipsoid) -> Self {
        self.ellipsoid = Some(ellipsoid);
        self
    }

    /// 转换参数列表（允许对同一目标有多条，查找时取第一条）
    pub fn shifts(&self) -> &[BursaWolfParameters] {
        &self.shifts
    }

    /// 到 `target` 的第一条转换参数
    pub fn shift_to(&self, target: DatumId) -> Option<&BursaWolfParameters> {
        self.shifts.iter().find(|p| p.target == target)
    }
}

/// 基准目录（基准的所有者）
#[derive(Debug, Clone, Default)]
pub struct DatumCatalog {
    datums: Vec<Datum>,
}

impl DatumCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加基准并返回其句柄
    pub fn add(&mut self, datum: Datum) -> DatumId {
        self.datums.push(datum);
        DatumId(self.datums.len() - 1)
    }

    pub fn get(&self, id: DatumId) -> Option<&Datum> {
        self.datums.get(id.0)
    }

    /// 按名称查找（不区分大小写）
    pub fn find(&self, name: &str) -> Option<DatumId> {
        self.datums
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name))
            .map(DatumId)
    }

    /// 为 `source` 添加一条转换参数，`source` 不存在时返回 `false`
    pub fn add_shift(&mut self, source: DatumId, parameters: BursaWolfParameters) -> bool {
        match self.datums.get_mut(source.0) {
            Some(datum) => {
                datum.shifts.push(parameters);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.datums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DatumId, &Datum)> {
        self.datums.iter().enumerate().map(|(i, d)| (DatumId(i), d))
    }
}
