//! ZPROJ 核心
//!
//! 提供坐标变换的代数与组合功能：
//!
//! - `Matrix`: 通用矩阵代数（求逆、乘法、容差比较）
//! - `AffineTransform2D`: 带逆变换缓存的2D仿射适配器
//! - `Transform`: 仿射、串联、直通、参数化及逆变换的统一表示
//! - `TransformFactory`: 按操作方法名构建并组合变换
//! - `DatumShiftResolver`: 在 Bursa-Wolf 参数图上搜索基准转换路径
//! - `Ellipsoid`: 参考椭球与大地线距离
//!
//! # 示例
//!
//! ```rust
//! use zproj_core::prelude::*;
//!
//! let factory = TransformFactory::default();
//! let scale = factory
//!     .parameterized_transform("Affine", &ParameterValues::new().with("elt_0_0", 2.0))
//!     .unwrap();
//! let shift = Transform::affine(AffineTransform2D::translation(1.0, 0.0));
//! let t = factory.concatenate(scale, shift).unwrap();
//!
//! assert_eq!(t.transform(&[1.0, 1.0]).unwrap(), vec![3.0, 1.0]);
//! ```

pub mod affine;
pub mod datum;
pub mod datum_shift;
pub mod ellipsoid;
pub mod error;
pub mod factory;
pub mod filter;
pub mod geodesic;
pub mod math;
pub mod matrix;
pub mod method;
pub mod transform;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::affine::AffineTransform2D;
    pub use crate::datum::{BursaWolfParameters, Datum, DatumCatalog, DatumId};
    pub use crate::datum_shift::DatumShiftResolver;
    pub use crate::ellipsoid::{Ellipsoid, LinearUnit};
    pub use crate::error::{FilterError, TransformError};
    pub use crate::factory::{FactoryConfig, MethodRegistry, TransformFactory};
    pub use crate::filter::{Coordinate, CoordinateFilter};
    pub use crate::geodesic::Geodesic;
    pub use crate::math::{BoundingBox2, Point2, Point3, Vector2, Vector3};
    pub use crate::matrix::Matrix;
    pub use crate::method::{
        AffineMethod, OperationMethod, ParameterValue, ParameterValues, ParameterizedTransform,
    };
    pub use crate::transform::{Transform, TransformKind};
}
