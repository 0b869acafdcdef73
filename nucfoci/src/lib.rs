#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供荧光显微图像中细胞核 (DAPI) 与两类核内点状结构
//! (PML foci, RNF4 foci) 的归属、形态/强度测量与共定位统计.
//!
//! 像素级分割 (细胞核、PML、RNF4 的检测器) 不在本 crate 内实现.
//! 本 crate 只消费上游检测器给出的带标签对象集合 ([`ObjectPopulation`])
//! 与各通道强度图 ([`CalibratedImage`]), 并产出每个细胞核一行的测量结果.
//!
//! # 注意
//!
//! 1. 所有坐标均按 `(z, h, w)` 组织. 二维图像视为 `z` 方向长度为 1 的三维图像.
//! 2. 面积一律以标定单位 (体素个数乘以单像素面积) 给出,
//!   强度一律为原始像素值之和 (raw integrated density).
//! 3. 非期望输入 (空对象、形状不一致的图像) 通过 [`AnalysisError`] 返回, 而不是 panic.
//!
//! # 功能概览
//!
//! ### 对象模型 ✅
//!
//! 体素集合、质心、包含判断、各向异性膨胀、绘制.
//!
//! 实现位于 `nucfoci/src/object`.
//!
//! ### 细胞核归属 ✅
//!
//! 以 foci 质心体素是否落在细胞核内为准, 把两类 foci 分配给各细胞核.
//!
//! 实现位于 `nucfoci/src/assign.rs`.
//!
//! ### 单核测量 ✅
//!
//! 面积、各通道积分强度、foci 个数/面积/强度, 以及扣除膨胀 foci 后的弥散信号.
//!
//! 实现位于 `nucfoci/src/nucleus.rs`.
//!
//! ### 共定位 ✅
//!
//! 两类 foci 两两重叠体素数, 非对称的 25% 阈值判定与总重叠面积.
//!
//! 实现位于 `nucfoci/src/coloc.rs`.
//!
//! ### 批处理支撑 ✅
//!
//! npz 输入包加载、检测器适配、对象过滤、结果表与叠加图输出.
//!
//! 实现位于 `nucfoci/src/{dataset, detect.rs, pipeline.rs, report.rs, overlay.rs}`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 带符号三维偏移量. 膨胀核会用到. 该结构不对外公开.
type Offset3d = (isize, isize, isize);

mod error;

pub use error::{AnalysisError, AnalysisResult};

pub mod consts;

/// 强度图与标定信息.
mod data;

pub use data::{Calibration, CalibratedImage, IntensityWindow};

pub mod object;

pub use object::{DilationKernel, ObjectPopulation, SpatialObject};

pub mod assign;
pub mod coloc;
pub mod config;
pub mod dataset;
pub mod detect;
pub mod nucleus;
pub mod overlay;
pub mod pipeline;
pub mod prelude;
pub mod report;
