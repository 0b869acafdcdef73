//! 检测器边界.
//!
//! 像素级分割由上游完成. 本模块只规定检测器的接口 [`Detector`], 并提供从输入包中
//! 读取预先计算好的标签图的实现 [`StoredLabels`].

use crate::dataset::ImageBundle;
use crate::{AnalysisError, AnalysisResult, ObjectPopulation};
use std::fmt;

/// 对象在分析中的角色.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRole {
    /// 细胞核 (DAPI).
    Nucleus,
    /// PML foci.
    Pml,
    /// RNF4 foci.
    Rnf4,
}

impl ObjectRole {
    /// 角色名. 同时用作对象集合名.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectRole::Nucleus => "nuclei",
            ObjectRole::Pml => "pml",
            ObjectRole::Rnf4 => "rnf4",
        }
    }
}

impl fmt::Display for ObjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 对象检测器. 从一幅图像的输入包中检测某一角色的全部对象.
///
/// 实现者负责自己的并发控制; 流程只通过 `&self` 调用它.
pub trait Detector {
    /// 检测 `bundle` 中角色为 `role` 的对象.
    ///
    /// 检测器前置条件缺失 (如缺少模型或标签图) 时返回 `Configuration`.
    fn detect(&self, bundle: &ImageBundle, role: ObjectRole) -> AnalysisResult<ObjectPopulation>;
}

/// 读取输入包中预先计算好的标签图作为检测结果.
///
/// 每个非零标签对应一个对象, 集合按标签升序排列.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredLabels;

impl Detector for StoredLabels {
    fn detect(&self, bundle: &ImageBundle, role: ObjectRole) -> AnalysisResult<ObjectPopulation> {
        let labels = bundle.labels(role).ok_or_else(|| {
            AnalysisError::Configuration(format!(
                "image `{}` carries no {role} label image",
                bundle.name()
            ))
        })?;
        ObjectPopulation::from_label_image(role.name(), labels)
    }
}
