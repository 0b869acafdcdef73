//! 运行时错误.

use crate::Idx3d;
use ndarray_npy::{ReadNpzError, WriteNpzError};

/// 分析流程中可能出现的错误.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// 检测器前置条件缺失或参数非法 (如缺少标签图, 参数越界).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 输入目录下没有找到任何图像.
    #[error("no `.{ext}` images found in `{dir}`")]
    NoInput {
        /// 被搜索的目录.
        dir: String,
        /// 期望的扩展名.
        ext: &'static str,
    },

    /// 零体素对象. 说明上游检测器违反了约定.
    #[error("object {label} of population `{population}` has no voxel")]
    DegenerateObject {
        /// 对象所在集合的名字.
        population: String,
        /// 对象标签.
        label: u32,
    },

    /// 同一集合中出现重复标签.
    #[error("label {label} appears twice in population `{population}`")]
    DuplicateLabel {
        /// 对象所在集合的名字.
        population: String,
        /// 重复的标签.
        label: u32,
    },

    /// 对象或图像的坐标范围与目标图像不一致.
    #[error("image extent mismatch: expected {expected:?}, found {found:?}")]
    ImageMismatch {
        /// 目标图像形状 `(z, h, w)`.
        expected: Idx3d,
        /// 实际形状, 或越界对象的包围盒上界.
        found: Idx3d,
    },

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 读取 npz 文件错误.
    #[error(transparent)]
    ReadNpz(#[from] ReadNpzError),

    /// 写入 npz 文件错误.
    #[error(transparent)]
    WriteNpz(#[from] WriteNpzError),

    /// 图像编码错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// 分析运行时结果.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
