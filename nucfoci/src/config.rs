//! 分析参数.
//!
//! 所有参数集中在一个不可变的 [`AnalysisConfig`] 中, 在创建流程时传入.
//! 启用 `serde` 特性后, 可以从 JSON 等格式反序列化, 缺省字段取默认值.

use crate::{consts, AnalysisError, AnalysisResult, DilationKernel};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 闭区间 `[min, max]` 形式的面积范围, 以平方微米为单位.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AreaRange {
    /// 下限.
    pub min: f64,
    /// 上限.
    pub max: f64,
}

impl AreaRange {
    /// 直接初始化. 合法性由 [`AnalysisConfig::validated`] 检查.
    #[inline]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// 换算为体素个数范围.
    #[inline]
    pub fn to_voxels(&self, pixel_area: f64) -> (f64, f64) {
        (self.min / pixel_area, self.max / pixel_area)
    }

    fn check(&self, what: &str) -> AnalysisResult<()> {
        if self.min.is_finite() && self.max.is_finite() && 0.0 <= self.min && self.min <= self.max {
            Ok(())
        } else {
            Err(AnalysisError::Configuration(format!(
                "invalid {what} area range [{}, {}]",
                self.min, self.max
            )))
        }
    }
}

/// foci 膨胀半径, 以体素为单位.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DilationRadius {
    /// 水平方向半径.
    pub xy: f64,
    /// z 方向半径.
    pub z: f64,
}

impl Default for DilationRadius {
    fn default() -> Self {
        Self {
            xy: consts::DILATION_XY,
            z: consts::DILATION_Z,
        }
    }
}

impl DilationRadius {
    /// 构建对应的膨胀核. 半径非法时返回 `Configuration`.
    pub fn kernel(&self) -> AnalysisResult<DilationKernel> {
        DilationKernel::new(self.xy, self.z).ok_or_else(|| {
            AnalysisError::Configuration(format!("invalid dilation radius ({}, {})", self.xy, self.z))
        })
    }
}

/// npz 输入包中各条目的名字 (不含 `.npy` 后缀).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ChannelNames {
    /// RNF4 通道.
    pub rnf4: String,
    /// PML 通道.
    pub pml: String,
    /// RNF111 通道.
    pub rnf111: String,
    /// DAPI 通道.
    pub dapi: String,
    /// 细胞核标签图.
    pub nuclei_labels: String,
    /// PML foci 标签图.
    pub pml_labels: String,
    /// RNF4 foci 标签图.
    pub rnf4_labels: String,
    /// 标定信息.
    pub calibration: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        use consts::entry;
        Self {
            rnf4: entry::RNF4.to_string(),
            pml: entry::PML.to_string(),
            rnf111: entry::RNF111.to_string(),
            dapi: entry::DAPI.to_string(),
            nuclei_labels: entry::NUCLEI_LABELS.to_string(),
            pml_labels: entry::PML_LABELS.to_string(),
            rnf4_labels: entry::RNF4_LABELS.to_string(),
            calibration: entry::CALIBRATION.to_string(),
        }
    }
}

/// 完整分析参数.
///
/// 该结构是只读的. 若要修改, 用 `with_*` 方法得到新的实例后再调用
/// [`validated`](Self::validated).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AnalysisConfig {
    nucleus_area: AreaRange,
    nucleus_intensity_min: Option<f64>,
    exclude_border_nuclei: bool,
    foci_area: AreaRange,
    overlap_fraction: f64,
    dilation: DilationRadius,
    pixel_size_xy: Option<f64>,
    channels: ChannelNames,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            nucleus_area: AreaRange::new(30.0, 150.0),
            nucleus_intensity_min: None,
            exclude_border_nuclei: true,
            foci_area: AreaRange::new(0.01, 1.0),
            overlap_fraction: consts::OVERLAP_FRACTION,
            dilation: DilationRadius::default(),
            pixel_size_xy: None,
            channels: ChannelNames::default(),
        }
    }
}

impl AnalysisConfig {
    /// 以核心参数创建配置, 其余取默认值.
    pub fn new(
        nucleus_area: AreaRange,
        nucleus_intensity_min: Option<f64>,
        foci_area: AreaRange,
        overlap_fraction: f64,
        dilation: DilationRadius,
    ) -> AnalysisResult<Self> {
        Self {
            nucleus_area,
            nucleus_intensity_min,
            foci_area,
            overlap_fraction,
            dilation,
            ..Self::default()
        }
        .validated()
    }

    /// 检查所有参数, 合法时原样返回.
    pub fn validated(self) -> AnalysisResult<Self> {
        self.nucleus_area.check("nucleus")?;
        self.foci_area.check("foci")?;
        if let Some(min) = self.nucleus_intensity_min {
            if !min.is_finite() {
                return Err(AnalysisError::Configuration(format!(
                    "invalid nucleus intensity threshold {min}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.overlap_fraction) {
            return Err(AnalysisError::Configuration(format!(
                "overlap fraction {} is not in [0, 1]",
                self.overlap_fraction
            )));
        }
        self.dilation.kernel()?;
        if let Some(size) = self.pixel_size_xy {
            if !(size.is_finite() && size > 0.0) {
                return Err(AnalysisError::Configuration(format!("invalid pixel size {size}")));
            }
        }
        Ok(self)
    }

    /// 设置是否剔除接触图像水平边缘的细胞核.
    #[inline]
    pub fn with_exclude_border_nuclei(self, exclude: bool) -> Self {
        Self {
            exclude_border_nuclei: exclude,
            ..self
        }
    }

    /// 设置细胞核内 DAPI 平均强度下限. `None` 关闭该过滤.
    #[inline]
    pub fn with_nucleus_intensity_min(self, min: Option<f64>) -> Self {
        Self {
            nucleus_intensity_min: min,
            ..self
        }
    }

    /// 设置水平像素尺寸 (微米). 设置后覆盖输入包自带的标定信息.
    #[inline]
    pub fn with_pixel_size_xy(self, size: Option<f64>) -> Self {
        Self {
            pixel_size_xy: size,
            ..self
        }
    }

    /// 设置输入包条目名.
    #[inline]
    pub fn with_channels(self, channels: ChannelNames) -> Self {
        Self { channels, ..self }
    }

    /// 细胞核面积范围.
    #[inline]
    pub fn nucleus_area(&self) -> AreaRange {
        self.nucleus_area
    }

    /// 细胞核内 DAPI 平均强度下限. `None` 表示不按强度过滤.
    #[inline]
    pub fn nucleus_intensity_min(&self) -> Option<f64> {
        self.nucleus_intensity_min
    }

    /// 是否剔除接触图像水平边缘的细胞核.
    #[inline]
    pub fn exclude_border_nuclei(&self) -> bool {
        self.exclude_border_nuclei
    }

    /// foci 面积范围.
    #[inline]
    pub fn foci_area(&self) -> AreaRange {
        self.foci_area
    }

    /// 共定位判定的重叠比例.
    #[inline]
    pub fn overlap_fraction(&self) -> f64 {
        self.overlap_fraction
    }

    /// foci 膨胀半径.
    #[inline]
    pub fn dilation(&self) -> DilationRadius {
        self.dilation
    }

    /// 水平像素尺寸覆盖值.
    #[inline]
    pub fn pixel_size_xy(&self) -> Option<f64> {
        self.pixel_size_xy
    }

    /// 输入包条目名.
    #[inline]
    pub fn channels(&self) -> &ChannelNames {
        &self.channels
    }
}
