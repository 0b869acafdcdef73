use super::CalibratedImage;

/// 显示窗口. 把原始强度线性映射到 8 位灰度, 只用于生成预览图.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct IntensityWindow {
    low: f32,
    high: f32,
}

impl IntensityWindow {
    /// 以强度下限 `low` 和上限 `high` 构建窗口.
    ///
    /// 两者必须是有限值且 `low < high`, 否则返回 `None`.
    pub fn new(low: f32, high: f32) -> Option<Self> {
        (low.is_finite() && high.is_finite() && low < high).then_some(Self { low, high })
    }

    /// 覆盖 `image` 全部有限强度值的窗口.
    ///
    /// 若图像为常数, 上限被抬高 1 以保证窗宽为正. 若不存在有限值, 返回 `None`.
    pub fn fit(image: &CalibratedImage) -> Option<Self> {
        let (lo, hi) = image.min_max()?;
        if lo < hi {
            Self::new(lo, hi)
        } else {
            Self::new(lo, lo + 1.0)
        }
    }

    /// 窗下限.
    #[inline]
    pub fn low(&self) -> f32 {
        self.low
    }

    /// 窗上限.
    #[inline]
    pub fn high(&self) -> f32 {
        self.high
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.high - self.low
    }

    /// 求 `value` 在当前窗口下对应的灰度值 (0 <= value <= 255).
    ///
    /// 如果 `value` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, value: f32) -> Option<u8> {
        if !value.is_finite() {
            return None;
        }
        if value <= self.low {
            Some(u8::MIN)
        } else if value >= self.high {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some(((value - self.low) / self.width() * 255.0) as u8)
        }
    }
}
