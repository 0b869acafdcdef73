use std::ops::Index;

use ndarray::{Array2, Array3, ArrayD, ArrayView3, Axis, Ix2, Ix3};
use num::ToPrimitive;

use crate::{AnalysisError, AnalysisResult, Idx3d, SpatialObject};

mod window;

pub use window::IntensityWindow;

/// 把 2D `(H, W)` 或 3D `(Z, H, W)` 的动态维度数组统一为 3D.
pub(crate) fn into_volume<T>(arr: ArrayD<T>) -> AnalysisResult<Array3<T>> {
    let ndim = arr.ndim();
    let bad_shape = |_| AnalysisError::Configuration(format!("cannot view a {ndim}D array as an image"));
    match ndim {
        2 => Ok(arr.into_dimensionality::<Ix2>().map_err(bad_shape)?.insert_axis(Axis(0))),
        3 => arr.into_dimensionality::<Ix3>().map_err(bad_shape),
        _ => Err(AnalysisError::Configuration(format!(
            "expected a 2D or 3D array, found {ndim}D"
        ))),
    }
}

/// 图像标定信息, 即单个像素/体素的物理尺寸 (单位: 微米).
///
/// 该结构是只读的. 若要修改, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    pixel_width: f64,
    pixel_height: f64,
    pixel_depth: f64,
}

impl Calibration {
    /// 构建标定信息. 三个尺寸都必须是正的有限值, 否则返回 `None`.
    pub fn new(pixel_width: f64, pixel_height: f64, pixel_depth: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(pixel_width) && valid(pixel_height) && valid(pixel_depth)).then_some(Self {
            pixel_width,
            pixel_height,
            pixel_depth,
        })
    }

    /// 水平方向各向同性的标定, z 方向尺寸取 1.
    #[inline]
    pub fn isotropic_xy(pixel_size: f64) -> Option<Self> {
        Self::new(pixel_size, pixel_size, 1.0)
    }

    /// 从 `[width]` 或 `[width, height, depth]` 格式的数值创建标定信息.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        match *values {
            [w] => Self::isotropic_xy(w),
            [w, h, d] => Self::new(w, h, d),
            _ => None,
        }
    }

    /// 用 `pixel_size` 覆盖水平方向尺寸, z 方向保持不变.
    #[inline]
    pub fn with_xy(&self, pixel_size: f64) -> Option<Self> {
        Self::new(pixel_size, pixel_size, self.pixel_depth)
    }

    /// 像素宽度.
    #[inline]
    pub fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    /// 像素高度.
    #[inline]
    pub fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    /// 像素深度 (z 方向).
    #[inline]
    pub fn pixel_depth(&self) -> f64 {
        self.pixel_depth
    }

    /// 单像素的物理面积, 以平方微米为单位.
    #[inline]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }
}

/// 单通道强度图. 与对象共享 `(z, h, w)` 坐标空间, 原始强度以 `f32` 保存.
///
/// 测量过程中该结构只读. 需要擦除时, 先复制再修改副本.
#[derive(Debug, Clone)]
pub struct CalibratedImage {
    data: Array3<f32>,
}

impl Index<Idx3d> for CalibratedImage {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CalibratedImage {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// 从任意数值类型的 2D 或 3D 动态维度数组创建强度图.
    ///
    /// 无法用 `f32` 表示的值会被记为 `NaN`.
    pub fn from_dyn<T: ToPrimitive + Copy>(arr: ArrayD<T>) -> AnalysisResult<Self> {
        let data = arr.mapv(|v| v.to_f32().unwrap_or(f32::NAN));
        Ok(Self::new(into_volume(data)?))
    }

    /// 图像形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 检查形状是否与 `shape` 一致. 若不一致返回 `ImageMismatch`.
    pub fn ensure_shape(&self, shape: Idx3d) -> AnalysisResult<()> {
        if self.shape() == shape {
            Ok(())
        } else {
            Err(AnalysisError::ImageMismatch {
                expected: shape,
                found: self.shape(),
            })
        }
    }

    /// 计算 `obj` 所有体素上的原始强度之和 (raw integrated density).
    ///
    /// 若 `obj` 超出图像范围返回 `ImageMismatch`.
    pub fn sum_over(&self, obj: &SpatialObject) -> AnalysisResult<f64> {
        obj.ensure_within(self.shape())?;
        Ok(obj.voxels().iter().map(|&pos| self.data[pos] as f64).sum())
    }

    /// 计算 `obj` 所有体素上的平均强度.
    pub fn mean_over(&self, obj: &SpatialObject) -> AnalysisResult<f64> {
        Ok(self.sum_over(obj)? / obj.size() as f64)
    }

    /// 沿 z 方向的最大值投影.
    pub fn max_projection(&self) -> Array2<f32> {
        self.data
            .fold_axis(Axis(0), f32::NEG_INFINITY, |acc, &v| acc.max(v))
    }

    /// 有限强度值的最小值和最大值. 若不存在有限值返回 `None`.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{into_volume, Calibration, CalibratedImage};
    use crate::object::tests::rect;
    use crate::AnalysisError;
    use ndarray::{Array3, ArrayD, IxDyn};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    #[test]
    fn test_calibration() {
        assert!(Calibration::new(0.0, 1.0, 1.0).is_none());
        assert!(Calibration::new(1.0, f64::NAN, 1.0).is_none());
        let c = Calibration::from_values(&[0.1]).unwrap();
        assert!(f64_eq(c.pixel_area(), 0.01));
        assert!(f64_eq(c.pixel_depth(), 1.0));
        let c = Calibration::from_values(&[0.2, 0.3, 2.0]).unwrap();
        assert!(f64_eq(c.pixel_area(), 0.06));
        assert!(f64_eq(c.with_xy(0.5).unwrap().pixel_area(), 0.25));
        assert!(Calibration::from_values(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_into_volume() {
        let a = into_volume(ArrayD::<u8>::zeros(IxDyn(&[4, 5]))).unwrap();
        assert_eq!(a.dim(), (1, 4, 5));
        let a = into_volume(ArrayD::<u8>::zeros(IxDyn(&[2, 4, 5]))).unwrap();
        assert_eq!(a.dim(), (2, 4, 5));
        assert!(into_volume(ArrayD::<u8>::zeros(IxDyn(&[5]))).is_err());
    }

    #[test]
    fn test_sum_over() {
        let data = Array3::from_shape_fn((1, 4, 4), |(_, h, w)| (h * 4 + w) as f32);
        let img = CalibratedImage::new(data);
        // (0,0)=0 (0,1)=1 (1,0)=4 (1,1)=5
        assert!(f64_eq(img.sum_over(&rect(1, (0, 0), (2, 2))).unwrap(), 10.0));
        assert!(f64_eq(img.mean_over(&rect(1, (0, 0), (2, 2))).unwrap(), 2.5));
    }

    #[test]
    fn test_sum_over_out_of_bounds_fails_closed() {
        let img = CalibratedImage::new(Array3::zeros((1, 4, 4)));
        let err = img.sum_over(&rect(1, (3, 3), (2, 2))).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ImageMismatch {
                expected: (1, 4, 4),
                found: (1, 5, 5)
            }
        ));
    }

    #[test]
    fn test_projection_and_range() {
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[(1, 0, 1)] = 7.0;
        data[(0, 1, 1)] = -1.0;
        let img = CalibratedImage::new(data);
        let p = img.max_projection();
        assert_eq!(p[(0, 1)], 7.0);
        assert_eq!(p[(1, 1)], 0.0);
        assert_eq!(img.min_max(), Some((-1.0, 7.0)));
    }
}
