use super::npz::{to_labels, NpzBundleFile};
use crate::config::ChannelNames;
use crate::data::into_volume;
use crate::detect::ObjectRole;
use crate::{AnalysisError, AnalysisResult, Calibration, CalibratedImage, Idx3d};
use ndarray::Array3;
use std::path::Path;

/// 一幅图像的全部输入: 四个通道, 可选的标签图与标定信息.
///
/// 所有通道和标签图的形状一致. 该结构只读.
#[derive(Debug, Clone)]
pub struct ImageBundle {
    name: String,
    rnf4: CalibratedImage,
    pml: CalibratedImage,
    rnf111: CalibratedImage,
    dapi: CalibratedImage,
    nuclei_labels: Option<Array3<u32>>,
    pml_labels: Option<Array3<u32>>,
    rnf4_labels: Option<Array3<u32>>,
    calibration: Option<Calibration>,
}

impl ImageBundle {
    /// 由四个通道创建输入包. 各通道形状必须一致, 否则返回 `ImageMismatch`.
    pub fn new(
        name: impl Into<String>,
        rnf4: CalibratedImage,
        pml: CalibratedImage,
        rnf111: CalibratedImage,
        dapi: CalibratedImage,
    ) -> AnalysisResult<Self> {
        let shape = rnf4.shape();
        pml.ensure_shape(shape)?;
        rnf111.ensure_shape(shape)?;
        dapi.ensure_shape(shape)?;
        Ok(Self {
            name: name.into(),
            rnf4,
            pml,
            rnf111,
            dapi,
            nuclei_labels: None,
            pml_labels: None,
            rnf4_labels: None,
            calibration: None,
        })
    }

    /// 附加角色 `role` 的标签图. 形状与通道不一致时返回 `ImageMismatch`.
    pub fn with_labels(mut self, role: ObjectRole, labels: Array3<u32>) -> AnalysisResult<Self> {
        if labels.dim() != self.shape() {
            return Err(AnalysisError::ImageMismatch {
                expected: self.shape(),
                found: labels.dim(),
            });
        }
        let slot = match role {
            ObjectRole::Nucleus => &mut self.nuclei_labels,
            ObjectRole::Pml => &mut self.pml_labels,
            ObjectRole::Rnf4 => &mut self.rnf4_labels,
        };
        *slot = Some(labels);
        Ok(self)
    }

    /// 附加标定信息.
    #[inline]
    pub fn with_calibration(self, calibration: Calibration) -> Self {
        Self {
            calibration: Some(calibration),
            ..self
        }
    }

    /// 从 npz 文件 `path` 读取输入包, 条目名由 `channels` 给出.
    ///
    /// 四个通道必须存在; 标签图与标定信息可缺省. 通道可以是 2D `(H, W)` 或
    /// 3D `(Z, H, W)` 的任意数值类型数组.
    pub fn open<P: AsRef<Path>>(path: P, channels: &ChannelNames) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = NpzBundleFile::open(path)?;

        let mut channel = |entry: &str| -> AnalysisResult<CalibratedImage> {
            CalibratedImage::from_dyn(file.require(entry)?)
        };
        let rnf4 = channel(channels.rnf4.as_str())?;
        let pml = channel(channels.pml.as_str())?;
        let rnf111 = channel(channels.rnf111.as_str())?;
        let dapi = channel(channels.dapi.as_str())?;
        let mut bundle = Self::new(name, rnf4, pml, rnf111, dapi)?;

        for (role, entry) in [
            (ObjectRole::Nucleus, &channels.nuclei_labels),
            (ObjectRole::Pml, &channels.pml_labels),
            (ObjectRole::Rnf4, &channels.rnf4_labels),
        ] {
            if let Some(arr) = file.read(entry)? {
                bundle = bundle.with_labels(role, into_volume(to_labels(arr, entry)?)?)?;
            }
        }

        if let Some(values) = file.read(&channels.calibration)? {
            let values: Vec<f64> = values.iter().copied().collect();
            let calibration = Calibration::from_values(&values).ok_or_else(|| {
                AnalysisError::Configuration(format!("invalid calibration {values:?}"))
            })?;
            bundle = bundle.with_calibration(calibration);
        }
        Ok(bundle)
    }

    /// 图像名 (文件名去掉扩展名).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 图像形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.rnf4.shape()
    }

    /// RNF4 通道.
    #[inline]
    pub fn rnf4(&self) -> &CalibratedImage {
        &self.rnf4
    }

    /// PML 通道.
    #[inline]
    pub fn pml(&self) -> &CalibratedImage {
        &self.pml
    }

    /// RNF111 通道.
    #[inline]
    pub fn rnf111(&self) -> &CalibratedImage {
        &self.rnf111
    }

    /// DAPI 通道.
    #[inline]
    pub fn dapi(&self) -> &CalibratedImage {
        &self.dapi
    }

    /// 角色 `role` 的标签图.
    pub fn labels(&self, role: ObjectRole) -> Option<&Array3<u32>> {
        match role {
            ObjectRole::Nucleus => self.nuclei_labels.as_ref(),
            ObjectRole::Pml => self.pml_labels.as_ref(),
            ObjectRole::Rnf4 => self.rnf4_labels.as_ref(),
        }
    }

    /// 输入包自带的标定信息.
    #[inline]
    pub fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }
}

#[cfg(test)]
mod tests {
    use super::ImageBundle;
    use crate::config::ChannelNames;
    use crate::detect::ObjectRole;
    use crate::{AnalysisError, CalibratedImage};
    use ndarray::{arr1, Array2, Array3};
    use ndarray_npy::NpzWriter;
    use std::fs::File;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("nucfoci-{}-{name}", std::process::id()));
        p
    }

    #[test]
    fn test_shape_mismatch() {
        let a = CalibratedImage::new(Array3::zeros((1, 4, 4)));
        let b = CalibratedImage::new(Array3::zeros((1, 4, 5)));
        let err = ImageBundle::new("x", a.clone(), a.clone(), b, a.clone()).unwrap_err();
        assert!(matches!(err, AnalysisError::ImageMismatch { .. }));

        let bundle = ImageBundle::new("x", a.clone(), a.clone(), a.clone(), a).unwrap();
        assert!(bundle
            .with_labels(ObjectRole::Pml, Array3::zeros((2, 4, 4)))
            .is_err());
    }

    #[test]
    fn test_open_npz() {
        let path = temp_path("bundle.npz");
        {
            let mut w = NpzWriter::new(File::create(&path).unwrap());
            let channel = Array2::<u16>::from_elem((3, 4), 7);
            for name in ["rnf4", "pml", "rnf111", "dapi"] {
                w.add_array(format!("{name}.npy"), &channel).unwrap();
            }
            let mut labels = Array2::<u8>::zeros((3, 4));
            labels[(1, 1)] = 2;
            w.add_array("nuclei_labels.npy", &labels).unwrap();
            w.add_array("calibration.npy", &arr1(&[0.1f64])).unwrap();
            w.finish().unwrap();
        }

        let bundle = ImageBundle::open(&path, &ChannelNames::default()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(bundle.name(), format!("nucfoci-{}-bundle", std::process::id()));
        assert_eq!(bundle.shape(), (1, 3, 4));
        assert_eq!(bundle.pml()[(0, 2, 3)], 7.0);
        assert_eq!(bundle.labels(ObjectRole::Nucleus).unwrap()[(0, 1, 1)], 2);
        assert!(bundle.labels(ObjectRole::Rnf4).is_none());
        assert!((bundle.calibration().unwrap().pixel_area() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_open_missing_channel() {
        let path = temp_path("partial.npz");
        {
            let mut w = NpzWriter::new(File::create(&path).unwrap());
            w.add_array("pml.npy", &Array2::<f32>::zeros((2, 2))).unwrap();
            w.finish().unwrap();
        }
        let err = ImageBundle::open(&path, &ChannelNames::default()).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }
}
