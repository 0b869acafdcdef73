//! 单幅图像的完整分析流程: 检测, 过滤, 归属, 测量, 绘制.

use crate::assign::{assign_foci, NucleusRecord};
use crate::config::AnalysisConfig;
use crate::dataset::ImageBundle;
use crate::detect::{Detector, ObjectRole};
use crate::nucleus::{MeasureChannels, Measurer};
use crate::overlay::Overlay;
use crate::report::MeasurementRow;
use crate::{AnalysisError, AnalysisResult, Calibration, ObjectPopulation};
use log::info;

/// 一幅图像的分析结果.
#[derive(Debug, Clone)]
pub struct ImageReport {
    name: String,
    calibration: Calibration,
    rows: Vec<MeasurementRow>,
    overlay: Overlay,
}

impl ImageReport {
    /// 图像名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 实际使用的标定信息.
    #[inline]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// 每个细胞核一行, 顺序与细胞核集合一致.
    #[inline]
    pub fn rows(&self) -> &[MeasurementRow] {
        &self.rows
    }

    /// 结果叠加图.
    #[inline]
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }
}

#[cfg(feature = "rayon")]
#[inline]
fn measure_rows(
    m: &Measurer,
    records: &[NucleusRecord<'_>],
    channels: &MeasureChannels<'_>,
) -> AnalysisResult<Vec<MeasurementRow>> {
    m.par_measure_all(records, channels)
}

#[cfg(not(feature = "rayon"))]
#[inline]
fn measure_rows(
    m: &Measurer,
    records: &[NucleusRecord<'_>],
    channels: &MeasureChannels<'_>,
) -> AnalysisResult<Vec<MeasurementRow>> {
    m.measure_all(records, channels)
}

/// 分析流程. 持有不可变的配置与一个检测器.
#[derive(Debug, Clone)]
pub struct Pipeline<D: Detector> {
    config: AnalysisConfig,
    detector: D,
}

impl<D: Detector> Pipeline<D> {
    /// 创建流程. `config` 非法时返回 `Configuration`.
    pub fn new(config: AnalysisConfig, detector: D) -> AnalysisResult<Self> {
        Ok(Self {
            config: config.validated()?,
            detector,
        })
    }

    /// 分析参数.
    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// 确定 `bundle` 使用的标定信息.
    ///
    /// 配置中的水平像素尺寸优先于输入包自带的标定. 两者都没有时返回 `Configuration`.
    pub fn calibration(&self, bundle: &ImageBundle) -> AnalysisResult<Calibration> {
        let resolved = match (self.config.pixel_size_xy(), bundle.calibration()) {
            (Some(size), Some(cal)) => cal.with_xy(size),
            (Some(size), None) => Calibration::isotropic_xy(size),
            (None, cal) => cal,
        };
        resolved.ok_or_else(|| {
            AnalysisError::Configuration(format!(
                "no calibration for image `{}`; set `pixel_size_xy`",
                bundle.name()
            ))
        })
    }

    /// 检测并过滤细胞核: 面积范围, 水平边缘, 以及 (配置了下限时) DAPI 平均强度.
    /// 过滤后标签重置为 `1..=n`.
    pub fn detect_nuclei(&self, bundle: &ImageBundle, pixel_area: f64) -> AnalysisResult<ObjectPopulation> {
        let mut pop = self.detector.detect(bundle, ObjectRole::Nucleus)?;
        info!("nuclei detected: {}", pop.len());

        let (lo, hi) = self.config.nucleus_area().to_voxels(pixel_area);
        pop.filter_size(lo, hi);
        if self.config.exclude_border_nuclei() {
            pop.exclude_borders_xy(bundle.shape());
        }
        if let Some(min) = self.config.nucleus_intensity_min() {
            pop.filter_min_mean_intensity(bundle.dapi(), min)?;
        }
        info!("nuclei remaining after filtering: {}", pop.len());

        pop.reset_labels();
        Ok(pop)
    }

    /// 检测并按面积范围过滤一类 foci. 过滤后标签重置为 `1..=n`.
    pub fn detect_foci(
        &self,
        bundle: &ImageBundle,
        role: ObjectRole,
        pixel_area: f64,
    ) -> AnalysisResult<ObjectPopulation> {
        let mut pop = self.detector.detect(bundle, role)?;
        info!("{role} foci detected: {}", pop.len());

        let (lo, hi) = self.config.foci_area().to_voxels(pixel_area);
        pop.filter_size(lo, hi);
        info!("{role} foci remaining after filtering: {}", pop.len());

        pop.reset_labels();
        Ok(pop)
    }

    /// 分析一幅图像. 每个通过过滤的细胞核恰好产生一行结果.
    ///
    /// 任一细胞核测量失败时, 整幅图像失败, 不产生部分结果.
    pub fn process(&self, bundle: &ImageBundle) -> AnalysisResult<ImageReport> {
        info!("--- analyzing image {} ---", bundle.name());
        let calibration = self.calibration(bundle)?;
        let pixel_area = calibration.pixel_area();

        let nuclei = self.detect_nuclei(bundle, pixel_area)?;
        let pml = self.detect_foci(bundle, ObjectRole::Pml, pixel_area)?;
        let rnf4 = self.detect_foci(bundle, ObjectRole::Rnf4, pixel_area)?;
        for obj in nuclei.iter().chain(pml.iter()).chain(rnf4.iter()) {
            obj.ensure_within(bundle.shape())?;
        }

        let records = assign_foci(&nuclei, &pml, &rnf4);
        let measurer = Measurer::from_config(&self.config, pixel_area)?;
        let channels = MeasureChannels {
            pml: bundle.pml(),
            rnf4: bundle.rnf4(),
            rnf111: bundle.rnf111(),
        };
        let rows = measure_rows(&measurer, &records, &channels)?;
        let overlay = Overlay::draw(&records, bundle.shape())?;
        info!("{} nuclei measured", rows.len());

        Ok(ImageReport {
            name: bundle.name().to_string(),
            calibration,
            rows,
            overlay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Pipeline;
    use crate::config::{AnalysisConfig, AreaRange, DilationRadius};
    use crate::dataset::ImageBundle;
    use crate::detect::{ObjectRole, StoredLabels};
    use crate::{AnalysisError, Calibration, CalibratedImage};
    use ndarray::{s, Array3};

    const SHAPE: (usize, usize, usize) = (1, 30, 30);

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(
            AreaRange::new(30.0, 150.0),
            Some(5000.0),
            AreaRange::new(1.0, 10.0),
            0.25,
            DilationRadius::default(),
        )
        .unwrap()
    }

    /// 三个细胞核: 7 号合格, 8 号接触边缘, 9 号 DAPI 太暗.
    fn bundle() -> ImageBundle {
        let mut nuclei = Array3::<u32>::zeros(SHAPE);
        nuclei.slice_mut(s![.., 5..15, 5..15]).fill(7);
        nuclei.slice_mut(s![.., 0..8, 20..28]).fill(8);
        nuclei.slice_mut(s![.., 18..26, 18..26]).fill(9);

        let mut dapi = Array3::<f32>::from_elem(SHAPE, 6000.0);
        dapi.slice_mut(s![.., 18..26, 18..26]).fill(100.0);

        let mut pml = Array3::<u32>::zeros(SHAPE);
        pml.slice_mut(s![.., 7, 7..10]).fill(1);
        pml.slice_mut(s![.., 11, 6..11]).fill(2);
        // 面积 25, 超出范围
        pml.slice_mut(s![.., 20..25, 20..25]).fill(3);

        let mut rnf4 = Array3::<u32>::zeros(SHAPE);
        rnf4.slice_mut(s![.., 6..8, 8..10]).fill(5);

        let ones = || CalibratedImage::new(Array3::from_elem(SHAPE, 1.0));
        ImageBundle::new("synthetic", ones(), ones(), ones(), CalibratedImage::new(dapi))
            .unwrap()
            .with_labels(ObjectRole::Nucleus, nuclei)
            .unwrap()
            .with_labels(ObjectRole::Pml, pml)
            .unwrap()
            .with_labels(ObjectRole::Rnf4, rnf4)
            .unwrap()
            .with_calibration(Calibration::isotropic_xy(1.0).unwrap())
    }

    #[test]
    fn test_process() {
        let _ = simple_logger::init_with_level(log::Level::Debug);
        let p = Pipeline::new(config(), StoredLabels).unwrap();
        let report = p.process(&bundle()).unwrap();
        assert_eq!(report.name(), "synthetic");
        assert_eq!(report.rows().len(), 1);

        let row = &report.rows()[0];
        assert_eq!(row.nucleus_id, 1);
        assert_eq!(row.nucleus_area, 100.0);
        assert_eq!(row.pml_foci_count, 2);
        assert_eq!(row.pml_foci_area, 8.0);
        assert_eq!(row.rnf4_foci_count, 1);
        assert_eq!(row.rnf4_foci_area, 4.0);
        assert_eq!(row.rnf4_positive_pml_count, 1);
        assert_eq!(row.rnf4_positive_pml_area, 3.0);
        assert_eq!(row.pml_positive_rnf4_count, 1);
        assert_eq!(row.overlap_area, 2.0);
        assert!(row.pml_diffuse_intensity < row.pml_intensity);

        assert_eq!(report.overlay().nuclei()[(0, 10, 10)], 1);
        assert_eq!(report.overlay().nuclei()[(0, 20, 20)], 0);
    }

    #[test]
    fn test_border_nuclei_kept_when_disabled() {
        let p = Pipeline::new(config().with_exclude_border_nuclei(false), StoredLabels).unwrap();
        let report = p.process(&bundle()).unwrap();
        assert_eq!(report.rows().len(), 2);
        assert_eq!(report.rows()[1].nucleus_id, 2);
        assert_eq!(report.rows()[1].nucleus_area, 64.0);
    }

    /// 默认配置不按 DAPI 强度过滤, 8 位数据中的暗细胞核照常输出.
    #[test]
    fn test_dim_nucleus_kept_by_default() {
        let mut nuclei = Array3::<u32>::zeros(SHAPE);
        nuclei.slice_mut(s![.., 5..15, 5..15]).fill(1);
        let img = || CalibratedImage::new(Array3::from_elem(SHAPE, 200.0));
        let b = ImageBundle::new("dim", img(), img(), img(), img())
            .unwrap()
            .with_labels(ObjectRole::Nucleus, nuclei)
            .unwrap()
            .with_labels(ObjectRole::Pml, Array3::zeros(SHAPE))
            .unwrap()
            .with_labels(ObjectRole::Rnf4, Array3::zeros(SHAPE))
            .unwrap()
            .with_calibration(Calibration::isotropic_xy(1.0).unwrap());

        let p = Pipeline::new(AnalysisConfig::default(), StoredLabels).unwrap();
        let report = p.process(&b).unwrap();
        assert_eq!(report.rows().len(), 1);
        assert_eq!(report.rows()[0].nucleus_area, 100.0);

        let strict = AnalysisConfig::default().with_nucleus_intensity_min(Some(5000.0));
        let p = Pipeline::new(strict, StoredLabels).unwrap();
        assert!(p.process(&b).unwrap().rows().is_empty());
    }

    #[test]
    fn test_calibration_resolution() {
        let p = Pipeline::new(config(), StoredLabels).unwrap();
        let b = bundle();
        assert_eq!(p.calibration(&b).unwrap().pixel_area(), 1.0);

        let p = Pipeline::new(config().with_pixel_size_xy(Some(0.5)), StoredLabels).unwrap();
        assert_eq!(p.calibration(&b).unwrap().pixel_area(), 0.25);

        let img = || CalibratedImage::new(Array3::zeros(SHAPE));
        let bare = ImageBundle::new("bare", img(), img(), img(), img()).unwrap();
        let p = Pipeline::new(config(), StoredLabels).unwrap();
        assert!(matches!(
            p.calibration(&bare).unwrap_err(),
            AnalysisError::Configuration(_)
        ));
    }

    #[test]
    fn test_missing_detector_output() {
        let img = || CalibratedImage::new(Array3::zeros(SHAPE));
        let bare = ImageBundle::new("bare", img(), img(), img(), img())
            .unwrap()
            .with_calibration(Calibration::isotropic_xy(1.0).unwrap());
        let p = Pipeline::new(config(), StoredLabels).unwrap();
        assert!(matches!(p.process(&bare), Err(AnalysisError::Configuration(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = config().with_pixel_size_xy(Some(-1.0));
        assert!(Pipeline::new(bad, StoredLabels).is_err());
    }
}
