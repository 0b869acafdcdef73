//! 单核测量.
//!
//! 对每条 [`NucleusRecord`] 计算细胞核面积、各通道积分强度、两类 foci 的个数/面积/强度,
//! 以及扣除膨胀 foci 后的弥散信号, 最后调用 [`colocalize`] 得到共定位统计.

use crate::assign::NucleusRecord;
use crate::coloc::{colocalize, ColocalizationStats};
use crate::config::AnalysisConfig;
use crate::report::MeasurementRow;
use crate::{AnalysisResult, CalibratedImage, DilationKernel, Idx3d, SpatialObject};
use log::debug;
use ndarray::s;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 参与测量的三个通道. 各通道与对象共享坐标空间, 测量期间只读.
#[derive(Debug, Clone, Copy)]
pub struct MeasureChannels<'a> {
    /// PML 通道.
    pub pml: &'a CalibratedImage,
    /// RNF4 通道.
    pub rnf4: &'a CalibratedImage,
    /// RNF111 通道, 只测量整核积分强度.
    pub rnf111: &'a CalibratedImage,
}

/// 弥散信号: 细胞核内扣除膨胀 foci 后剩余的部分.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiffuseSignal {
    /// 所有膨胀 foci 面积之和. 膨胀 foci 之间的重叠会被重复计算, 越出图像的部分也计入.
    pub dilated_area: f64,
    /// `细胞核面积 - dilated_area`. 可能为负.
    pub area: f64,
    /// 擦除膨胀 foci 后, 细胞核内的积分强度.
    pub intensity: f64,
}

/// 一类 foci 在一个细胞核内的统计量.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FociStats {
    /// 细胞核在该通道的积分强度, 不局限于 foci.
    pub nucleus_intensity: f64,
    /// foci 个数.
    pub count: usize,
    /// foci 面积之和.
    pub area: f64,
    /// foci 积分强度之和.
    pub intensity: f64,
    /// 弥散信号.
    pub diffuse: DiffuseSignal,
}

/// 单核测量器. 同一幅图像内所有细胞核共用一个实例.
#[derive(Debug, Clone)]
pub struct Measurer {
    pixel_area: f64,
    kernel: DilationKernel,
    overlap_fraction: f64,
}

impl Measurer {
    /// 直接初始化.
    pub fn new(pixel_area: f64, kernel: DilationKernel, overlap_fraction: f64) -> Self {
        Self {
            pixel_area,
            kernel,
            overlap_fraction,
        }
    }

    /// 以 `config` 中的膨胀半径与重叠比例, 以及单像素面积 `pixel_area` 创建测量器.
    pub fn from_config(config: &AnalysisConfig, pixel_area: f64) -> AnalysisResult<Self> {
        Ok(Self::new(pixel_area, config.dilation().kernel()?, config.overlap_fraction()))
    }

    /// 单像素面积.
    #[inline]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_area
    }

    /// 计算 `nucleus` 内 `channel` 的弥散信号.
    ///
    /// 复制 `channel` 在细胞核包围盒内的部分, 把每个 focus 膨胀后的体素在副本中置零,
    /// 再对细胞核求和. 膨胀面积按完整的膨胀结果计算, 越出图像的部分也计入.
    /// `channel` 本身不被修改.
    pub fn diffuse(
        &self,
        nucleus: &SpatialObject,
        foci: &[&SpatialObject],
        channel: &CalibratedImage,
    ) -> AnalysisResult<DiffuseSignal> {
        nucleus.ensure_within(channel.shape())?;
        let (lo, hi) = nucleus.bounding_box();
        let mut local = channel
            .data()
            .slice(s![lo.0..=hi.0, lo.1..=hi.1, lo.2..=hi.2])
            .to_owned();
        let inside = |&(z, h, w): &Idx3d| {
            (lo.0..=hi.0).contains(&z) && (lo.1..=hi.1).contains(&h) && (lo.2..=hi.2).contains(&w)
        };

        let mut dilated_area = 0.0;
        for focus in foci {
            let dilated = focus.dilate(&self.kernel, channel.shape())?;
            for &(z, h, w) in dilated.voxels().iter().filter(|&&v| inside(&v)) {
                local[(z - lo.0, h - lo.1, w - lo.2)] = 0.0;
            }
            dilated_area += focus.dilated_size(&self.kernel) as f64 * self.pixel_area;
        }

        let intensity = nucleus
            .voxels()
            .iter()
            .map(|&(z, h, w)| local[(z - lo.0, h - lo.1, w - lo.2)] as f64)
            .sum();
        Ok(DiffuseSignal {
            dilated_area,
            area: nucleus.area(self.pixel_area) - dilated_area,
            intensity,
        })
    }

    /// 计算一类 foci 在 `nucleus` 内的统计量.
    pub fn foci_stats(
        &self,
        nucleus: &SpatialObject,
        foci: &[&SpatialObject],
        channel: &CalibratedImage,
    ) -> AnalysisResult<FociStats> {
        let mut intensity = 0.0;
        for focus in foci {
            intensity += channel.sum_over(focus)?;
        }
        Ok(FociStats {
            nucleus_intensity: channel.sum_over(nucleus)?,
            count: foci.len(),
            area: foci.iter().map(|o| o.area(self.pixel_area)).sum(),
            intensity,
            diffuse: self.diffuse(nucleus, foci, channel)?,
        })
    }

    /// 两类 foci 的共定位统计. A 为 PML, B 为 RNF4.
    #[inline]
    pub fn colocalization(&self, record: &NucleusRecord<'_>) -> ColocalizationStats {
        colocalize(record.pml(), record.rnf4(), self.pixel_area, self.overlap_fraction)
    }

    /// 测量一个细胞核, 得到一行结果.
    pub fn measure(&self, record: &NucleusRecord<'_>, channels: &MeasureChannels<'_>) -> AnalysisResult<MeasurementRow> {
        let nucleus = record.nucleus();
        let pml = self.foci_stats(nucleus, record.pml(), channels.pml)?;
        let rnf4 = self.foci_stats(nucleus, record.rnf4(), channels.rnf4)?;
        let rnf111_intensity = channels.rnf111.sum_over(nucleus)?;
        let coloc = self.colocalization(record);
        debug!(
            "nucleus {}: {} PML foci, {} RNF4 foci, {} RNF4-positive PML foci",
            nucleus.label(),
            pml.count,
            rnf4.count,
            coloc.a_positive_count
        );

        Ok(MeasurementRow {
            nucleus_id: nucleus.label(),
            nucleus_area: nucleus.area(self.pixel_area),
            pml_intensity: pml.nucleus_intensity,
            pml_foci_count: pml.count,
            pml_foci_area: pml.area,
            pml_foci_intensity: pml.intensity,
            pml_diffuse_area: pml.diffuse.area,
            pml_diffuse_intensity: pml.diffuse.intensity,
            rnf4_intensity: rnf4.nucleus_intensity,
            rnf4_foci_count: rnf4.count,
            rnf4_foci_area: rnf4.area,
            rnf4_foci_intensity: rnf4.intensity,
            rnf4_diffuse_area: rnf4.diffuse.area,
            rnf4_diffuse_intensity: rnf4.diffuse.intensity,
            rnf111_intensity,
            rnf4_positive_pml_count: coloc.a_positive_count,
            rnf4_positive_pml_area: coloc.a_positive_area,
            pml_positive_rnf4_count: coloc.b_positive_count,
            pml_positive_rnf4_area: coloc.b_positive_area,
            overlap_area: coloc.overlap_area,
        })
    }

    /// 依次测量所有细胞核. 结果与 `records` 顺序一致, 任一细胞核失败则整体失败.
    pub fn measure_all(
        &self,
        records: &[NucleusRecord<'_>],
        channels: &MeasureChannels<'_>,
    ) -> AnalysisResult<Vec<MeasurementRow>> {
        records.iter().map(|r| self.measure(r, channels)).collect()
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl Measurer {
    /// 借助 `rayon`, 并行地测量所有细胞核. 结果顺序与 `records` 一致.
    pub fn par_measure_all(
        &self,
        records: &[NucleusRecord<'_>],
        channels: &MeasureChannels<'_>,
    ) -> AnalysisResult<Vec<MeasurementRow>> {
        records.par_iter().map(|r| self.measure(r, channels)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{MeasureChannels, Measurer};
    use crate::assign::{assign_foci, NucleusRecord};
    use crate::object::tests::{pixels, rect};
    use crate::{CalibratedImage, DilationKernel, Idx3d, ObjectPopulation, SpatialObject};
    use ndarray::Array3;
    use std::collections::HashSet;

    const SHAPE: Idx3d = (1, 12, 12);

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    fn measurer(pixel_area: f64) -> Measurer {
        Measurer::new(pixel_area, DilationKernel::new(2.0, 0.0).unwrap(), 0.25)
    }

    fn ramp() -> CalibratedImage {
        CalibratedImage::new(Array3::from_shape_fn(SHAPE, |(_, h, w)| (h * 12 + w) as f32))
    }

    fn populations() -> (ObjectPopulation, ObjectPopulation, ObjectPopulation) {
        let nuclei = ObjectPopulation::from_objects("nuclei", [rect(1, (1, 1), (10, 10))]).unwrap();
        let pml = ObjectPopulation::from_objects(
            "pml",
            [pixels(1, &[(3, 3), (3, 4), (3, 5)]), rect(2, (7, 3), (1, 5))],
        )
        .unwrap();
        // 与 PML 1 共有 (3, 4) (3, 5)
        let rnf4 = ObjectPopulation::from_objects("rnf4", [rect(1, (2, 4), (2, 2))]).unwrap();
        (nuclei, pml, rnf4)
    }

    /// 细胞核 100 体素, 2 个 PML foci (3 和 5 体素), 1 个 RNF4 focus (4 体素, 与第一个 PML 重叠 2 体素).
    #[test]
    fn test_end_to_end_scenario() {
        let (nuclei, pml, rnf4) = populations();
        let records = assign_foci(&nuclei, &pml, &rnf4);
        assert_eq!(records.len(), 1);

        let img = CalibratedImage::new(Array3::from_elem(SHAPE, 1.0));
        let channels = MeasureChannels {
            pml: &img,
            rnf4: &img,
            rnf111: &img,
        };
        let row = measurer(1.0).measure(&records[0], &channels).unwrap();

        assert_eq!(row.nucleus_id, 1);
        assert!(f64_eq(row.nucleus_area, 100.0));
        assert!(f64_eq(row.pml_intensity, 100.0));
        assert_eq!(row.pml_foci_count, 2);
        assert!(f64_eq(row.pml_foci_area, 8.0));
        assert!(f64_eq(row.pml_foci_intensity, 8.0));
        assert_eq!(row.rnf4_foci_count, 1);
        assert!(f64_eq(row.rnf4_foci_area, 4.0));
        assert!(f64_eq(row.rnf111_intensity, 100.0));
        assert_eq!(row.rnf4_positive_pml_count, 1);
        assert!(f64_eq(row.rnf4_positive_pml_area, 3.0));
        assert_eq!(row.pml_positive_rnf4_count, 1);
        assert!(f64_eq(row.pml_positive_rnf4_area, 4.0));
        assert!(f64_eq(row.overlap_area, 2.0));
    }

    #[test]
    fn test_empty_foci() {
        let nucleus = rect(1, (1, 1), (10, 10));
        let record = NucleusRecord::new(&nucleus, Vec::new(), Vec::new());
        let img = ramp();
        let channels = MeasureChannels {
            pml: &img,
            rnf4: &img,
            rnf111: &img,
        };
        let row = measurer(0.5).measure(&record, &channels).unwrap();
        assert!(f64_eq(row.nucleus_area, 50.0));
        assert_eq!(row.pml_foci_count, 0);
        assert!(f64_eq(row.pml_foci_area, 0.0));
        assert!(f64_eq(row.pml_foci_intensity, 0.0));
        assert!(f64_eq(row.pml_diffuse_area, row.nucleus_area));
        assert!(f64_eq(row.pml_diffuse_intensity, row.pml_intensity));
        assert!(f64_eq(row.rnf4_diffuse_area, row.nucleus_area));
        assert_eq!(row.rnf4_positive_pml_count, 0);
        assert_eq!(row.pml_positive_rnf4_count, 0);
        assert!(f64_eq(row.rnf4_positive_pml_area, 0.0));
        assert!(f64_eq(row.pml_positive_rnf4_area, 0.0));
        assert!(f64_eq(row.overlap_area, 0.0));
    }

    #[test]
    fn test_diffuse_decomposition() {
        let (nuclei, pml, _) = populations();
        let nucleus = nuclei.get(0).unwrap();
        let foci: Vec<&SpatialObject> = pml.iter().collect();
        let img = ramp();
        let m = measurer(0.25);
        let kernel = DilationKernel::new(2.0, 0.0).unwrap();

        let d = m.diffuse(nucleus, &foci, &img).unwrap();
        assert!(f64_eq(d.area + d.dilated_area, nucleus.area(0.25)));

        let dilated: Vec<SpatialObject> = foci.iter().map(|f| f.dilate(&kernel, SHAPE).unwrap()).collect();
        let expected_area: f64 = foci.iter().map(|f| f.dilated_size(&kernel) as f64 * 0.25).sum();
        assert!(f64_eq(d.dilated_area, expected_area));

        let erased: HashSet<Idx3d> = dilated.iter().flat_map(|o| o.voxels().iter().copied()).collect();
        let expected: f64 = nucleus
            .voxels()
            .iter()
            .filter(|&&v| !erased.contains(&v))
            .map(|&v| img[v] as f64)
            .sum();
        assert!(f64_eq(d.intensity, expected));

        // 原图不变
        assert!(f64_eq(img[(0, 3, 3)] as f64, 39.0));
    }

    #[test]
    fn test_diffuse_area_may_be_negative() {
        let nucleus = rect(1, (5, 5), (1, 1));
        let focus = rect(2, (5, 5), (1, 1));
        let img = ramp();
        let d = measurer(1.0).diffuse(&nucleus, &[&focus], &img).unwrap();
        assert!(f64_eq(d.dilated_area, 13.0));
        assert!(f64_eq(d.area, -12.0));
        assert!(f64_eq(d.intensity, 0.0));
    }

    /// 图像角落的 focus: 膨胀面积按完整的 13 个体素计, 擦除只作用于图像内的 6 个.
    #[test]
    fn test_diffuse_focus_at_image_corner() {
        let shape = (1, 11, 11);
        let nucleus = rect(1, (0, 0), (11, 11));
        let focus = pixels(1, &[(0, 0)]);
        let img = CalibratedImage::new(Array3::from_elem(shape, 1.0));
        let d = measurer(1.0).diffuse(&nucleus, &[&focus], &img).unwrap();
        assert!(f64_eq(d.dilated_area, 13.0));
        assert!(f64_eq(d.area, 108.0));
        assert!(f64_eq(d.intensity, 121.0 - 6.0));
    }

    /// 细胞核外的 focus, 其膨胀部分仍然擦除细胞核内的体素.
    #[test]
    fn test_diffuse_halo_from_outside_nucleus() {
        let nucleus = rect(1, (2, 2), (4, 4));
        // (0, 3) 膨胀后覆盖细胞核内的 (2, 3)
        let focus = pixels(1, &[(0, 3)]);
        let img = ramp();
        let d = measurer(1.0).diffuse(&nucleus, &[&focus], &img).unwrap();
        let full = img.sum_over(&nucleus).unwrap();
        assert!(f64_eq(d.intensity, full - img[(0, 2, 3)] as f64));
        assert!(f64_eq(d.dilated_area, 13.0));
    }

    #[test]
    fn test_out_of_bounds_fails_closed() {
        let nucleus = rect(1, (10, 10), (4, 4));
        let record = NucleusRecord::new(&nucleus, Vec::new(), Vec::new());
        let img = ramp();
        let channels = MeasureChannels {
            pml: &img,
            rnf4: &img,
            rnf111: &img,
        };
        assert!(measurer(1.0).measure(&record, &channels).is_err());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_measure_all_keeps_order() {
        let nuclei = ObjectPopulation::from_objects(
            "nuclei",
            [rect(3, (0, 0), (4, 4)), rect(1, (6, 6), (5, 5)), rect(2, (0, 6), (3, 3))],
        )
        .unwrap();
        let empty = ObjectPopulation::new("foci");
        let records = assign_foci(&nuclei, &empty, &empty);
        let img = ramp();
        let channels = MeasureChannels {
            pml: &img,
            rnf4: &img,
            rnf111: &img,
        };
        let m = measurer(1.0);
        let seq = m.measure_all(&records, &channels).unwrap();
        let par = m.par_measure_all(&records, &channels).unwrap();
        assert_eq!(seq, par);
        assert_eq!(par.iter().map(|r| r.nucleus_id).collect::<Vec<_>>(), vec![3, 1, 2]);
    }
}
