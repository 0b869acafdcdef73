//! 结果叠加图.
//!
//! 把细胞核与两类 foci 分别绘制为独立的平面, 可以按原样存为 npz, 或者与 DAPI 通道
//! 合成为 **可视化友好** 的 RGB 预览图.

use crate::assign::NucleusRecord;
use crate::consts::gray::{BLACK, FOCI_MASK, WHITE};
use crate::{AnalysisError, AnalysisResult, CalibratedImage, Idx2d, Idx3d, IntensityWindow};
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::NpzWriter;
use std::fs::File;
use std::path::Path;

/// 叠加图的三个平面. 形状与原图一致.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// 细胞核平面, 像素值为细胞核标签.
    nuclei: Array3<u32>,
    /// PML foci 掩膜.
    pml: Array3<u8>,
    /// RNF4 foci 掩膜.
    rnf4: Array3<u8>,
}

impl Overlay {
    /// 在形状为 `shape` 的空白平面上绘制所有记录.
    ///
    /// 未归属于任何细胞核的 foci 不会出现在叠加图中.
    pub fn draw(records: &[NucleusRecord<'_>], shape: Idx3d) -> AnalysisResult<Self> {
        let mut nuclei = Array3::zeros(shape);
        let mut pml = Array3::from_elem(shape, BLACK);
        let mut rnf4 = Array3::from_elem(shape, BLACK);
        for r in records {
            r.nucleus().draw_into(&mut nuclei, r.nucleus().label())?;
            for focus in r.pml() {
                focus.draw_into(&mut pml, FOCI_MASK)?;
            }
            for focus in r.rnf4() {
                focus.draw_into(&mut rnf4, FOCI_MASK)?;
            }
        }
        Ok(Self { nuclei, pml, rnf4 })
    }

    /// 图像形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.nuclei.dim()
    }

    /// 细胞核平面.
    #[inline]
    pub fn nuclei(&self) -> &Array3<u32> {
        &self.nuclei
    }

    /// PML foci 平面.
    #[inline]
    pub fn pml(&self) -> &Array3<u8> {
        &self.pml
    }

    /// RNF4 foci 平面.
    #[inline]
    pub fn rnf4(&self) -> &Array3<u8> {
        &self.rnf4
    }

    /// 按原样把三个平面存入 npz 文件 `path`.
    pub fn save_npz<P: AsRef<Path>>(&self, path: P) -> AnalysisResult<()> {
        let mut w = NpzWriter::new(File::create(path)?);
        w.add_array("nuclei.npy", &self.nuclei)?;
        w.add_array("pml.npy", &self.pml)?;
        w.add_array("rnf4.npy", &self.rnf4)?;
        w.finish()?;
        Ok(())
    }

    /// 与 `dapi` 合成 z 方向最大值投影的 RGB 预览图.
    ///
    /// 红色为 RNF4 foci, 绿色为 PML foci, 蓝色为按强度范围归一化的 DAPI,
    /// 细胞核轮廓为白色.
    pub fn preview(&self, dapi: &CalibratedImage) -> AnalysisResult<image::RgbImage> {
        dapi.ensure_shape(self.shape())?;

        let nuclei = self.nuclei.fold_axis(Axis(0), 0u32, |acc, &v| (*acc).max(v));
        let pml = self.pml.fold_axis(Axis(0), BLACK, |acc, &v| (*acc).max(v));
        let rnf4 = self.rnf4.fold_axis(Axis(0), BLACK, |acc, &v| (*acc).max(v));
        let blue = dapi.max_projection();
        let window = IntensityWindow::fit(dapi);

        let (height, width) = nuclei.dim();
        let mut buf = image::RgbImage::new(width as u32, height as u32);
        for ((h, w), &label) in nuclei.indexed_iter() {
            let px = if label != 0 && on_outline(&nuclei, (h, w)) {
                [WHITE; 3]
            } else {
                let b = window.and_then(|win| win.eval(blue[(h, w)])).unwrap_or(BLACK);
                [rnf4[(h, w)], pml[(h, w)], b]
            };
            buf.put_pixel(w as u32, h as u32, image::Rgb(px));
        }
        Ok(buf)
    }

    /// 把预览图 (见 [`Overlay::preview`]) 保存到 `path`. 格式由扩展名决定.
    pub fn save_preview<P: AsRef<Path>>(&self, path: P, dapi: &CalibratedImage) -> AnalysisResult<()> {
        self.preview(dapi)?.save(path).map_err(AnalysisError::from)
    }
}

/// `pos` 是否位于其所在标签区域的边缘 (4-邻域中存在不同标签, 或者处在图像边缘)?
fn on_outline(labels: &Array2<u32>, (h, w): Idx2d) -> bool {
    let (height, width) = labels.dim();
    if h == 0 || w == 0 || h + 1 == height || w + 1 == width {
        return true;
    }
    let v = labels[(h, w)];
    [(h - 1, w), (h + 1, w), (h, w - 1), (h, w + 1)]
        .into_iter()
        .any(|p| labels[p] != v)
}
