//! 带标签的空间对象, 对象集合, 以及几何谓词.

mod kernel;
mod population;

pub use kernel::DilationKernel;
pub use population::ObjectPopulation;

use crate::{AnalysisError, AnalysisResult, Idx3d};
use ndarray::{Array3, ArrayBase, DataMut, Ix3};
use std::cmp::Ordering;

/// 按 "0.5 向上舍入" 规则把非负浮点坐标取整.
///
/// 例如 `1.5 -> 2`, `2.49 -> 2`.
#[inline]
fn round_half_up(x: f64) -> usize {
    debug_assert!(x >= 0.0);
    (x + 0.5).floor() as usize
}

/// 带标签的空间对象.
///
/// 由整数标签和一组互不重复的体素坐标组成. 对象创建后不可变, 只被测量.
///
/// 内部体素按 `(z, h, w)` 行优先升序保存, 因此包含判断和两对象求交都是对数/线性时间.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialObject {
    label: u32,
    voxels: Vec<Idx3d>,
}

impl SpatialObject {
    /// 以标签 `label` 和体素集合 `voxels` 创建对象. 重复体素会被合并.
    ///
    /// 如果 `voxels` 为空, 则返回 `None`.
    pub fn new<I: IntoIterator<Item = Idx3d>>(label: u32, voxels: I) -> Option<Self> {
        let mut voxels: Vec<Idx3d> = voxels.into_iter().collect();
        voxels.sort_unstable();
        voxels.dedup();
        (!voxels.is_empty()).then_some(Self { label, voxels })
    }

    /// 直接初始化. 调用者保证 `voxels` 非空、严格升序.
    #[inline]
    pub(crate) fn from_sorted(label: u32, voxels: Vec<Idx3d>) -> Self {
        debug_assert!(!voxels.is_empty());
        debug_assert!(voxels.windows(2).all(|w| w[0] < w[1]));
        Self { label, voxels }
    }

    /// 对象标签.
    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    #[inline]
    pub(crate) fn relabel(&mut self, label: u32) {
        self.label = label;
    }

    /// 按行优先升序排列的体素坐标.
    #[inline]
    pub fn voxels(&self) -> &[Idx3d] {
        &self.voxels
    }

    /// 体素个数. 总是大于 0.
    #[inline]
    pub fn size(&self) -> usize {
        self.voxels.len()
    }

    /// 标定面积, 即 `体素个数 * pixel_area`.
    #[inline]
    pub fn area(&self, pixel_area: f64) -> f64 {
        self.size() as f64 * pixel_area
    }

    /// 所有体素坐标的算术平均 `(z, h, w)`.
    pub fn centroid(&self) -> (f64, f64, f64) {
        let (mut z, mut h, mut w) = (0.0, 0.0, 0.0);
        for &(a, b, c) in self.voxels.iter() {
            z += a as f64;
            h += b as f64;
            w += c as f64;
        }
        let n = self.size() as f64;
        (z / n, h / n, w / n)
    }

    /// 质心体素. 每个分量按 0.5 向上舍入 (round-half-up) 取整.
    ///
    /// 注意结果不一定是对象自身的体素 (如环形对象).
    pub fn centroid_voxel(&self) -> Idx3d {
        let (z, h, w) = self.centroid();
        (round_half_up(z), round_half_up(h), round_half_up(w))
    }

    /// `point` 是否是该对象的体素?
    #[inline]
    pub fn contains(&self, point: &Idx3d) -> bool {
        self.voxels.binary_search(point).is_ok()
    }

    /// 与 `other` 共有的体素个数.
    pub fn overlap(&self, other: &SpatialObject) -> usize {
        let (a, b) = (&self.voxels, &other.voxels);
        // 两个都非空. 先用首尾做一次短路.
        if a[a.len() - 1] < b[0] || b[b.len() - 1] < a[0] {
            return 0;
        }

        let (mut i, mut j, mut shared) = (0usize, 0usize, 0usize);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }

    /// 包围盒, 以 (最小角, 最大角) 表示, 两端都包含.
    pub fn bounding_box(&self) -> (Idx3d, Idx3d) {
        let (z0, _, _) = self.voxels[0];
        let (z1, _, _) = self.voxels[self.size() - 1];
        let (mut h0, mut w0, mut h1, mut w1) = (usize::MAX, usize::MAX, 0, 0);
        for &(_, h, w) in self.voxels.iter() {
            h0 = h0.min(h);
            w0 = w0.min(w);
            h1 = h1.max(h);
            w1 = w1.max(w);
        }
        ((z0, h0, w0), (z1, h1, w1))
    }

    /// 包围盒上界 (不包含) 的三维大小. 用于描述越界对象.
    #[inline]
    fn extent(&self) -> Idx3d {
        let (_, (z, h, w)) = self.bounding_box();
        (z + 1, h + 1, w + 1)
    }

    /// 对象是否完全落在形状为 `shape` 的图像中?
    #[inline]
    pub fn fits_within(&self, (z, h, w): Idx3d) -> bool {
        let (ez, eh, ew) = self.extent();
        ez <= z && eh <= h && ew <= w
    }

    /// 检查对象是否落在形状为 `shape` 的图像中. 若越界返回 `ImageMismatch`.
    #[inline]
    pub(crate) fn ensure_within(&self, shape: Idx3d) -> AnalysisResult<()> {
        if self.fits_within(shape) {
            Ok(())
        } else {
            Err(AnalysisError::ImageMismatch {
                expected: shape,
                found: self.extent(),
            })
        }
    }

    /// 对象是否接触形状为 `shape` 的图像的水平 (h/w) 边缘? 不考虑 z 方向.
    pub fn touches_border_xy(&self, (_, h, w): Idx3d) -> bool {
        let ((_, h0, w0), (_, h1, w1)) = self.bounding_box();
        h0 == 0 || w0 == 0 || h1 + 1 >= h || w1 + 1 >= w
    }

    /// 在包围盒四周各扩张 `kernel.reach()` 后的局部坐标中标记膨胀结果.
    ///
    /// 局部坐标 `(0, 0, 0)` 对应全局坐标 `包围盒最小角 - reach`, 因此不会出现负下标.
    fn dilation_mask(&self, kernel: &DilationKernel) -> Array3<bool> {
        let ((z0, h0, w0), (z1, h1, w1)) = self.bounding_box();
        let (rz, rh, rw) = kernel.reach();
        let dim = (z1 - z0 + 1 + 2 * rz, h1 - h0 + 1 + 2 * rh, w1 - w0 + 1 + 2 * rw);
        let mut mask = Array3::from_elem(dim, false);
        for &(z, h, w) in self.voxels.iter() {
            let (bz, bh, bw) = (z - z0 + rz, h - h0 + rh, w - w0 + rw);
            for &(dz, dh, dw) in kernel.offsets() {
                // 偏移量不超过 reach, 下标总是合法的.
                let pos = (
                    bz.wrapping_add_signed(dz),
                    bh.wrapping_add_signed(dh),
                    bw.wrapping_add_signed(dw),
                );
                mask[pos] = true;
            }
        }
        mask
    }

    /// 以 `kernel` 膨胀后的体素个数, 不受任何图像边界限制.
    ///
    /// 即使膨胀结果越出图像, 越界部分也计入. 用于计算膨胀面积.
    pub fn dilated_size(&self, kernel: &DilationKernel) -> usize {
        self.dilation_mask(kernel).iter().filter(|&&on| on).count()
    }

    /// 以 `kernel` 对对象做形态学膨胀, 返回新对象 (标签不变). `self` 不会被修改.
    ///
    /// 返回的体素集合被裁剪到形状为 `shape` 的坐标空间内, 适合擦除或绘制;
    /// 完整的膨胀体素个数见 [`SpatialObject::dilated_size`].
    /// 若 `self` 本身越界, 返回 `ImageMismatch`.
    pub fn dilate(&self, kernel: &DilationKernel, shape: Idx3d) -> AnalysisResult<SpatialObject> {
        self.ensure_within(shape)?;

        let ((z0, h0, w0), _) = self.bounding_box();
        let (rz, rh, rw) = kernel.reach();
        let (sz, sh, sw) = shape;
        // 局部坐标到全局坐标是平移, 行优先遍历天然得到升序结果.
        let voxels = self
            .dilation_mask(kernel)
            .indexed_iter()
            .filter_map(|((z, h, w), &on)| {
                if !on {
                    return None;
                }
                let pos = ((z + z0).checked_sub(rz)?, (h + h0).checked_sub(rh)?, (w + w0).checked_sub(rw)?);
                (pos.0 < sz && pos.1 < sh && pos.2 < sw).then_some(pos)
            })
            .collect();
        Ok(Self::from_sorted(self.label, voxels))
    }

    /// 将 `target` 中属于该对象的所有体素设置为 `fill`.
    ///
    /// 若对象超出 `target` 的范围, 返回 `ImageMismatch` 且 `target` 保持不变.
    pub fn draw_into<S, T>(&self, target: &mut ArrayBase<S, Ix3>, fill: T) -> AnalysisResult<()>
    where
        S: DataMut<Elem = T>,
        T: Clone,
    {
        self.ensure_within(target.dim())?;
        for &pos in self.voxels.iter() {
            target[pos] = fill.clone();
        }
        Ok(())
    }
}
