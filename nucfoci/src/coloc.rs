//! 两类 foci 之间的共定位统计.
//!
//! 对象 `a` 与 `b` 的重叠量是二者共有的体素个数. 判定规则是非对称的:
//! `a` 为 "B 阳性" 当且仅当存在某个 `b` 使 `overlap(a, b) > fraction * size(a)`,
//! 反之亦然. 两个方向各自只按对象自身大小计算阈值.

use crate::SpatialObject;
use ndarray::Array2;

/// 两个对象序列之间的两两重叠体素数. 第 `(i, j)` 项对应 `a[i]` 与 `b[j]`.
#[derive(Debug, Clone)]
pub struct OverlapMatrix {
    shared: Array2<usize>,
}

impl OverlapMatrix {
    /// 计算 `a` 与 `b` 的两两重叠矩阵.
    pub fn new(a: &[&SpatialObject], b: &[&SpatialObject]) -> Self {
        let shared = Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i].overlap(b[j]));
        Self { shared }
    }

    /// `a[i]` 与 `b[j]` 的重叠体素数.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> usize {
        self.shared[(i, j)]
    }

    /// 矩阵形状 `(|a|, |b|)`.
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.shared.dim()
    }
}

/// 一个细胞核内两类 foci 的共定位统计量. 面积以标定单位给出.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColocalizationStats {
    /// B 阳性的 A 对象个数.
    pub a_positive_count: usize,
    /// B 阳性的 A 对象面积之和.
    pub a_positive_area: f64,
    /// A 阳性的 B 对象个数.
    pub b_positive_count: usize,
    /// A 阳性的 B 对象面积之和.
    pub b_positive_area: f64,
    /// 任一方向满足阈值的所有对象对的重叠面积之和.
    ///
    /// 一个对象若有多个满足条件的伙伴, 其重叠会被多次累加.
    pub overlap_area: f64,
}

#[inline]
fn exceeds(shared: usize, obj: &SpatialObject, fraction: f64) -> bool {
    shared as f64 > fraction * obj.size() as f64
}

/// 计算 `a` 与 `b` 的共定位统计量.
///
/// 对每个对象, 按对方序列的顺序找到第一个满足阈值的伙伴后即停止, 所以该对象至多
/// 被计数一次. 总重叠面积则对每一对满足任一方向阈值的对象都累加.
/// 任何一方为空时, 所有输出为 0.
pub fn colocalize(
    a: &[&SpatialObject],
    b: &[&SpatialObject],
    pixel_area: f64,
    fraction: f64,
) -> ColocalizationStats {
    let matrix = OverlapMatrix::new(a, b);
    let mut stats = ColocalizationStats::default();

    for (i, obj) in a.iter().enumerate() {
        if (0..b.len()).any(|j| exceeds(matrix.get(i, j), obj, fraction)) {
            stats.a_positive_count += 1;
            stats.a_positive_area += obj.area(pixel_area);
        }
    }

    for (j, obj) in b.iter().enumerate() {
        if (0..a.len()).any(|i| exceeds(matrix.get(i, j), obj, fraction)) {
            stats.b_positive_count += 1;
            stats.b_positive_area += obj.area(pixel_area);
        }
    }

    for (i, oa) in a.iter().enumerate() {
        for (j, ob) in b.iter().enumerate() {
            let shared = matrix.get(i, j);
            if exceeds(shared, oa, fraction) || exceeds(shared, ob, fraction) {
                stats.overlap_area += shared as f64 * pixel_area;
            }
        }
    }
    stats
}
