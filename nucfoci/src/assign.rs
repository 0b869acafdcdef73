//! 细胞核归属: 按质心体素把两类 foci 分配给细胞核.

use crate::{Idx3d, ObjectPopulation, SpatialObject};
use log::{debug, warn};

/// 一个细胞核及归属于它的两类 foci.
///
/// foci 以引用形式保存, 是整幅图像 foci 集合的子集. 归属关系在 [`assign_foci`]
/// 中一次确定, 之后不再改变.
#[derive(Debug, Clone)]
pub struct NucleusRecord<'a> {
    nucleus: &'a SpatialObject,
    pml: Vec<&'a SpatialObject>,
    rnf4: Vec<&'a SpatialObject>,
}

impl<'a> NucleusRecord<'a> {
    /// 直接初始化. 一般由 [`assign_foci`] 创建.
    pub fn new(nucleus: &'a SpatialObject, pml: Vec<&'a SpatialObject>, rnf4: Vec<&'a SpatialObject>) -> Self {
        Self { nucleus, pml, rnf4 }
    }

    /// 细胞核对象.
    #[inline]
    pub fn nucleus(&self) -> &'a SpatialObject {
        self.nucleus
    }

    /// 质心落在该细胞核内的 PML foci, 保持原集合顺序.
    #[inline]
    pub fn pml(&self) -> &[&'a SpatialObject] {
        &self.pml
    }

    /// 质心落在该细胞核内的 RNF4 foci, 保持原集合顺序.
    #[inline]
    pub fn rnf4(&self) -> &[&'a SpatialObject] {
        &self.rnf4
    }
}

/// 预先求出的 foci 质心体素, 与集合顺序一一对应.
struct Centroids<'a> {
    objects: &'a [SpatialObject],
    centroids: Vec<Idx3d>,
    /// 每个 focus 被分配的次数. 只用于检测重复归属.
    hits: Vec<u32>,
}

impl<'a> Centroids<'a> {
    fn new(pop: &'a ObjectPopulation) -> Self {
        Self {
            objects: pop.as_slice(),
            centroids: pop.iter().map(SpatialObject::centroid_voxel).collect(),
            hits: vec![0; pop.len()],
        }
    }

    fn inside(&mut self, nucleus: &SpatialObject) -> Vec<&'a SpatialObject> {
        let objects = self.objects;
        let mut found = Vec::new();
        for (i, c) in self.centroids.iter().enumerate() {
            if nucleus.contains(c) {
                self.hits[i] += 1;
                found.push(&objects[i]);
            }
        }
        found
    }

    fn report(&self, population: &str) {
        let orphans = self.hits.iter().filter(|&&n| n == 0).count();
        if orphans > 0 {
            debug!("{orphans} {population} foci lie outside every nucleus");
        }
        for (obj, &n) in self.objects.iter().zip(self.hits.iter()) {
            if n > 1 {
                warn!(
                    "{population} focus {} is assigned to {n} overlapping nuclei",
                    obj.label()
                );
            }
        }
    }
}

/// 把 `pml` 和 `rnf4` 中的 foci 分配给 `nuclei` 中的每个细胞核.
///
/// focus 的质心体素 (见 [`SpatialObject::centroid_voxel`]) 是细胞核的体素时, 该 focus
/// 归属于该细胞核. 结果与 `nuclei` 顺序一致, 每个细胞核恰好一条记录.
///
/// # 注意
///
/// 1. 质心不在任何细胞核内的 focus 被直接丢弃.
/// 2. 若细胞核之间有重叠, 同一 focus 可能被分配给多个细胞核. 此时只记录警告,
///   不做修正.
pub fn assign_foci<'a>(
    nuclei: &'a ObjectPopulation,
    pml: &'a ObjectPopulation,
    rnf4: &'a ObjectPopulation,
) -> Vec<NucleusRecord<'a>> {
    let mut pml_c = Centroids::new(pml);
    let mut rnf4_c = Centroids::new(rnf4);
    let records = nuclei
        .iter()
        .map(|nucleus| NucleusRecord::new(nucleus, pml_c.inside(nucleus), rnf4_c.inside(nucleus)))
        .collect();
    pml_c.report(pml.name());
    rnf4_c.report(rnf4.name());
    records
}
