use super::SpatialObject;
use crate::{AnalysisError, AnalysisResult, CalibratedImage, Idx3d};
use ndarray::{ArrayBase, Data, Ix3};
use num::ToPrimitive;
use std::collections::BTreeMap;

/// 有序的对象集合. 同一集合内标签互不重复, 允许为空.
///
/// 迭代顺序稳定 (插入顺序), 以保证结果可复现.
#[derive(Debug, Clone, Default)]
pub struct ObjectPopulation {
    /// 集合名, 仅用于错误信息与日志.
    name: String,
    objects: Vec<SpatialObject>,
}

impl ObjectPopulation {
    /// 创建名为 `name` 的空集合.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    /// 由已构建的对象创建集合. 若存在重复标签则返回 `DuplicateLabel`.
    pub fn from_objects<I>(name: impl Into<String>, objects: I) -> AnalysisResult<Self>
    where
        I: IntoIterator<Item = SpatialObject>,
    {
        let mut pop = Self::new(name);
        for obj in objects {
            pop.push(obj)?;
        }
        Ok(pop)
    }

    /// 由 `(标签, 体素集合)` 创建集合.
    ///
    /// 若存在零体素对象返回 `DegenerateObject`, 若存在重复标签返回 `DuplicateLabel`.
    pub fn from_parts<I, V>(name: impl Into<String>, parts: I) -> AnalysisResult<Self>
    where
        I: IntoIterator<Item = (u32, V)>,
        V: IntoIterator<Item = Idx3d>,
    {
        let mut pop = Self::new(name);
        for (label, voxels) in parts {
            let obj = SpatialObject::new(label, voxels).ok_or_else(|| {
                AnalysisError::DegenerateObject {
                    population: pop.name.clone(),
                    label,
                }
            })?;
            pop.push(obj)?;
        }
        Ok(pop)
    }

    /// 从标签图创建集合. 每个非零标签值对应一个对象, 集合按标签升序排列.
    ///
    /// 标签值必须能无损表示为 `u32`, 否则返回 `Configuration`.
    pub fn from_label_image<S, T>(name: impl Into<String>, labels: &ArrayBase<S, Ix3>) -> AnalysisResult<Self>
    where
        S: Data<Elem = T>,
        T: ToPrimitive + Copy,
    {
        let name = name.into();
        let mut book: BTreeMap<u32, Vec<Idx3d>> = BTreeMap::new();
        for (pos, v) in labels.indexed_iter() {
            let label = match v.to_u32() {
                Some(0) => continue,
                Some(l) if v.to_f64() == Some(l as f64) => l,
                _ => {
                    return Err(AnalysisError::Configuration(format!(
                        "label image `{name}` holds a non-label value at {pos:?}"
                    )))
                }
            };
            // 行优先遍历, 每个标签内的体素天然有序.
            book.entry(label).or_default().push(pos);
        }
        let objects = book
            .into_iter()
            .map(|(label, voxels)| SpatialObject::from_sorted(label, voxels))
            .collect();
        Ok(Self { name, objects })
    }

    /// 追加对象. 若标签已存在返回 `DuplicateLabel`, 集合不变.
    pub fn push(&mut self, obj: SpatialObject) -> AnalysisResult<()> {
        if self.objects.iter().any(|o| o.label() == obj.label()) {
            return Err(AnalysisError::DuplicateLabel {
                population: self.name.clone(),
                label: obj.label(),
            });
        }
        self.objects.push(obj);
        Ok(())
    }

    /// 集合名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 对象个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// 是否为空集合?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// 获取第 `index` 个对象. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&SpatialObject> {
        self.objects.get(index)
    }

    /// 按集合顺序迭代对象.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, SpatialObject> {
        self.objects.iter()
    }

    /// 以切片形式获得全部对象.
    #[inline]
    pub fn as_slice(&self) -> &[SpatialObject] {
        &self.objects
    }

    /// 所有对象标定面积之和.
    pub fn total_area(&self, pixel_area: f64) -> f64 {
        self.objects.iter().map(|o| o.area(pixel_area)).sum()
    }

    /// 只保留体素个数位于 `[min_voxels, max_voxels]` 的对象.
    ///
    /// 返回被移除的对象个数.
    pub fn filter_size(&mut self, min_voxels: f64, max_voxels: f64) -> usize {
        let before = self.len();
        self.objects.retain(|o| {
            let size = o.size() as f64;
            min_voxels <= size && size <= max_voxels
        });
        before - self.len()
    }

    /// 移除接触形状为 `shape` 的图像水平边缘的对象. 不考虑 z 方向.
    ///
    /// 返回被移除的对象个数.
    pub fn exclude_borders_xy(&mut self, shape: Idx3d) -> usize {
        let before = self.len();
        self.objects.retain(|o| !o.touches_border_xy(shape));
        before - self.len()
    }

    /// 移除在 `image` 中平均强度低于 `min` 的对象.
    ///
    /// 返回被移除的对象个数. 若有对象超出 `image` 范围返回 `ImageMismatch`, 集合不变.
    pub fn filter_min_mean_intensity(&mut self, image: &CalibratedImage, min: f64) -> AnalysisResult<usize> {
        let keep = self
            .objects
            .iter()
            .map(|o| image.mean_over(o).map(|m| m >= min))
            .collect::<AnalysisResult<Vec<bool>>>()?;
        let before = self.len();
        let mut flags = keep.into_iter();
        self.objects.retain(|_| flags.next().unwrap_or(false));
        Ok(before - self.len())
    }

    /// 按当前顺序将标签重置为 `1..=len`.
    pub fn reset_labels(&mut self) {
        for (i, obj) in self.objects.iter_mut().enumerate() {
            obj.relabel(i as u32 + 1);
        }
    }
}
