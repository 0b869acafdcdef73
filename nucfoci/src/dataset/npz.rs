use crate::{AnalysisError, AnalysisResult};
use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpzError, ReadableElement};
use num::ToPrimitive;
use std::fs::File;
use std::path::Path;

type EntryReader = fn(&mut NpzReader<File>, &str) -> Result<ArrayD<f64>, ReadNpzError>;

/// 以 `T` 类型读取条目, 并统一为 `f64`.
fn read_as<T>(reader: &mut NpzReader<File>, entry: &str) -> Result<ArrayD<f64>, ReadNpzError>
where
    T: ReadableElement + ToPrimitive + Clone,
{
    let arr = reader.by_name::<OwnedRepr<T>, IxDyn>(entry)?;
    Ok(arr.mapv(|v| v.to_f64().unwrap_or(f64::NAN)))
}

/// 依次尝试的元素类型. 显微图像最常见的是 `u16` 与 `f32`.
const READERS: [EntryReader; 10] = [
    read_as::<u16>,
    read_as::<f32>,
    read_as::<u8>,
    read_as::<f64>,
    read_as::<i32>,
    read_as::<u32>,
    read_as::<i16>,
    read_as::<i64>,
    read_as::<u64>,
    read_as::<i8>,
];

/// 打开的 npz 输入包. 条目名既可以带 `.npy` 后缀 (numpy 默认), 也可以不带.
pub(crate) struct NpzBundleFile {
    reader: NpzReader<File>,
    names: Vec<String>,
}

impl NpzBundleFile {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let mut reader = NpzReader::new(File::open(path)?)?;
        let names = reader.names()?;
        Ok(Self { reader, names })
    }

    fn entry_name(&self, name: &str) -> Option<String> {
        let with_ext = format!("{name}.npy");
        if self.names.contains(&with_ext) {
            Some(with_ext)
        } else {
            self.names.iter().find(|n| *n == name).cloned()
        }
    }

    /// 读取条目 `name`. 条目不存在时返回 `Ok(None)`.
    pub(crate) fn read(&mut self, name: &str) -> AnalysisResult<Option<ArrayD<f64>>> {
        let Some(entry) = self.entry_name(name) else {
            return Ok(None);
        };
        let mut last = None;
        for read in READERS {
            match read(&mut self.reader, &entry) {
                Ok(arr) => return Ok(Some(arr)),
                Err(e) => last = Some(e),
            }
        }
        match last {
            Some(e) => Err(AnalysisError::ReadNpz(e)),
            None => Ok(None),
        }
    }

    /// 读取必需的条目 `name`. 条目不存在时返回 `Configuration`.
    pub(crate) fn require(&mut self, name: &str) -> AnalysisResult<ArrayD<f64>> {
        self.read(name)?
            .ok_or_else(|| AnalysisError::Configuration(format!("missing entry `{name}`")))
    }
}

/// 把数值数组转换为标签数组. 标签必须是可以用 `u32` 表示的非负整数.
pub(crate) fn to_labels(arr: ArrayD<f64>, name: &str) -> AnalysisResult<ArrayD<u32>> {
    if let Some(bad) = arr
        .iter()
        .find(|v| !(v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(*v)))
    {
        return Err(AnalysisError::Configuration(format!(
            "entry `{name}` holds non-label value {bad}"
        )));
    }
    Ok(arr.mapv(|v| v as u32))
}

#[cfg(test)]
mod tests {
    use super::to_labels;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_to_labels() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.0, 1.0, 2.0, 7.0]).unwrap();
        let labels = to_labels(arr, "x").unwrap();
        assert_eq!(labels.iter().copied().collect::<Vec<u32>>(), vec![0, 1, 2, 7]);

        let arr = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, 0.5]).unwrap();
        assert!(to_labels(arr, "x").is_err());
        let arr = ArrayD::from_shape_vec(IxDyn(&[2]), vec![-1.0, 0.0]).unwrap();
        assert!(to_labels(arr, "x").is_err());
        let arr = ArrayD::from_shape_vec(IxDyn(&[1]), vec![f64::NAN]).unwrap();
        assert!(to_labels(arr, "x").is_err());
    }
}
