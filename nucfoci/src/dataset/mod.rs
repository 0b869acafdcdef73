//! 数据集操作.
//!
//! 输入目录下每个 `.npz` 文件对应一幅图像 (见 [`ImageBundle`]).
//! 提供迭代器风格的加载模式.

use crate::config::ChannelNames;
use crate::{consts, AnalysisError, AnalysisResult};
use std::path::{Path, PathBuf};

mod bundle;
mod npz;

pub use bundle::ImageBundle;

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 列出 `dir` 下所有 `.npz` 输入包, 按路径升序排列.
///
/// 若一个也没有, 返回 `NoInput`.
pub fn find_images<P: AsRef<Path>>(dir: P) -> AnalysisResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == consts::BUNDLE_EXT) {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(AnalysisError::NoInput {
            dir: dir.display().to_string(),
            ext: consts::BUNDLE_EXT,
        });
    }
    paths.sort_unstable();
    Ok(paths)
}

/// 从 `paths` 创建输入包加载器. 文件在迭代时才被读取.
pub fn bundle_loader<I: IntoIterator<Item = PathBuf>>(paths: I, channels: ChannelNames) -> BundleLoader {
    let mut paths_rev: Vec<PathBuf> = paths.into_iter().collect();
    paths_rev.reverse();
    BundleLoader { paths_rev, channels }
}

/// 输入包加载器. 每次迭代产生 `(图像名, 读取结果)`.
///
/// 单个文件读取失败不会中断迭代.
#[derive(Debug)]
pub struct BundleLoader {
    paths_rev: Vec<PathBuf>,
    channels: ChannelNames,
}

impl Iterator for BundleLoader {
    type Item = (String, AnalysisResult<ImageBundle>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths_rev.pop()?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Some((name, ImageBundle::open(&path, &self.channels)))
    }
}

impl ExactSizeIterator for BundleLoader {
    #[inline]
    fn len(&self) -> usize {
        self.paths_rev.len()
    }
}
