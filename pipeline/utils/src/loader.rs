//! 对 `nucfoci::dataset` 的更一层封装. 确定输入目录与配置文件位置.

use nucfoci::config::ChannelNames;
use nucfoci::dataset::{self, BundleLoader};
use nucfoci::AnalysisResult;
use std::env;
use std::path::{Path, PathBuf};

/// 输入目录环境变量.
pub const INPUT_DIR_VAR: &str = "NUCFOCI_INPUT_DIR";

/// 配置文件环境变量.
pub const CONFIG_VAR: &str = "NUCFOCI_CONFIG";

/// 获取输入目录.
///
/// 1. 若环境变量 `$NUCFOCI_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/pml-rnf`.
///
/// 两者都无法确定时返回 `None`.
pub fn input_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(INPUT_DIR_VAR) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["pml-rnf"]),
    }
}

/// 获取配置文件路径. 未设置 `$NUCFOCI_CONFIG` 时返回 `None`, 即使用默认配置.
pub fn config_path_from_env() -> Option<PathBuf> {
    env::var_os(CONFIG_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 列出 `dir` 下的全部输入包并创建加载器.
pub fn bundle_loader<P: AsRef<Path>>(dir: P, channels: ChannelNames) -> AnalysisResult<BundleLoader> {
    let paths = dataset::find_images(dir)?;
    Ok(dataset::bundle_loader(paths, channels))
}

#[cfg(test)]
mod tests {
    use super::bundle_loader;
    use nucfoci::config::ChannelNames;
    use nucfoci::AnalysisError;

    #[test]
    fn test_empty_dir() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("nucfoci-utils-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let err = bundle_loader(&dir, ChannelNames::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::NoInput { .. }));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
