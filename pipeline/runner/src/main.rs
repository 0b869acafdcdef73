//! PML / RNF4 foci 批处理程序.
//!
//! 环境变量:
//!
//! - `NUCFOCI_INPUT_DIR`: 输入目录, 缺省为 `$HOME/dataset/pml-rnf`;
//! - `NUCFOCI_CONFIG`: JSON 配置文件, 缺省使用默认配置;
//! - `NUCFOCI_LOG`: 日志级别, 缺省为 `info`.

use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::error::Error;
use std::str::FromStr;

mod result;
mod runner;

/// 日志级别环境变量.
const LOG_VAR: &str = "NUCFOCI_LOG";

fn main() -> Result<(), Box<dyn Error>> {
    let level = std::env::var(LOG_VAR)
        .ok()
        .and_then(|s| LevelFilter::from_str(&s).ok())
        .unwrap_or(LevelFilter::Info);
    SimpleLogger::new().with_level(level).init()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(utils::cpus())
        .build_global()?;

    let summary = runner::run()?;
    summary.analyze();
    if !summary.failed().is_empty() {
        log::warn!(
            "{} of {} images failed",
            summary.failed().len(),
            summary.processed() + summary.failed().len()
        );
    }
    Ok(())
}
