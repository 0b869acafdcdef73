//! 程序运行函数.

use crate::result::BatchSummary;
use log::{error, info};
use nucfoci::prelude::*;
use nucfoci::consts::RESULTS_FILE;
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use utils::loader;

/// 读取配置. 未给出配置文件时使用默认值.
fn load_config() -> Result<AnalysisConfig, Box<dyn Error>> {
    let config = match loader::config_path_from_env() {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            serde_json::from_reader::<_, AnalysisConfig>(BufReader::new(File::open(path)?))?
        }
        None => AnalysisConfig::default(),
    };
    Ok(config.validated()?)
}

/// 在 `input_dir` 下创建本次运行的输出目录 `Results_<unix 秒>`.
fn create_output_dir(input_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let dir = input_dir.join(format!("Results_{stamp}"));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// 写出一幅图像的叠加图.
fn save_overlay(out_dir: &Path, bundle: &ImageBundle, report: &ImageReport) -> AnalysisResult<()> {
    let overlay = report.overlay();
    overlay.save_npz(out_dir.join(format!("{}.npz", report.name())))?;
    overlay.save_preview(out_dir.join(format!("{}.png", report.name())), bundle.dapi())
}

/// 分析一幅图像并写出叠加图. 任一步失败时该图像不产生任何结果行.
fn process_image<D: Detector>(
    pipeline: &Pipeline<D>,
    out_dir: &Path,
    bundle: &ImageBundle,
) -> AnalysisResult<ImageReport> {
    let report = pipeline.process(bundle)?;
    save_overlay(out_dir, bundle, &report)?;
    Ok(report)
}

/// 依次处理 `bundles`, 结果行追加到 `table`, 叠加图写入 `out_dir`.
///
/// 单幅图像失败只被记录进 `summary`. 结果表写入失败是致命错误, 立即返回.
pub fn run_batch<D, W, I>(
    pipeline: &Pipeline<D>,
    bundles: I,
    out_dir: &Path,
    table: &mut ResultsWriter<W>,
    summary: &mut BatchSummary,
) -> AnalysisResult<()>
where
    D: Detector,
    W: Write,
    I: IntoIterator<Item = (String, AnalysisResult<ImageBundle>)>,
{
    for (name, bundle) in bundles {
        match bundle.and_then(|b| process_image(pipeline, out_dir, &b)) {
            Ok(report) => {
                table.append(report.name(), report.rows())?;
                summary.record_success(report.rows().len());
            }
            Err(e) => {
                error!("image `{name}` failed: {e}");
                summary.record_failure(name);
            }
        }
    }
    Ok(())
}

/// 实际运行.
///
/// 输入目录不存在, 没有任何输入, 配置非法或者结果表无法创建/写入时返回错误;
/// 单幅图像失败只被记录, 不会中断运行.
pub fn run() -> Result<BatchSummary, Box<dyn Error>> {
    let input_dir = loader::input_dir_from_env_or_home()
        .ok_or("cannot determine input directory; set NUCFOCI_INPUT_DIR")?;
    if !input_dir.is_dir() {
        return Err(format!("input directory {} does not exist", input_dir.display()).into());
    }

    let config = load_config()?;
    let bundles = loader::bundle_loader(&input_dir, config.channels().clone())?;
    info!("{} images found in {}", bundles.len(), input_dir.display());

    let out_dir = create_output_dir(&input_dir)?;
    let mut table = ResultsWriter::create(out_dir.join(RESULTS_FILE))?;
    let pipeline = Pipeline::new(config, StoredLabels)?;

    let mut summary = BatchSummary::new(out_dir.clone());
    run_batch(&pipeline, bundles, &out_dir, &mut table, &mut summary)?;
    Ok(summary)
}
