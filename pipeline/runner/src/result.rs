//! 批处理结果.

use std::io::{self, Write};
use std::path::PathBuf;

/// 一次批处理运行的汇总.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    out_dir: PathBuf,
    processed: usize,
    nuclei: usize,
    failed: Vec<String>,
}

impl BatchSummary {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            ..Default::default()
        }
    }

    /// 记录一幅成功处理的图像, 其中测量了 `nuclei` 个细胞核.
    pub fn record_success(&mut self, nuclei: usize) {
        self.processed += 1;
        self.nuclei += nuclei;
    }

    /// 记录一幅失败的图像.
    pub fn record_failure(&mut self, name: String) {
        self.failed.push(name);
    }

    /// 成功处理的图像数.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// 失败的图像名称.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// 将汇总写进 `w` 中.
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Batch summary:")?;
        writeln!(w, "{S4}Output directory: {}", self.out_dir.display())?;
        writeln!(w, "{S4}Images processed: {}", self.processed)?;
        writeln!(w, "{S4}Nuclei measured: {}", self.nuclei)?;
        write!(w, "{S4}Images failed: {}", self.failed.len())?;
        for name in &self.failed {
            write!(w, "\n{S4}{S4}{name}")?;
        }
        Ok(())
    }

    /// 输出运行汇总.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);
        match self.describe_into(&mut buf) {
            Ok(()) => println!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => log::error!("cannot describe batch summary: {e}"),
        }
        utils::sep();
    }
}
