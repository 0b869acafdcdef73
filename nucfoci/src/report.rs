//! 单核测量结果行, 以及制表符分隔的结果表.

use crate::AnalysisResult;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 结果表各列标题, 第一列为图像名, 其余与 [`MeasurementRow::fields`] 顺序一致.
pub const COLUMNS: [&str; 21] = [
    "Image name",
    "Nucleus ID",
    "Nucleus area (µm2)",
    "PML raw integrated density",
    "PML foci number",
    "PML foci total area (µm2)",
    "PML foci raw integrated density",
    "PML diffuse area (µm2)",
    "PML diffuse raw integrated density",
    "RNF4 raw integrated density",
    "RNF4 foci number",
    "RNF4 foci total area (µm2)",
    "RNF4 foci raw integrated density",
    "RNF4 diffuse area (µm2)",
    "RNF4 diffuse raw integrated density",
    "RNF111 raw integrated density",
    "RNF4-positive PML foci number",
    "RNF4-positive PML foci total area (µm2)",
    "PML-positive RNF4 foci number",
    "PML-positive RNF4 foci total area (µm2)",
    "PML-RNF4 foci total overlap area (µm2)",
];

/// 结果表中的单个值. 计数以整数输出, 其余以浮点数输出.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    /// 整数 (标签, 个数).
    Int(u64),
    /// 浮点数 (面积, 强度).
    Float(f64),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{v}"),
            Field::Float(v) => write!(f, "{v}"),
        }
    }
}

/// 一个细胞核的全部测量值. 面积为标定单位, 强度为原始像素值之和.
///
/// 弥散面积可能为负 (膨胀后的 foci 越出细胞核边界时), 不做截断.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementRow {
    /// 细胞核标签.
    pub nucleus_id: u32,
    /// 细胞核面积.
    pub nucleus_area: f64,
    /// 细胞核内 PML 通道积分强度.
    pub pml_intensity: f64,
    /// PML foci 个数.
    pub pml_foci_count: usize,
    /// PML foci 面积之和.
    pub pml_foci_area: f64,
    /// PML foci 积分强度之和.
    pub pml_foci_intensity: f64,
    /// PML 弥散面积.
    pub pml_diffuse_area: f64,
    /// PML 弥散积分强度.
    pub pml_diffuse_intensity: f64,
    /// 细胞核内 RNF4 通道积分强度.
    pub rnf4_intensity: f64,
    /// RNF4 foci 个数.
    pub rnf4_foci_count: usize,
    /// RNF4 foci 面积之和.
    pub rnf4_foci_area: f64,
    /// RNF4 foci 积分强度之和.
    pub rnf4_foci_intensity: f64,
    /// RNF4 弥散面积.
    pub rnf4_diffuse_area: f64,
    /// RNF4 弥散积分强度.
    pub rnf4_diffuse_intensity: f64,
    /// 细胞核内 RNF111 通道积分强度.
    pub rnf111_intensity: f64,
    /// RNF4 阳性的 PML foci 个数.
    pub rnf4_positive_pml_count: usize,
    /// RNF4 阳性的 PML foci 面积之和.
    pub rnf4_positive_pml_area: f64,
    /// PML 阳性的 RNF4 foci 个数.
    pub pml_positive_rnf4_count: usize,
    /// PML 阳性的 RNF4 foci 面积之和.
    pub pml_positive_rnf4_area: f64,
    /// PML 与 RNF4 foci 总重叠面积.
    pub overlap_area: f64,
}

impl MeasurementRow {
    /// 按输出顺序排列的全部字段.
    pub fn fields(&self) -> [Field; 20] {
        use Field::{Float, Int};
        [
            Int(self.nucleus_id as u64),
            Float(self.nucleus_area),
            Float(self.pml_intensity),
            Int(self.pml_foci_count as u64),
            Float(self.pml_foci_area),
            Float(self.pml_foci_intensity),
            Float(self.pml_diffuse_area),
            Float(self.pml_diffuse_intensity),
            Float(self.rnf4_intensity),
            Int(self.rnf4_foci_count as u64),
            Float(self.rnf4_foci_area),
            Float(self.rnf4_foci_intensity),
            Float(self.rnf4_diffuse_area),
            Float(self.rnf4_diffuse_intensity),
            Float(self.rnf111_intensity),
            Int(self.rnf4_positive_pml_count as u64),
            Float(self.rnf4_positive_pml_area),
            Int(self.pml_positive_rnf4_count as u64),
            Float(self.pml_positive_rnf4_area),
            Float(self.overlap_area),
        ]
    }
}

/// 结果表写入器. 创建时写入一次表头, 之后逐幅图像追加.
pub struct ResultsWriter<W: Write> {
    out: W,
    rows: usize,
}

impl ResultsWriter<BufWriter<File>> {
    /// 在 `path` 处新建结果表.
    pub fn create<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> ResultsWriter<W> {
    /// 包装 `out` 并写入表头.
    pub fn new(mut out: W) -> AnalysisResult<Self> {
        writeln!(out, "{}", COLUMNS.join("\t"))?;
        Ok(Self { out, rows: 0 })
    }

    /// 追加图像 `image_name` 的全部结果行, 并立即刷新.
    pub fn append(&mut self, image_name: &str, rows: &[MeasurementRow]) -> AnalysisResult<()> {
        for row in rows {
            write!(self.out, "{image_name}")?;
            for field in row.fields() {
                write!(self.out, "\t{field}")?;
            }
            writeln!(self.out)?;
        }
        self.rows += rows.len();
        self.out.flush()?;
        Ok(())
    }

    /// 已写入的数据行数 (不含表头).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 取回底层写入器.
    pub fn into_inner(self) -> W {
        self.out
    }
}
