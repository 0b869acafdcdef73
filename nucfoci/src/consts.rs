//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 叠加图中 foci 掩膜的填充值.
    pub const FOCI_MASK: u8 = WHITE;
}

/// npz 输入包中各条目的默认名字 (不含 `.npy` 后缀).
pub mod entry {
    /// RNF4 通道.
    pub const RNF4: &str = "rnf4";

    /// PML 通道.
    pub const PML: &str = "pml";

    /// RNF111 (辅助) 通道.
    pub const RNF111: &str = "rnf111";

    /// DAPI 通道.
    pub const DAPI: &str = "dapi";

    /// 细胞核标签图.
    pub const NUCLEI_LABELS: &str = "nuclei_labels";

    /// PML foci 标签图.
    pub const PML_LABELS: &str = "pml_labels";

    /// RNF4 foci 标签图.
    pub const RNF4_LABELS: &str = "rnf4_labels";

    /// 标定信息, `[pixel_width, pixel_height, pixel_depth]` 或仅 `[pixel_width]`.
    pub const CALIBRATION: &str = "calibration";
}

/// 输入包扩展名.
pub const BUNDLE_EXT: &str = "npz";

/// 结果表文件名.
pub const RESULTS_FILE: &str = "results.tsv";

/// 共定位判定的默认重叠比例.
pub const OVERLAP_FRACTION: f64 = 0.25;

/// 弥散信号计算中 foci 膨胀的默认水平半径 (体素).
pub const DILATION_XY: f64 = 2.0;

/// 弥散信号计算中 foci 膨胀的默认 z 方向半径 (体素).
pub const DILATION_Z: f64 = 0.0;
