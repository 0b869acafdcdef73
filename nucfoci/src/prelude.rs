//! 🔬欢迎光临🧫
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};
pub use crate::{AnalysisError, AnalysisResult};

pub use crate::{Calibration, CalibratedImage, IntensityWindow};
pub use crate::{DilationKernel, ObjectPopulation, SpatialObject};

pub use crate::config::{AnalysisConfig, AreaRange, ChannelNames, DilationRadius};
pub use crate::dataset::{self, bundle_loader, find_images, home_dataset_dir_with, ImageBundle};
pub use crate::detect::{Detector, ObjectRole, StoredLabels};

pub use crate::assign::{assign_foci, NucleusRecord};
pub use crate::coloc::{colocalize, ColocalizationStats};
pub use crate::nucleus::{MeasureChannels, Measurer};

pub use crate::overlay::Overlay;
pub use crate::pipeline::{ImageReport, Pipeline};
pub use crate::report::{MeasurementRow, ResultsWriter};
