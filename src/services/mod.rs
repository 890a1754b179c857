pub mod anomaly;
pub mod cleaning;
pub mod correlation;
pub mod dataset;
pub mod db_loader;
pub mod distribution;
pub mod excel;
pub mod file_processor;
pub mod insights;
pub mod numeric;
pub mod quality;
pub mod sample_data;
pub mod segmentation;
pub mod statistics;
pub mod store;
pub mod trend;

pub use dataset::{Cell, ColumnKind, Dataset};
pub use store::{DatasetInfo, Session, SessionRegistry, SessionSnapshot};
