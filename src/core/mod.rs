pub mod engine;
pub mod merge;

pub use crate::domain::model::{MergedTable, ServiceReport, ServiceRow};
pub use crate::domain::ports::{Screener, Storage};
pub use crate::utils::error::Result;
pub use engine::{get_execution_summary, ScreeningEngine, ScreeningRunResult, ServiceOutcome};
pub use merge::{merge_reports, to_csv_bytes, to_json_records};
