pub mod config;
pub mod core;
pub mod domain;
pub mod screeners;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliArgs};

pub use config::toml_config::ScreeningConfig;
pub use crate::core::{engine::ScreeningEngine, merge::merge_reports};
pub use screeners::build_screeners;
pub use utils::error::{Result, ScreeningError};
