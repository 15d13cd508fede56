pub mod error;
pub mod ip;
pub mod loader;
pub mod logger;
pub mod monitor;
pub mod progress;
pub mod validation;

pub use error::{Result, ScreeningError};
