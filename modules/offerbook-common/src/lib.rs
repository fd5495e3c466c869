pub mod config;
pub mod error;
pub mod types;

pub use config::ReconcilerConfig;
pub use error::OfferbookError;
pub use types::*;
