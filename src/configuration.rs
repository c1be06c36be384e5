pub mod config;
pub mod types;

pub use config::Config;
pub use types::{ApiSettings, CaptureSettings, StoreSettings, UploaderSettings};
