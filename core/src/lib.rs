//! Preloader Core - Foundational Types
//!
//! Errors, configuration and the image data model shared by the
//! preloader runtime and CLI.

pub mod config;
pub mod error;
pub mod image;

// Re-export commonly used types
pub use config::{CtrConfig, ExportConfig, ImageSource, PollPolicy, PreloaderConfig, SnapshotConfig};
pub use config::DEFAULT_EXCLUDED_PREFIX;
pub use error::{PreloaderError, Result};
pub use image::{CachedImage, ExclusionRuleSet, Image, Origin};

/// Preloader version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
