//! Host APIs for extractors.
//!
//! - [`http`] - HTTP client with tracing and per-proxy clients
//! - [`process`] - Cancellable subprocess execution
//! - [`browser`] - Headless browser sessions

pub mod browser;
pub mod http;
pub mod process;

// Re-export key types
pub use browser::{BrowserLauncher, BrowserSession, ChromiumLauncher, LaunchOptions, ValueSource};
pub use http::{HttpClient, ResponseExt};
pub use process::{ProcessOutput, ProcessRunner};
