//! Output formatting for CLI.

mod json;
mod text;

pub use json::{ClassifyOutput, JsonFormatter, PlatformOutput};
pub use text::TextFormatter;
