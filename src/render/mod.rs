//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::Result;
pub use robot::RobotOutput;

/// Output options shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputOptions {
    /// Render `data` as JSON in the robot envelope, or with `human` otherwise.
    pub fn render<T: Serialize>(
        &self,
        command: &str,
        data: &T,
        human: impl FnOnce(&T) -> String,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(human(data)),
            OutputFormat::Json => {
                let mut json = robot::render_json(&RobotOutput::new(command, data), self.pretty)?;
                json.push('\n');
                Ok(json)
            }
        }
    }
}
