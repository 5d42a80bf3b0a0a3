use serde::{Deserialize, Serialize};

/// How diagnostics are written to the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    /// Human-readable, optionally coloured.
    #[default]
    Ansi,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Print the stack and the decoded instruction before every dispatch.
    pub trace_execution: bool,
    pub error_format: ErrorFormat,
    pub use_color: bool,
}

impl VmConfig {
    pub fn with_trace(mut self, on: bool) -> Self {
        self.trace_execution = on;
        self
    }

    pub fn with_error_format(mut self, format: ErrorFormat) -> Self {
        self.error_format = format;
        self
    }

    pub fn with_color(mut self, on: bool) -> Self {
        self.use_color = on;
        self
    }
}
