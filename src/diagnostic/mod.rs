pub mod ansi;
pub mod json;

use crate::config::{ErrorFormat, VmConfig};

/// A runtime or compile error, ready to be rendered for the user.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub code: Option<&'static str>,
    /// Source line the failing instruction came from.
    pub line: Option<u32>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            code: None,
            line: None,
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Renders in whichever format the VM is configured for. Always ends in a newline.
    pub fn render(&self, config: &VmConfig) -> String {
        match config.error_format {
            ErrorFormat::Ansi => ansi::AnsiRenderer { use_color: config.use_color }.render(self),
            ErrorFormat::Json => {
                let mut s = json::render(self);
                s.push('\n');
                s
            }
        }
    }
}

// ---- From impls for VM error types ----

impl From<&crate::vm::RuntimeError> for Diagnostic {
    fn from(e: &crate::vm::RuntimeError) -> Self {
        let mut d = Diagnostic::error(e.kind.to_string())
            .with_code(e.kind.code())
            .with_line(e.line)
            .with_note("in script");
        if let Some(hint) = e.kind.hint() {
            d = d.with_suggestion(hint);
        }
        d
    }
}

impl From<&crate::vm::CompileError> for Diagnostic {
    fn from(e: &crate::vm::CompileError) -> Self {
        let mut d = Diagnostic::error(&e.message).with_code("EMB-C001");
        if let Some(line) = e.line {
            d = d.with_line(line);
        }
        d
    }
}
