use super::Diagnostic;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[CODE]: message"
        let severity_label = self.bold_red("error");
        match d.code {
            Some(code) => out.push_str(&format!(
                "{}{}: {}\n",
                severity_label,
                self.bold_red(&format!("[{code}]")),
                self.bold(&d.message)
            )),
            None => out.push_str(&format!("{}: {}\n", severity_label, self.bold(&d.message))),
        }

        // "  --> [line N]"
        if let Some(line) = d.line {
            out.push_str(&format!("  {} [line {}]\n", self.cyan("-->"), line));
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} suggestion: {}\n", self.dim("="), suggestion));
        }

        out
    }
}
