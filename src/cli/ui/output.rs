use console::{StyledObject, style};

/// Terminal output helpers shared by every command
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Aligned `label: value` row
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", style(format!("{}:", label)).dim(), value);
    }

    /// Red for gains and green for losses, the local market convention
    pub fn change(&self, text: String, change: f64) -> StyledObject<String> {
        if change > 0.0 {
            style(text).red()
        } else if change < 0.0 {
            style(text).green()
        } else {
            style(text)
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
