//! Console status lines.

use std::fmt::Display;

pub const SUCCESS: &str = "✅";
pub const FAILURE: &str = "❌";
pub const INFO: &str = "📄";

/// `"<marker> <message>"`, the form every status line takes.
pub fn line(marker: &str, message: impl Display) -> String {
    format!("{marker} {message}")
}

pub fn success(message: impl Display) {
    println!("{}", line(SUCCESS, message));
}

pub fn failure(message: impl Display) {
    println!("{}", line(FAILURE, message));
}

pub fn info(message: impl Display) {
    println!("{}", line(INFO, message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_start_with_their_marker() {
        assert_eq!(line(SUCCESS, "Heatmap saved: out.png"), "✅ Heatmap saved: out.png");
        assert_eq!(line(FAILURE, 42), "❌ 42");
        assert!(line(INFO, "Detected columns").starts_with("📄 "));
    }
}
