//! Status icons

/// Icons prefixed to each status line.
#[derive(Debug, Clone, Copy)]
pub struct Icons {
    pub success: &'static str,
    pub skipped: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            skipped: "○",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_are_distinct() {
        let icons = Icons::default();
        assert_ne!(icons.success, icons.error);
        assert_ne!(icons.warning, icons.skipped);
    }
}
