//! Subcommand implementations.

pub mod check;
pub mod list;
pub mod run;

/// Shorten `s` to at most `max` characters, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("app=api", 10), "app=api");
        assert_eq!(truncate("app=api,tier=backend", 10), "app=api,t…");
    }
}
