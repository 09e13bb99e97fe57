use once_cell::sync::Lazy;
use regex::Regex;

use super::AnalysisMode;

const MIN_RESPONSE_CHARS: usize = 50;

static TRUNCATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\.\.\.$",
        r"etc\.$",
        r"and so on$",
        r"(?i)to be continued$",
        r"(?i)part \d+ of \d+$",
        r"(?i)truncated$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Whether a response looks cut off: missing, very short, trailing off with an
/// ellipsis-like ending, or below the mode's expected length.
///
/// Advisory only; callers keep the response either way.
pub fn is_response_incomplete(response: Option<&str>, mode: AnalysisMode) -> bool {
    let text = match response {
        Some(text) => text.trim(),
        None => return true,
    };
    let length = text.chars().count();
    if length < MIN_RESPONSE_CHARS {
        return true;
    }
    if TRUNCATION_PATTERNS.iter().any(|pattern| pattern.is_match(text)) {
        return true;
    }
    length < mode.min_response_chars()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(prefix: &str, len: usize) -> String {
        let mut s = prefix.to_string();
        while s.chars().count() < len {
            s.push_str(" lorem");
        }
        s
    }

    #[test]
    fn test_missing_and_short() {
        assert!(is_response_incomplete(None, AnalysisMode::Hints));
        assert!(is_response_incomplete(Some("Use a set."), AnalysisMode::Hints));
    }

    #[test]
    fn test_truncation_endings() {
        let base = long("Start", 300);
        for ending in ["...", " etc.", " and so on", " To be continued", " Part 1 of 2", " truncated"] {
            let text = format!("{}{}", base, ending);
            assert!(is_response_incomplete(Some(&text), AnalysisMode::Hints), "{}", ending);
        }
    }

    #[test]
    fn test_mode_minimums() {
        let text = long("Explanation", 120);
        assert!(!is_response_incomplete(Some(&format!("{}.", text)), AnalysisMode::Hints));
        assert!(is_response_incomplete(Some(&format!("{}.", text)), AnalysisMode::Explanation));
    }
}
