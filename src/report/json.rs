//! JSON output for scripting and piping.
//!
//! Snippets serialize exactly as they appear in an export document.

use crate::error::Result;
use crate::snippet::Snippet;

pub fn render_snippets(snippets: &[Snippet]) -> Result<String> {
    Ok(serde_json::to_string_pretty(snippets)?)
}

pub fn render_snippet(snippet: &Snippet) -> Result<String> {
    Ok(serde_json::to_string_pretty(snippet)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_a_json_array_of_records() {
        let snippets = vec![Snippet::new("a", "echo a").with_tags("x,y")];
        let value: serde_json::Value = serde_json::from_str(&render_snippets(&snippets).unwrap()).unwrap();
        assert_eq!(value[0]["name"], "a");
        assert_eq!(value[0]["tags"], "x,y");
        assert!(value[0]["last_used"].is_string());
    }
}
