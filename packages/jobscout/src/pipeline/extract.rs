//! Pulling the tailored document out of raw model output.
//!
//! Each strategy is a pure function from the raw text to an optional
//! document; [`extract_document`] returns the first hit.

use std::sync::OnceLock;

use regex::Regex;

type Strategy = fn(&str) -> Option<String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("doctype", doctype_block),
    ("html", html_block),
    ("labeled", labeled_section),
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// `<!DOCTYPE html ... </html>`.
pub fn doctype_block(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)(<!DOCTYPE\s+html.*?</html>)")
        .captures(raw)
        .map(|c| c[1].trim().to_string())
}

/// `<html ...> ... </html>` without a doctype.
pub fn html_block(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)(<html.*?</html>)")
        .captures(raw)
        .map(|c| c[1].trim().to_string())
}

/// Text after a `FINAL_RESUME_HTML` label, up to the next numbered section or
/// `CHANGELOG`, with code fences removed. Must contain markup to count.
pub fn labeled_section(raw: &str) -> Option<String> {
    static SECTION: OnceLock<Regex> = OnceLock::new();
    static FENCE: OnceLock<Regex> = OnceLock::new();

    let body = regex(&SECTION, r"(?is)FINAL_RESUME_HTML\s*(.*?)(?:2\)|CHANGELOG)")
        .captures(raw)?
        .get(1)?
        .as_str()
        .trim();
    let body = match regex(&FENCE, r"(?s)```(?:html)?\n?(.+?)```").captures(body) {
        Some(fenced) => fenced.get(1).map_or(body, |m| m.as_str()).trim(),
        None => body,
    };
    if body.contains('<') {
        Some(body.to_string())
    } else {
        None
    }
}

/// First strategy that finds a document, with its name.
pub fn extract_document(raw: &str) -> Option<(&'static str, String)> {
    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(raw).map(|doc| (*name, doc)))
}

/// Body of a named report section such as `CHANGELOG`, empty if absent.
pub fn section(raw: &str, name: &str) -> String {
    let pattern = format!(
        r"(?is){}\s*(.*?)(?:\n(?:1\)|2\)|3\)|FINAL_RESUME|CHANGELOG|KEYWORD)|\z)",
        regex::escape(name)
    );
    match Regex::new(&pattern) {
        Ok(re) => re
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}
