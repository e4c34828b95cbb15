//! Quake 3 colour codes
//!
//! Names and values may carry `^` escapes. The short form is a caret followed
//! by any single character (`^1`, `^z`), the extended form used by some mods is
//! `^X` followed by a six character RGB value (`^XFF8000`).

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

// `.` does not match a newline, so `^` at the end of a line stays literal
const COLOR_PATTERN: &str = r"\^(X.{6}|.)";

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COLOR_PATTERN).expect("colour pattern is valid"))
}

/// Remove all colour escapes from `text`
pub fn strip_colors(text: &str) -> Cow<'_, str> {
    color_regex().replace_all(text, "")
}
