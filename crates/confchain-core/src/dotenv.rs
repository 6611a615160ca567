//! Parser for dotenv files
//!
//! Produces the *raw* declared value of every `KEY=VALUE` entry. References
//! such as `${HOST}` are kept verbatim; expanding them is the caller's job.
//!
//! Accepted syntax:
//! - `KEY=value`, `KEY = value`, `KEY: value`, optional `export ` prefix
//! - `'single'`, `"double"` and `` `backtick` `` quoted values, which may span
//!   lines; `\n` and `\r` are unescaped inside double quotes only
//! - `#` comments, on their own line or after an unquoted value
//! - CRLF or CR line endings
//!
//! Lines that do not match are skipped. A key repeated within one source
//! keeps its last value.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

fn line_pattern() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(
            r#"(?m)^\s*(?:export\s+)?([\w.-]+)(?:\s*=\s*?|:\s+?)(\s*'(?:\\'|[^'])*'|\s*"(?:\\"|[^"])*"|\s*`(?:\\`|[^`])*`|[^#\r\n]+)?\s*(?:#.*)?$"#,
        )
        .expect("dotenv line pattern is valid")
    })
}

/// Parse dotenv source into an ordered name → raw value map
pub fn parse(source: &str) -> IndexMap<String, String> {
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    let mut vars = IndexMap::new();

    for caps in line_pattern().captures_iter(&normalized) {
        let raw = caps.get(2).map_or("", |m| m.as_str()).trim();
        vars.insert(caps[1].to_string(), unquote(raw));
    }

    vars
}

fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if open == close && matches!(open, '\'' | '"' | '`') => {
            let inner = &raw[1..raw.len() - 1];
            if open == '"' {
                inner.replace("\\n", "\n").replace("\\r", "\r")
            } else {
                inner.to_string()
            }
        }
        _ => raw.to_string(),
    }
}
