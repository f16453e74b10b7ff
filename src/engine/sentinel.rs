//! Parsing of the native engine's success line.
//!
//! The engine prints `SUKSES: <path>` once the workbook is written. The first
//! such line wins; later ones are ignored; no line means the location is
//! unknown. Parsing never fails.

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Prefix of the success line
pub const SUCCESS_PREFIX: &str = "SUKSES:";

fn success_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"^[ \t]*{}[ \t]*(.*?)[ \t\r]*$", regex::escape(SUCCESS_PREFIX));
        Regex::new(&pattern).expect("success-line pattern is valid")
    })
}

/// Output path announced on stdout, if any
pub fn parse_success_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .filter_map(|line| success_line().captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|path| !path.is_empty())
        .map(PathBuf::from)
}
