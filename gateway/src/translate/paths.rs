//! Path-based cleanup for cross-OS clients (spec §4.8.1). Some upstreams
//! answer Unix-path-expecting IDE clients with Windows-style paths in
//! `reasoning`/`text` deltas, occasionally with whitespace-escape
//! corruption (`\t`, `\n` consumed as literal escapes rather than path
//! separators). Drive letters are rewritten to forward-slash form.
//!
//! Never applied to function-call *arguments* — paths inside tool input
//! must round-trip bit-exactly.

use once_cell::sync::Lazy;
use regex::Regex;

static DRIVE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z]):\\?").unwrap());
static CORRUPTED_TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\t").unwrap());
static CORRUPTED_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\n(?=[A-Za-z0-9_.-])").unwrap());

/// Rewrite `F:\foo\bar` forms to `F:/foo/bar`. Also handles the
/// whitespace-escape-corrupted case where a JSON-unescape pass already
/// consumed the backslash right after the drive letter (`F:MyProjects`
/// with no separator at all) — both are normalised to a single `/`.
pub fn repair_if_enabled(text: &str, enabled: bool) -> String {
    if enabled {
        repair_windows_paths(text)
    } else {
        text.to_string()
    }
}

pub fn repair_windows_paths(text: &str) -> String {
    if !DRIVE_LETTER.is_match(text) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in DRIVE_LETTER.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let drive = &m.as_str()[..1];
        out.push_str(drive);
        out.push_str(":/");
        last = m.end();
    }
    out.push_str(&text[last..]);

    let out = out.replace('\\', "/");
    let out = CORRUPTED_TAB.replace_all(&out, "/t");
    let out = CORRUPTED_NEWLINE.replace_all(&out, "/n");
    out.into_owned()
}
