use std::path::{Path, PathBuf};

use crate::{DownloadError, FailureKind};

const MAX_COMPONENT_LEN: usize = 120;
const FALLBACK_COMPONENT: &str = "download";

/// Maps a `/`-separated relative destination onto `root`, sanitizing each
/// component so the result is a plain file path strictly inside `root`.
pub fn resolve_destination(root: &Path, destination: &str) -> Result<PathBuf, DownloadError> {
    let components: Vec<&str> = destination
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if components.is_empty() {
        return Err(DownloadError::new(
            FailureKind::InvalidDestination,
            format!("empty destination {destination:?}"),
        ));
    }
    if components.iter().any(|part| *part == "..") {
        return Err(DownloadError::new(
            FailureKind::InvalidDestination,
            format!("destination escapes download root: {destination:?}"),
        ));
    }

    let mut path = root.to_path_buf();
    for part in components {
        path.push(sanitize_component(part));
    }
    Ok(path)
}

/// Windows-safe single path component.
pub fn sanitize_component(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&[' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = FALLBACK_COMPONENT.to_string();
    }
    if cleaned.len() > MAX_COMPONENT_LEN {
        let mut end = MAX_COMPONENT_LEN;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }
    if is_reserved_windows_name(&cleaned) {
        cleaned.insert(0, '_');
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem))
}
