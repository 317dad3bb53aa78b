//! Remote object naming convention.
//!
//! Remote names embed the note title for human browsability plus the local
//! note id for the reverse mapping: `"{sanitized-title}--{id}.json"`. Older
//! versions wrote `"tabula-note-{id}.json"`; that parser is a permanent
//! read-compatibility shim.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::defaults::REMOTE_NAME_TITLE_MAX;

/// Legacy naming pattern: no `--` delimiter, fixed prefix, trailing id.
static LEGACY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tabula-note-(.+)\.json$").expect("legacy name regex is valid"));

/// Sanitize a title for embedding into a remote object name: strip anything
/// that is not alphanumeric, space, hyphen, or underscore; convert spaces to
/// underscores; truncate.
fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    let cleaned = cleaned.chars().take(REMOTE_NAME_TITLE_MAX).collect::<String>();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Build the remote object name for a note.
pub fn remote_object_name(title: &str, id: &str) -> String {
    format!("{}--{}.json", sanitize_title(title), id)
}

/// Recover the local note id from a remote object name. Returns `None` for
/// names written by neither the current nor the legacy convention; callers
/// skip and log those.
pub fn parse_object_name(name: &str) -> Option<String> {
    if let Some(stem) = name.strip_suffix(".json") {
        if let Some((_, id)) = stem.rsplit_once("--") {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    LEGACY_NAME
        .captures(name)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_round_trip() {
        let name = remote_object_name("My Report!!", "note-42");
        assert_eq!(name, "My_Report--note-42.json");
        assert_eq!(parse_object_name(&name).as_deref(), Some("note-42"));
    }

    #[test]
    fn legacy_name_still_parses() {
        assert_eq!(
            parse_object_name("tabula-note-note-42.json").as_deref(),
            Some("note-42")
        );
    }

    #[test]
    fn title_is_truncated() {
        let long_title = "x".repeat(200);
        let name = remote_object_name(&long_title, "id-1");
        assert_eq!(name, format!("{}--id-1.json", "x".repeat(REMOTE_NAME_TITLE_MAX)));
    }

    #[test]
    fn empty_title_gets_placeholder() {
        assert_eq!(remote_object_name("!!!", "id-1"), "untitled--id-1.json");
    }

    #[test]
    fn title_with_delimiter_still_recovers_id() {
        // rsplit keeps the id even when the sanitized title contains "--".
        let name = remote_object_name("a--b", "note-9");
        assert_eq!(parse_object_name(&name).as_deref(), Some("note-9"));
    }

    #[test]
    fn unparseable_names_are_rejected() {
        assert!(parse_object_name("random.json").is_none());
        assert!(parse_object_name("not-even-json.txt").is_none());
        assert!(parse_object_name("--.json").is_none());
    }
}
