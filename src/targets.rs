//! Target lists: what to scrape on each site.
//!
//! A target file is a JSON array whose entries are either strings (a listing
//! URL or a search term) or objects with `name` and/or `url`:
//!
//! ```json
//! ["https://www.bigbasket.com/cl/fruits-vegetables/", "toor dal",
//!  {"name": "basmati rice", "url": "https://blinkit.com/s/?q=basmati"}]
//! ```

use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Failed to read target file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid target file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Target #{0} has neither a name nor a url")]
    Empty(usize),
}

/// One listing page or search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Plain(String),
    Named {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl Target {
    /// A URL when `raw` looks like one, else a search term.
    pub fn from_query(raw: &str) -> Self {
        let raw = raw.trim();
        if is_url(raw) {
            Self {
                name: None,
                url: Some(raw.to_string()),
            }
        } else {
            Self {
                name: Some(raw.to_string()),
                url: None,
            }
        }
    }

    pub fn named(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Search term, falling back to the URL.
    pub fn query(&self) -> &str {
        self.name
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or_default()
    }

    /// Short label for logs and progress output.
    pub fn label(&self) -> &str {
        self.query()
    }
}

fn is_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a target list from JSON text.
pub fn parse_targets(json: &str, path: &str) -> Result<Vec<Target>, TargetError> {
    let raw: Vec<RawTarget> = serde_json::from_str(json).map_err(|source| TargetError::Parse {
        path: path.to_string(),
        source,
    })?;

    raw.into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            RawTarget::Plain(s) if !s.trim().is_empty() => Ok(Target::from_query(&s)),
            RawTarget::Plain(_) => Err(TargetError::Empty(i)),
            RawTarget::Named { name, url } => {
                let name = non_empty(name);
                let url = non_empty(url);
                if name.is_none() && url.is_none() {
                    return Err(TargetError::Empty(i));
                }
                Ok(Target { name, url })
            }
        })
        .collect()
}

/// Load a target list from a JSON file.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, TargetError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| TargetError::Io {
        path: display.clone(),
        source,
    })?;
    parse_targets(&content, &display)
}

/// Half-open batch range, clamped to the list.
pub fn batch_range(len: usize, start: usize, end: Option<usize>) -> Range<usize> {
    let end = end.unwrap_or(len).min(len);
    start.min(end)..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_entries() {
        let targets = parse_targets(
            r#"["https://www.bigbasket.com/cl/eggs-meat-fish/", " toor dal ",
                {"name": "Basmati Rice"}, {"url": "https://blinkit.com/cn/rice"}]"#,
            "targets.json",
        )
        .unwrap();

        assert_eq!(targets.len(), 4);
        assert_eq!(
            targets[0].url(),
            Some("https://www.bigbasket.com/cl/eggs-meat-fish/")
        );
        assert_eq!(targets[1].name(), Some("toor dal"));
        assert_eq!(targets[2].query(), "Basmati Rice");
        assert_eq!(targets[3].query(), "https://blinkit.com/cn/rice");
    }

    #[test]
    fn rejects_empty_entries() {
        assert!(matches!(
            parse_targets(r#"["a", {"name": "  "}]"#, "t.json"),
            Err(TargetError::Empty(1))
        ));
        assert!(matches!(
            parse_targets(r#"{"name": "a"}"#, "t.json"),
            Err(TargetError::Parse { .. })
        ));
    }

    #[test]
    fn batch_range_is_clamped() {
        assert_eq!(batch_range(10, 0, Some(4)), 0..4);
        assert_eq!(batch_range(10, 8, Some(40)), 8..10);
        assert_eq!(batch_range(10, 12, None), 10..10);
        assert_eq!(batch_range(3, 1, None), 1..3);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.json");
        std::fs::write(&path, r#"["atta", "ghee"]"#).unwrap();
        let targets = load_targets(&path).unwrap();
        assert_eq!(targets[1].query(), "ghee");
        assert!(matches!(
            load_targets(&dir.path().join("missing.json")),
            Err(TargetError::Io { .. })
        ));
    }
}
