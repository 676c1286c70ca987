//! Pretty-printed JSON array artifacts.
//!
//! Each worker appends to its own partial file; [`merge_partials`] folds the
//! partials of one site into the final artifact once every worker is done.
//! [`recover_partials`] folds partials left by an interrupted run into the
//! existing artifact. Files are replaced through a temporary sibling so an
//! interrupted write never truncates an artifact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{stamp, Destination, Sink, SinkError};
use crate::extract::RawProductRecord;

const PARTIAL_MARKER: &str = ".part-";

/// Appends stamped records to a JSON array file.
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// A fresh partial file for one worker of one site run.
    pub fn partial(dir: &Path, site: &str, worker: usize) -> Self {
        let name = format!(
            "{}{}{:03}-{}.json",
            site,
            PARTIAL_MARKER,
            worker,
            uuid::Uuid::new_v4().simple()
        );
        Self::new(dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for JsonFileSink {
    async fn write(
        &self,
        records: &[RawProductRecord],
        destination: &Destination,
    ) -> Result<usize, SinkError> {
        let _guard = self.lock.lock().await;

        let mut existing = if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| SinkError::io(&self.path, e))?
        {
            read_artifact(&self.path).await?
        } else {
            Vec::new()
        };
        existing.extend(records.iter().map(|r| stamp(r, destination)));

        write_artifact(&self.path, &existing).await?;
        tracing::debug!(
            "Wrote {} records to {} ({} total)",
            records.len(),
            self.path.display(),
            existing.len()
        );
        Ok(records.len())
    }
}

/// Read a JSON artifact: an array of objects, a single object, or an empty file.
pub async fn read_artifact(path: &Path) -> Result<Vec<Map<String, Value>>, SinkError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SinkError::io(path, e))?;
    parse_artifact(&content, path)
}

fn parse_artifact(content: &str, path: &Path) -> Result<Vec<Map<String, Value>>, SinkError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let malformed = |reason: String| SinkError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    match serde_json::from_str::<Value>(content).map_err(|e| malformed(e.to_string()))? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(malformed(format!(
                    "item {} is {} instead of an object",
                    i,
                    json_kind(&other)
                ))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![map]),
        other => Err(malformed(format!(
            "top level is {} instead of an array",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

async fn write_artifact(path: &Path, items: &[Map<String, Value>]) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SinkError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(items)?;

    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| SinkError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SinkError::io(path, e));
    }
    Ok(())
}

/// `.<name>.<uuid>.tmp` next to `path`; never matches a partial name.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{}.{}.tmp",
        name,
        uuid::Uuid::new_v4().simple()
    ))
}

/// Partial files of `site` in `dir`, in worker order.
async fn find_partials(dir: &Path, site: &str) -> Result<Vec<PathBuf>, SinkError> {
    let prefix = format!("{}{}", site, PARTIAL_MARKER);
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SinkError::io(dir, e))?;

    let mut partials = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SinkError::io(dir, e))?
    {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".json") {
            partials.push(entry.path());
        }
    }
    partials.sort();
    Ok(partials)
}

/// Concatenate every partial of `site` into `output` and remove the partials.
///
/// `output` is replaced. Returns the number of records in the merged
/// artifact; with no partials the output is written as an empty array.
pub async fn merge_partials(dir: &Path, site: &str, output: &Path) -> Result<usize, SinkError> {
    let partials = find_partials(dir, site).await?;
    let (merged, consumed) = read_partials(&partials).await;

    write_artifact(output, &merged).await?;
    remove_partials(&consumed).await;

    tracing::info!(
        "Merged {} partial files into {} ({} records)",
        consumed.len(),
        output.display(),
        merged.len()
    );
    Ok(merged.len())
}

/// Append partials of `site` left by an interrupted run to `output`.
///
/// Returns the number of recovered records. Without readable partials
/// `output` is left untouched.
pub async fn recover_partials(dir: &Path, site: &str, output: &Path) -> Result<usize, SinkError> {
    let partials = find_partials(dir, site).await?;
    let (recovered, consumed) = read_partials(&partials).await;
    if consumed.is_empty() {
        return Ok(0);
    }

    let mut items = if tokio::fs::try_exists(output)
        .await
        .map_err(|e| SinkError::io(output, e))?
    {
        read_artifact(output).await?
    } else {
        Vec::new()
    };
    items.extend(recovered.iter().cloned());

    write_artifact(output, &items).await?;
    remove_partials(&consumed).await;

    tracing::info!(
        "Recovered {} records from {} partial files into {}",
        recovered.len(),
        consumed.len(),
        output.display()
    );
    Ok(recovered.len())
}

/// Read partials in order. Malformed ones are skipped and stay on disk.
async fn read_partials(partials: &[PathBuf]) -> (Vec<Map<String, Value>>, Vec<PathBuf>) {
    let mut items = Vec::new();
    let mut consumed = Vec::new();
    for partial in partials {
        match read_artifact(partial).await {
            Ok(records) => {
                items.extend(records);
                consumed.push(partial.clone());
            }
            Err(e) => tracing::warn!("Skipping partial {}: {}", partial.display(), e),
        }
    }
    (items, consumed)
}

async fn remove_partials(partials: &[PathBuf]) {
    for partial in partials {
        if let Err(e) = tokio::fs::remove_file(partial).await {
            tracing::warn!("Failed to remove partial {}: {}", partial.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn destination(category: &str) -> Destination {
        Destination::new(
            "zepto",
            category,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn write_appends_to_existing_array() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out.json"));

        let first = [RawProductRecord::new().with("name", "Atta")];
        let second = [
            RawProductRecord::new().with("name", "Rice"),
            RawProductRecord::new().with("name", "Dal"),
        ];
        assert_eq!(sink.write(&first, &destination("flour")).await.unwrap(), 1);
        assert_eq!(sink.write(&second, &destination("grains")).await.unwrap(), 2);

        let items = read_artifact(sink.path()).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["category"], "flour");
        assert_eq!(items[2]["name"], "Dal");
        assert_eq!(items[2]["scraped_date"], "2025-03-01");
    }

    #[tokio::test]
    async fn merge_combines_partials_in_worker_order() {
        let dir = tempfile::tempdir().unwrap();
        let w1 = JsonFileSink::partial(dir.path(), "zepto", 1);
        let w0 = JsonFileSink::partial(dir.path(), "zepto", 0);
        let other = JsonFileSink::partial(dir.path(), "blinkit", 0);

        w1.write(&[RawProductRecord::new().with("name", "b")], &destination("x"))
            .await
            .unwrap();
        w0.write(&[RawProductRecord::new().with("name", "a")], &destination("x"))
            .await
            .unwrap();
        other
            .write(&[RawProductRecord::new().with("name", "z")], &destination("x"))
            .await
            .unwrap();

        let output = dir.path().join("zepto_products.json");
        let count = merge_partials(dir.path(), "zepto", &output).await.unwrap();
        assert_eq!(count, 2);

        let items = read_artifact(&output).await.unwrap();
        assert_eq!(items[0]["name"], "a");
        assert_eq!(items[1]["name"], "b");
        assert!(!w0.path().exists());
        assert!(other.path().exists());
    }

    #[test]
    fn artifact_shapes() {
        let path = Path::new("a.json");
        assert!(parse_artifact("", path).unwrap().is_empty());
        assert_eq!(parse_artifact(r#"{"name": "x"}"#, path).unwrap().len(), 1);
        assert!(matches!(
            parse_artifact("[1, 2]", path),
            Err(SinkError::Malformed { .. })
        ));
        assert!(matches!(
            parse_artifact("[{\"name\": ", path),
            Err(SinkError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn recover_without_partials_keeps_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("zepto_products.json");
        JsonFileSink::partial(dir.path(), "zepto", 0)
            .write(&[RawProductRecord::new().with("name", "a")], &destination("x"))
            .await
            .unwrap();
        assert_eq!(merge_partials(dir.path(), "zepto", &output).await.unwrap(), 1);

        assert_eq!(recover_partials(dir.path(), "zepto", &output).await.unwrap(), 0);
        let items = read_artifact(&output).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "a");
    }

    #[tokio::test]
    async fn recover_appends_to_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("zepto_products.json");
        JsonFileSink::new(&output)
            .write(&[RawProductRecord::new().with("name", "a")], &destination("x"))
            .await
            .unwrap();
        JsonFileSink::partial(dir.path(), "zepto", 2)
            .write(&[RawProductRecord::new().with("name", "b")], &destination("x"))
            .await
            .unwrap();

        assert_eq!(recover_partials(dir.path(), "zepto", &output).await.unwrap(), 1);
        let names: Vec<_> = read_artifact(&output)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item["name"].clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(find_partials(dir.path(), "zepto").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncated_partial_is_skipped_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("zepto_products.json");
        let good = JsonFileSink::partial(dir.path(), "zepto", 0);
        good.write(&[RawProductRecord::new().with("name", "a")], &destination("x"))
            .await
            .unwrap();
        let truncated = dir.path().join("zepto.part-001-dead.json");
        std::fs::write(&truncated, "[\n  {\n    \"name\": \"b").unwrap();

        assert_eq!(recover_partials(dir.path(), "zepto", &output).await.unwrap(), 1);
        assert_eq!(read_artifact(&output).await.unwrap()[0]["name"], "a");
        assert!(!good.path().exists());
        assert!(truncated.exists());

        assert_eq!(merge_partials(dir.path(), "zepto", &output).await.unwrap(), 0);
        assert!(truncated.exists());
    }

    #[tokio::test]
    async fn writes_leave_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out.json"));
        sink.write(&[RawProductRecord::new().with("name", "a")], &destination("x"))
            .await
            .unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.json"]);
    }
}
