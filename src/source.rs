//! Where raw payloads come from.
//!
//! Both feeds return a query-result JSON document; extracting and mapping its
//! rows is the loader's job. Sources do no retries and no timeouts.

use crate::error::{BoardError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch the top-level payload.
    async fn fetch_top_level(&self) -> Result<Value>;

    /// Fetch the drill-down payload for one sorting center.
    async fn fetch_children(&self, entity_id: &str) -> Result<Value>;
}

/// Reporting backend reached over HTTP.
pub struct HttpRowSource {
    top_level_url: String,
    drill_down_url: Option<String>,
    drill_down_param: String,
    client: reqwest::Client,
}

impl HttpRowSource {
    pub fn new(top_level_url: &str, drill_down_url: Option<&str>, drill_down_param: &str) -> Self {
        Self {
            top_level_url: top_level_url.to_string(),
            drill_down_url: drill_down_url.map(str::to_string),
            drill_down_param: drill_down_param.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;

        if response.status().is_success() {
            let json: Value = response.json().await?;
            Ok(json)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BoardError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl RowSource for HttpRowSource {
    async fn fetch_top_level(&self) -> Result<Value> {
        info!(url = %self.top_level_url, "fetching top-level rows");
        self.get(&self.top_level_url, &[]).await
    }

    async fn fetch_children(&self, entity_id: &str) -> Result<Value> {
        let url = self
            .drill_down_url
            .as_deref()
            .ok_or_else(|| BoardError::Config("no drill-down URL configured".to_string()))?;
        info!(url = %url, entity = %entity_id, "fetching drill-down rows");
        self.get(url, &[(self.drill_down_param.as_str(), entity_id)]).await
    }
}

/// Payloads saved to disk: one top-level file and, optionally, a directory
/// holding `<entity>.json` drill-down files.
pub struct SnapshotSource {
    top_level: PathBuf,
    children_dir: Option<PathBuf>,
}

impl SnapshotSource {
    pub fn new(top_level: impl Into<PathBuf>, children_dir: Option<PathBuf>) -> Self {
        Self {
            top_level: top_level.into(),
            children_dir,
        }
    }

    fn read(path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RowSource for SnapshotSource {
    async fn fetch_top_level(&self) -> Result<Value> {
        info!(path = %self.top_level.display(), "reading top-level snapshot");
        Self::read(&self.top_level)
    }

    async fn fetch_children(&self, entity_id: &str) -> Result<Value> {
        let Some(dir) = &self.children_dir else {
            return Ok(Value::Null);
        };
        if entity_id.is_empty() || entity_id.contains(['/', '\\']) || entity_id.contains("..") {
            return Err(BoardError::Config(format!(
                "entity id {:?} cannot name a snapshot file",
                entity_id
            )));
        }
        let path = dir.join(format!("{}.json", entity_id));
        if !path.exists() {
            debug!(path = %path.display(), "no drill-down snapshot");
            return Ok(Value::Null);
        }
        Self::read(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_snapshot_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let top = dir.path().join("top.json");
        std::fs::write(&top, json!({ "query_result": { "data": { "rows": [] } } }).to_string()).unwrap();
        let children = dir.path().join("children");
        std::fs::create_dir(&children).unwrap();
        std::fs::write(children.join("A.json"), json!({ "ok": true }).to_string()).unwrap();

        let source = SnapshotSource::new(top.clone(), Some(children));
        assert!(source.fetch_top_level().await.unwrap().get("query_result").is_some());
        assert_eq!(source.fetch_children("A").await.unwrap(), json!({ "ok": true }));
        assert_eq!(source.fetch_children("B").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_snapshot_children_stay_inside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let children = dir.path().join("children");
        std::fs::create_dir(&children).unwrap();
        std::fs::write(dir.path().join("x.json"), json!({ "outside": true }).to_string()).unwrap();

        let source = SnapshotSource::new(dir.path().join("top.json"), Some(children));
        for id in ["../x", "a/b", "a\\b", ".."] {
            let err = source.fetch_children(id).await.unwrap_err();
            assert!(matches!(err, BoardError::Config(_)), "{id}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_source_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let top = dir.path().join("top.json");
        std::fs::write(&top, "{ not json").unwrap();
        let err = SnapshotSource::new(top.clone(), None).fetch_top_level().await.unwrap_err();
        assert!(matches!(err, BoardError::Json(_)));
    }

    #[tokio::test]
    async fn test_http_source_without_drill_down_url() {
        let source = HttpRowSource::new("http://localhost:1/results.json", None, "sc");
        let err = source.fetch_children("A").await.unwrap_err();
        assert!(matches!(err, BoardError::Config(_)));
    }
}
