use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::NormalizedLog;

/// A previously seen log, linked to the ticket it was filed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredLog {
    pub id: Uuid,
    pub jira_id: String,
    pub flow_code: Option<String>,
    pub trigger_type: Option<String>,
    pub error_code: Option<String>,
    pub error_summary: Option<String>,
    pub normalized_json: Value,
    pub embedding: Vec<f32>,
    pub ingested_at: DateTime<Utc>,
}

impl StoredLog {
    pub fn new(jira_id: &str, normalized: &NormalizedLog, embedding: Vec<f32>) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            jira_id: jira_id.to_string(),
            flow_code: normalized.flow_code.clone(),
            trigger_type: normalized.trigger_type.clone(),
            error_code: normalized.error_code.clone(),
            error_summary: normalized.error_summary.clone(),
            normalized_json: serde_json::to_value(normalized)?,
            embedding,
            ingested_at: Utc::now(),
        })
    }
}

/// Raw search result. `similarity_score` carries the cosine *distance*
/// (0 = identical direction, 2 = opposite), the way vector databases report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub jira_id: String,
    #[serde(default)]
    pub similarity_score: Option<f64>,
    pub flow_code: Option<String>,
    pub trigger_type: Option<String>,
    pub error_code: Option<String>,
    pub error_summary: Option<String>,
    #[serde(default)]
    pub normalized_json: Option<Value>,
}

/// The corpus of known logs, searchable by embedding.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Top `limit` entries ordered by ascending cosine distance.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>>;

    async fn insert(&self, log: StoredLog) -> Result<()>;

    fn entry_count(&self) -> usize;
}

/// In-memory vector store with disk persistence and cosine distance search.
pub struct VectorStore {
    entries: RwLock<Vec<StoredLog>>,
    persist_path: PathBuf,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("logs.json");

        let entries = if persist_path.exists() {
            let data =
                std::fs::read_to_string(&persist_path).context("Failed to read vector store")?;
            serde_json::from_str(&data).context("Failed to parse vector store")?
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    /// Add a log and persist the whole corpus (atomic write via temp file + rename).
    /// The entry only becomes searchable once it is on disk; a failed write
    /// leaves the store as it was.
    pub fn add(&self, log: StoredLog) -> Result<()> {
        let mut entries = self.entries.write();

        let next: Vec<&StoredLog> = entries.iter().chain(std::iter::once(&log)).collect();
        let data = serde_json::to_string(&next)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace vector store")?;

        entries.push(log);
        Ok(())
    }

    /// Nearest entries by cosine distance, closest first.
    pub fn nearest(&self, query_embedding: &[f32], limit: usize) -> Vec<VectorHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &StoredLog)> = entries
            .iter()
            .map(|e| (cosine_distance(query_embedding, &e.embedding), e))
            .collect();

        // Ascending distance; stable so equal distances keep insertion order
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(distance, e)| VectorHit {
                jira_id: e.jira_id.clone(),
                similarity_score: Some(distance as f64),
                flow_code: e.flow_code.clone(),
                trigger_type: e.trigger_type.clone(),
                error_code: e.error_code.clone(),
                error_summary: e.error_summary.clone(),
                normalized_json: Some(e.normalized_json.clone()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl VectorSearch for VectorStore {
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        Ok(self.nearest(query_embedding, limit))
    }

    async fn insert(&self, log: StoredLog) -> Result<()> {
        self.add(log)
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

/// Cosine distance in [0, 2]. Mismatched or degenerate vectors get the
/// neutral distance 1.0.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        1.0
    } else {
        1.0 - dot / denom
    }
}
