use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::words::{Word, WordKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub string: String,
    #[serde(rename = "type")]
    pub kind: WordKind,
}

impl From<&Word> for QueryRecord {
    fn from(word: &Word) -> Self {
        Self {
            string: word.text.clone(),
            kind: word.kind(),
        }
    }
}

pub fn to_records(queries: &[Word]) -> Vec<QueryRecord> {
    queries.iter().map(QueryRecord::from).collect()
}

pub fn to_yaml(queries: &[Word]) -> Result<String> {
    serde_yaml::to_string(&to_records(queries)).with_context(|| "failed to serialize queries")
}

/// Writes the queries as UTF-8 YAML, replacing any existing file.
pub fn write_queries(path: &Path, queries: &[Word]) -> Result<()> {
    let yaml = to_yaml(queries)?;
    fs::write(path, yaml).with_context(|| format!("failed to write output: {}", path.display()))
}

pub fn read_queries(path: &Path) -> Result<Vec<QueryRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read output: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse output: {}", path.display()))
}
