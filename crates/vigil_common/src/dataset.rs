//! Collected diagnostic data from one target.

use crate::command::CommandResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which collection path produced the dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMethod {
    /// Bundled script ran on the target and produced an archive
    ScriptArchive,
    /// Per-command fallback iteration
    CommandTable,
}

/// One category's outcome: either the command result or the error that
/// prevented it. Per-category failures are data, not exceptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "value")]
pub enum CategoryResult {
    Ok(CommandResult),
    Error(String),
}

impl CategoryResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CategoryResult::Ok(_))
    }

    /// Stdout of a successful result, if any.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            CategoryResult::Ok(r) => Some(&r.stdout),
            CategoryResult::Error(_) => None,
        }
    }
}

/// Category-keyed diagnostic data for one target. Built incrementally
/// by the collection strategy, immutable once handed to the pipeline.
/// BTreeMap keeps serialization and rule iteration deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedDataset {
    pub target_id: Uuid,
    pub hostname: String,
    pub collected_at: DateTime<Utc>,
    pub method: CollectionMethod,
    pub categories: BTreeMap<String, CategoryResult>,
}

impl CollectedDataset {
    pub fn new(target_id: Uuid, hostname: impl Into<String>, method: CollectionMethod) -> Self {
        Self {
            target_id,
            hostname: hostname.into(),
            collected_at: Utc::now(),
            method,
            categories: BTreeMap::new(),
        }
    }

    pub fn insert_ok(&mut self, category: impl Into<String>, result: CommandResult) {
        self.categories
            .insert(category.into(), CategoryResult::Ok(result));
    }

    pub fn insert_error(&mut self, category: impl Into<String>, error: impl Into<String>) {
        self.categories
            .insert(category.into(), CategoryResult::Error(error.into()));
    }

    pub fn get(&self, category: &str) -> Option<&CategoryResult> {
        self.categories.get(category)
    }

    /// Stdout for a category that collected successfully.
    pub fn stdout(&self, category: &str) -> Option<&str> {
        self.categories.get(category).and_then(|c| c.stdout())
    }

    pub fn error_count(&self) -> usize {
        self.categories.values().filter(|c| !c.is_ok()).count()
    }
}
