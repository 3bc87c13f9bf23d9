//! Identifier types for jobs and dispatched work items.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique name of a recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

/// Identifier of a work item inside one dispatch batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl JobId {
    /// Create a new JobId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl ItemId {
    /// Create a new ItemId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<usize> for ItemId {
    fn from(index: usize) -> Self {
        Self(format!("item-{}", index))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_creation() {
        let job_id = JobId::new("Task1");
        assert_eq!(job_id.as_str(), "Task1");
        assert_eq!(format!("{}", job_id), "Task1");
    }

    #[test]
    fn test_job_id_from_str() {
        let id1: JobId = "backup".into();
        let id2 = JobId::new("backup");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_item_id_from_index() {
        let id: ItemId = 7usize.into();
        assert_eq!(id.as_str(), "item-7");
    }

    #[test]
    fn test_ids_are_hashable() {
        use std::collections::HashSet;

        let mut ids: HashSet<ItemId> = HashSet::new();
        ids.insert(ItemId::new("a"));
        ids.insert(ItemId::new("b"));
        ids.insert(ItemId::new("a"));

        assert_eq!(ids.len(), 2);
    }
}
