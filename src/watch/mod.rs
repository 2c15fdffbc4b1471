//! Change notification for namespace content.
//!
//! The synchronizer publishes one [`ChangeEvent`] per installed namespace
//! update (or per failed fetch); [`WatchHub`] fans it out to global and
//! per-namespace [`Subscription`]s without ever waiting for a slow consumer.

mod hub;
pub use hub::*;


use std::sync::Arc;

use crate::Error;
use crate::KeyValues;

/// Content change of one namespace
///
/// Shared by every subscriber that receives it.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub namespace: String,
    pub old_value: Arc<KeyValues>,
    pub new_value: Arc<KeyValues>,
    /// Set when the fetch triggered by a notification failed; the values are
    /// then both the unchanged current content.
    pub error: Option<Arc<Error>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// Per-key difference between the old and new content of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

impl ChangeEvent {
    pub fn new(
        namespace: impl Into<String>,
        old_value: Arc<KeyValues>,
        new_value: Arc<KeyValues>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            old_value,
            new_value,
            error: None,
        }
    }

    /// Event carrying a fetch failure; content is reported unchanged.
    pub fn failed(
        namespace: impl Into<String>,
        current: Arc<KeyValues>,
        error: Arc<Error>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            old_value: current.clone(),
            new_value: current,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Added, modified and deleted keys, sorted by key.
    pub fn changes(&self) -> Vec<ConfigChange> {
        let mut changes: Vec<ConfigChange> = self
            .new_value
            .iter()
            .filter_map(|(key, new)| match self.old_value.get(key) {
                None => Some(ConfigChange {
                    key: key.clone(),
                    old_value: None,
                    new_value: Some(new.clone()),
                    change_type: ChangeType::Added,
                }),
                Some(old) if old != new => Some(ConfigChange {
                    key: key.clone(),
                    old_value: Some(old.clone()),
                    new_value: Some(new.clone()),
                    change_type: ChangeType::Modified,
                }),
                Some(_) => None,
            })
            .collect();

        changes.extend(
            self.old_value
                .iter()
                .filter(|(key, _)| !self.new_value.contains_key(*key))
                .map(|(key, old)| ConfigChange {
                    key: key.clone(),
                    old_value: Some(old.clone()),
                    new_value: None,
                    change_type: ChangeType::Deleted,
                }),
        );

        changes.sort_by(|a, b| a.key.cmp(&b.key));
        changes
    }
}
