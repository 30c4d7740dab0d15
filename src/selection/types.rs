//! Types for the table picker

use crate::storage::{table_in_bucket, BucketDescriptor, TableDescriptor};
use crate::types::{Placement, UserMessage};
use serde::{Deserialize, Serialize};

/// Session key holding the chosen bucket id
pub const SELECTED_BUCKET_KEY: &str = "selected_bucket";
/// Session key holding the chosen, fully qualified table id
pub const SELECTED_TABLE_KEY: &str = "selected_table_id";

/// Which buckets the picker offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkedBuckets {
    /// Own and linked buckets
    #[default]
    Include,
    /// Own buckets only
    Exclude,
    /// Linked buckets only
    Only,
}

impl LinkedBuckets {
    pub fn admits(self, bucket: &BucketDescriptor) -> bool {
        match self {
            Self::Include => true,
            Self::Exclude => !bucket.linked,
            Self::Only => bucket.linked,
        }
    }
}

/// User interaction driving a render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "id", rename_all = "snake_case")]
pub enum SelectionEvent {
    /// Plain re-render
    Refresh,
    /// Drop the selection and start over
    Reconnect,
    PickBucket(String),
    PickTable(String),
    ClearTable,
}

/// What the session remembers between renders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionState {
    pub bucket_id: Option<String>,
    /// Fully qualified; always inside `bucket_id`
    pub table_id: Option<String>,
}

impl SelectionState {
    /// State with the table dropped if it does not belong to the bucket
    pub fn normalized(self) -> Self {
        let bucket_id = self.bucket_id.filter(|b| !b.is_empty());
        let table_id = match bucket_id {
            Some(ref bucket) => self
                .table_id
                .filter(|t| table_in_bucket(t, bucket)),
            None => None,
        };
        Self {
            bucket_id,
            table_id,
        }
    }

    pub fn stage(&self) -> Stage {
        match (&self.bucket_id, &self.table_id) {
            (None, _) => Stage::NoBucket,
            (Some(_), None) => Stage::BucketChosen,
            (Some(_), Some(_)) => Stage::TableChosen,
        }
    }
}

/// Picker stage, derived from [`SelectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NoBucket,
    BucketChosen,
    TableChosen,
}

/// One entry of a select box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl From<&BucketDescriptor> for SelectOption {
    fn from(bucket: &BucketDescriptor) -> Self {
        Self {
            value: bucket.id.clone(),
            label: bucket.label().to_string(),
        }
    }
}

impl From<&TableDescriptor> for SelectOption {
    fn from(table: &TableDescriptor) -> Self {
        Self {
            value: table.qualified_id(),
            label: table.label().to_string(),
        }
    }
}

/// Everything the host needs to draw the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionView {
    pub placement: Placement,
    pub stage: Stage,
    pub buckets: Vec<SelectOption>,
    /// Empty until a bucket is chosen
    pub tables: Vec<SelectOption>,
    pub state: SelectionState,
    /// Fully qualified id of the chosen table
    pub resolved_table: Option<String>,
    pub messages: Vec<UserMessage>,
    /// A newer render started first; this view is outdated and changed nothing
    pub superseded: bool,
}

impl SelectionView {
    pub(crate) fn new(placement: Placement, state: SelectionState) -> Self {
        Self {
            placement,
            stage: state.stage(),
            buckets: Vec::new(),
            tables: Vec::new(),
            resolved_table: state.table_id.clone(),
            state,
            messages: Vec::new(),
            superseded: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(UserMessage::is_error)
    }
}
