//! Bucket then table picker
//!
//! A render reads the [`SelectionState`] from the session, fetches the
//! lists it needs, applies one [`SelectionEvent`] and commits the new state.
//! The workflow object holds configuration only; all state lives in the
//! session so the host can re-run the render from scratch on every
//! interaction.

use super::types::{
    LinkedBuckets, SelectOption, SelectionEvent, SelectionState, SelectionView,
    SELECTED_BUCKET_KEY, SELECTED_TABLE_KEY,
};
use crate::config::SelectionConfig;
use crate::error::Result;
use crate::session::SessionStore;
use crate::storage::{BucketDescriptor, StorageCatalog, TableDescriptor};
use crate::types::{Placement, UserMessage};
use serde_json::Value;
use tracing::{debug, warn};

/// The table picker
#[derive(Debug, Clone, Copy, Default)]
pub struct TableSelection {
    placement: Placement,
    linked: LinkedBuckets,
}

impl TableSelection {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            placement: config.placement,
            linked: config.linked,
        }
    }

    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub fn with_linked(mut self, linked: LinkedBuckets) -> Self {
        self.linked = linked;
        self
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Selection currently stored in the session
    ///
    /// Malformed values are treated as unset.
    pub async fn current_state(session: &SessionStore) -> SelectionState {
        Self::stored_state(session).await.normalized()
    }

    async fn stored_state(session: &SessionStore) -> SelectionState {
        let bucket_id = session
            .get_as::<String>(SELECTED_BUCKET_KEY)
            .await
            .ok()
            .flatten();
        let table_id = session
            .get_as::<String>(SELECTED_TABLE_KEY)
            .await
            .ok()
            .flatten();
        SelectionState {
            bucket_id,
            table_id,
        }
    }

    /// Run one render of the picker
    ///
    /// Listing failures become error messages in the view and leave the
    /// stored selection untouched. Only session persistence errors are
    /// returned as `Err`.
    pub async fn render(
        &self,
        catalog: &dyn StorageCatalog,
        session: &SessionStore,
        event: SelectionEvent,
    ) -> Result<SelectionView> {
        let generation = session.begin_render().await;
        let stored = Self::stored_state(session).await;
        let current = stored.clone().normalized();
        debug!(generation, ?event, ?current, "Rendering table selection");

        let mut view = SelectionView::new(self.placement, current.clone());

        let buckets = match catalog.list_buckets().await {
            Ok(buckets) => self.offered_buckets(buckets),
            Err(e) => {
                warn!(error = %e, "Could not list buckets");
                view.messages
                    .push(UserMessage::error(format!("Could not list buckets: {e}")));
                return Ok(view);
            }
        };
        view.buckets = buckets.iter().map(SelectOption::from).collect();

        let mut next = match event {
            SelectionEvent::Reconnect => SelectionState::default(),
            _ => current.clone(),
        };

        match &event {
            SelectionEvent::PickBucket(id) => {
                if buckets.iter().any(|b| &b.id == id) {
                    next.bucket_id = Some(id.clone());
                    next.table_id = None;
                } else {
                    view.messages
                        .push(UserMessage::warning(format!("Bucket '{id}' is not available")));
                }
            }
            SelectionEvent::ClearTable => next.table_id = None,
            _ => {}
        }

        if let Some(bucket_id) = next.bucket_id.clone() {
            if !buckets.iter().any(|b| b.id == bucket_id) {
                view.messages.push(UserMessage::warning(format!(
                    "Bucket '{bucket_id}' is no longer available"
                )));
                next = SelectionState::default();
            }
        }

        match next.bucket_id.clone() {
            None => {
                if let SelectionEvent::PickTable(id) = &event {
                    view.messages.push(UserMessage::warning(format!(
                        "Pick a bucket before picking table '{id}'"
                    )));
                }
            }
            Some(bucket_id) => match catalog.list_tables(&bucket_id).await {
                Ok(tables) => {
                    let tables = sorted_tables(tables);
                    self.apply_table_event(&event, &bucket_id, &tables, &mut next, &mut view);
                    view.tables = tables.iter().map(SelectOption::from).collect();
                }
                Err(e) => {
                    warn!(bucket = %bucket_id, error = %e, "Could not list tables");
                    view.messages
                        .push(UserMessage::error(format!("Could not list tables: {e}")));
                }
            },
        }

        let next = next.normalized();
        let current_render = if next == stored {
            session.generation().await == generation
        } else {
            session
                .commit_if_current(generation, state_updates(&next))
                .await?
        };

        if current_render {
            view.stage = next.stage();
            view.resolved_table = next.table_id.clone();
            view.state = next;
        } else {
            debug!(generation, "Table selection render superseded");
            view.superseded = true;
        }

        Ok(view)
    }

    fn offered_buckets(&self, buckets: Vec<BucketDescriptor>) -> Vec<BucketDescriptor> {
        let mut buckets: Vec<BucketDescriptor> = buckets
            .into_iter()
            .filter(|b| self.linked.admits(b))
            .collect();
        buckets.sort_by(|a, b| a.label().cmp(b.label()).then_with(|| a.id.cmp(&b.id)));
        buckets
    }

    fn apply_table_event(
        &self,
        event: &SelectionEvent,
        bucket_id: &str,
        tables: &[TableDescriptor],
        next: &mut SelectionState,
        view: &mut SelectionView,
    ) {
        if let SelectionEvent::PickTable(id) = event {
            match tables.iter().find(|t| t.matches(id)) {
                Some(table) => next.table_id = Some(table.qualified_id()),
                None => view.messages.push(UserMessage::warning(format!(
                    "Table '{id}' is not in bucket '{bucket_id}'"
                ))),
            }
        }

        if let Some(table_id) = next.table_id.clone() {
            if !tables.iter().any(|t| t.qualified_id() == table_id) {
                view.messages.push(UserMessage::warning(format!(
                    "Table '{table_id}' is no longer available"
                )));
                next.table_id = None;
            }
        }
    }
}

fn sorted_tables(mut tables: Vec<TableDescriptor>) -> Vec<TableDescriptor> {
    tables.sort_by(|a, b| {
        a.label()
            .cmp(b.label())
            .then_with(|| a.qualified_id().cmp(&b.qualified_id()))
    });
    tables
}

fn state_updates(state: &SelectionState) -> Vec<(String, Option<Value>)> {
    vec![
        (
            SELECTED_BUCKET_KEY.to_string(),
            state.bucket_id.clone().map(Value::String),
        ),
        (
            SELECTED_TABLE_KEY.to_string(),
            state.table_id.clone().map(Value::String),
        ),
    ]
}
