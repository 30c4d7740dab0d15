//! Table selection workflow
//!
//! A re-entrant bucket → table picker. Each host render calls
//! [`TableSelection::render`] with the user's latest interaction; the
//! returned [`SelectionView`] says what to draw and which table (if any) is
//! chosen.
//!
//! ```text
//!  NoBucket --PickBucket--> BucketChosen --PickTable--> TableChosen
//!                             ^                             |
//!                             +---PickBucket / ClearTable---+
//! ```
//!
//! `Reconnect` returns to `NoBucket` from any stage.

mod types;
mod workflow;

pub use types::{
    LinkedBuckets, SelectOption, SelectionEvent, SelectionState, SelectionView, Stage,
    SELECTED_BUCKET_KEY, SELECTED_TABLE_KEY,
};
pub use workflow::TableSelection;
