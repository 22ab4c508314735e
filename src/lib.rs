//! HCP task events - Converts E-Prime behavioral logs into event tables
//!
//! Each HCP task-fMRI run leaves a tab-separated E-Prime export. This crate
//! turns one run's log into a long-format table of timed events through a
//! deterministic pipeline: record parsing → block labeling → trial emission
//! → block synthesis → normalization → encoding.
//!
//! ## Tasks
//!
//! EMOTION, GAMBLING, LANGUAGE, MOTOR, RELATIONAL, SOCIAL and WM each get a
//! dedicated converter in [`tasks`]. The [`prep`] module derives GLM design
//! events from a converted table.

pub mod config;
pub mod encoder;
pub mod error;
pub mod labeler;
pub mod normalizer;
pub mod pipeline;
pub mod prep;
pub mod schema;
pub mod tasks;
pub mod types;

pub use config::ConvertOptions;
pub use encoder::EventsEncoder;
pub use error::{ConvertError, Diagnostics, RecordIssue};
pub use labeler::{label_blocks, BlockLabel};
pub use pipeline::{convert_records, convert_tsv, Conversion, EventConverter};
pub use prep::{prepare, DesignEvent, ModelKind};
pub use tasks::TaskConverter;
pub use types::{Cell, Column, Event, EventRow, EventTable, Task};

// Schema exports
pub use schema::{FieldValue, RawRecord, RecordAdapter};

/// Crate version embedded in every events document
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for events documents
pub const PRODUCER_NAME: &str = "hcp-taskevents";
