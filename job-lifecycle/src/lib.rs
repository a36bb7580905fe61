#![allow(clippy::missing_docs_in_private_items)]

pub mod lifecycle;

pub use lifecycle::{CancelSummary, JobLifecycleManager, SubmitJobRequest};
