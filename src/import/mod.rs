//! Import merge engine: reconciling snapshot documents into the store.

mod merge;

pub use merge::{import_document, merge_settings, ImportResult};
