/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

pub mod arg_parser;
pub mod cleaner;
pub mod collate;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod io;
pub mod manifest;
pub mod pipeline;
pub mod reconciler;
pub mod relations;
pub mod schema;
pub mod windows;

mod tests;

pub use cleaner::{RecordCleaner, TieBreak};
pub use error::{DataError, Result};
pub use pipeline::{AnnouncementPipeline, PipelineOutput};
pub use reconciler::{KeyReconciler, ReconcileColumns, Reconciliation};
