//! Built-in reference implementations of the tabular operations the spec
//! treats as opaque collaborators (spec §1 "deliberately out of scope").
//! These exist so the Workflow Executor has something real to dispatch
//! to; a production deployment would register additional handlers here
//! without touching the Executor.

pub mod error;
pub mod excel;
pub mod normalization;
pub mod search;
pub mod sql;
pub mod table;

pub use error::OperationError;
pub use table::Table;

use crate::registry::schema::{ArgSchema, ArgSpec, ArgType, InputKind, OutputKind};
use crate::registry::OperationEntry;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Result of invoking an operation handler: either a table (to be
/// serialized as CSV by the Executor) or freestanding text.
pub enum OperationOutput {
    Table(Table),
    Text(String),
}

impl OperationOutput {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            OperationOutput::Table(table) => table.to_csv_bytes(),
            OperationOutput::Text(text) => text.into_bytes(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OperationOutput::Table(_) => "csv",
            OperationOutput::Text(_) => "txt",
        }
    }
}

/// A progress sink the Executor hands to a running handler. Handlers call
/// `report` at their own cadence; the Executor is responsible for
/// coalescing ticks into WebSocket events (spec §4.7).
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: u8);
}

pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _progress: u8) {}
}

pub trait OperationHandler: Send + Sync {
    fn invoke(
        &self,
        table: &Table,
        args: &BTreeMap<String, JsonValue>,
        progress: &dyn ProgressSink,
    ) -> Result<OperationOutput, OperationError>;
}

pub fn built_in_entries() -> Vec<OperationEntry> {
    vec![
        OperationEntry {
            operation_id: "excel/extract-columns-to-file",
            handler: Box::new(excel::ExtractColumnsToFile),
            arg_schema: ArgSchema::new(&[
                ArgSpec {
                    name: "columns",
                    arg_type: ArgType::StringList,
                    required: true,
                },
                ArgSpec {
                    name: "remove_duplicates",
                    arg_type: ArgType::Bool,
                    required: false,
                },
            ]),
            input_kind: InputKind::Table,
            output_kind: OutputKind::File,
        },
        OperationEntry {
            operation_id: "sql/generate-to-text",
            handler: Box::new(sql::GenerateToText),
            arg_schema: ArgSchema::new(&[
                ArgSpec {
                    name: "table_name",
                    arg_type: ArgType::String,
                    required: true,
                },
            ]),
            input_kind: InputKind::Table,
            output_kind: OutputKind::File,
        },
        OperationEntry {
            operation_id: "normalization/apply",
            handler: Box::new(normalization::Apply),
            arg_schema: ArgSchema::new(&[ArgSpec {
                name: "columns",
                arg_type: ArgType::StringList,
                required: true,
            }]),
            input_kind: InputKind::Table,
            output_kind: OutputKind::Both,
        },
        OperationEntry {
            operation_id: "search/filter-rows",
            handler: Box::new(search::FilterRows),
            arg_schema: ArgSchema::new(&[
                ArgSpec {
                    name: "column",
                    arg_type: ArgType::String,
                    required: true,
                },
                ArgSpec {
                    name: "contains",
                    arg_type: ArgType::String,
                    required: true,
                },
            ]),
            input_kind: InputKind::Table,
            output_kind: OutputKind::Both,
        },
    ]
}
