use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, SchemaSourceError};
use crate::menu::Menu;
use crate::record::Record;
use crate::schema::Schema;

/// One page of records as returned by [`EntityGateway::list`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Records on the requested page.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Number of records in the whole table.
    #[serde(default)]
    pub total_records: u64,
}

/// Generic, table-name-parameterized read/write service boundary.
///
/// Implementations: HTTP (reqwest), memory (tests and demos).
/// Used as `Arc<dyn EntityGateway>`.
#[async_trait]
pub trait EntityGateway: Send + Sync {
    /// Find records of `table` whose `name` matches `text`.
    /// Answers with a single record or an array of records.
    async fn lookup_by_name(&self, table: &str, text: &str) -> Result<Value, GatewayError>;

    /// Create a record. Returns the created record as sent back by storage.
    async fn create(&self, table: &str, payload: &Record) -> Result<Value, GatewayError>;

    /// Replace the record identified by `id`.
    async fn update(&self, table: &str, id: &str, payload: &Record) -> Result<Value, GatewayError>;

    /// Load one record by identifier.
    async fn get_by_id(&self, table: &str, id: &str) -> Result<Record, GatewayError>;

    /// Load one page of records. `page` is 1-based.
    async fn list(&self, table: &str, page: u32, page_size: u32)
        -> Result<PageResult, GatewayError>;

    /// Delete the record identified by `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<(), GatewayError>;
}

/// Supplier of schema and menu documents.
/// Used as `Arc<dyn SchemaSource>`.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Load the schema document at `path` (e.g. `schemas/customer.json`).
    async fn load_schema(&self, path: &str) -> Result<Schema, SchemaSourceError>;

    /// Load the menu document mapping display names to schema fragments.
    async fn load_menu(&self) -> Result<Menu, SchemaSourceError>;
}

/// Blocking yes/no prompt shown before destructive row actions.
pub trait ConfirmPrompt: Send + Sync {
    /// Asks `question`; `true` means the user confirmed.
    fn confirm(&self, question: &str) -> bool;
}

/// Prompt with a fixed answer, for scripted use (`--yes`) and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmPrompt for FixedAnswer {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}
