//! In-memory collaborators for tests and offline runs.
//!
//! [`MemoryEntityGateway`] keeps one insertion-ordered vector of records per
//! table behind a `DashMap`, counts calls per operation and supports injected
//! delays and failures. [`MemorySchemaSource`] serves schemas registered by
//! path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use schemaform_core::{
    EntityGateway, GatewayError, Menu, PageResult, Record, Schema, SchemaSource,
    SchemaSourceError,
};

/// Operation kinds of an [`EntityGateway`], used for counting and failure
/// injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    Lookup,
    Create,
    Update,
    GetById,
    List,
    Delete,
}

impl GatewayCall {
    fn method(self) -> &'static str {
        match self {
            Self::Lookup | Self::GetById | Self::List => "GET",
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A create or update the gateway accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteLog {
    pub call: GatewayCall,
    pub table: String,
    pub id: String,
    pub payload: Record,
}

#[derive(Default)]
pub struct MemoryEntityGateway {
    tables: DashMap<String, Vec<Record>>,
    next_id: AtomicU64,
    calls: DashMap<GatewayCall, u64>,
    delays: DashMap<GatewayCall, Duration>,
    lookup_delays: DashMap<String, Duration>,
    failing: DashSet<GatewayCall>,
    writes: Mutex<Vec<WriteLog>>,
}

impl MemoryEntityGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Stores `record` in `table` without counting a call. A record without
    /// an `id` gets the next numeric one. Returns the identifier.
    pub fn insert(&self, table: &str, mut record: Record) -> String {
        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                record.set("id", id);
                id.to_string()
            }
        };
        self.tables.entry(table.to_string()).or_default().push(record);
        id
    }

    /// Snapshot of `table` in insertion order.
    #[must_use]
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .get(table)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    /// Number of times `call` was invoked, including failed invocations.
    #[must_use]
    pub fn calls(&self, call: GatewayCall) -> u64 {
        self.calls.get(&call).map_or(0, |count| *count)
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    /// Accepted writes, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteLog> {
        self.writes.lock().clone()
    }

    /// Makes every `call` wait `delay` before answering.
    pub fn set_delay(&self, call: GatewayCall, delay: Duration) {
        self.delays.insert(call, delay);
    }

    /// Makes lookups for exactly `text` wait `delay`. Overrides the
    /// per-call lookup delay.
    pub fn set_lookup_delay(&self, text: &str, delay: Duration) {
        self.lookup_delays.insert(text.to_string(), delay);
    }

    /// Makes every `call` answer with a 500 status until [`Self::recover`].
    pub fn fail(&self, call: GatewayCall) {
        self.failing.insert(call);
    }

    pub fn recover(&self, call: GatewayCall) {
        self.failing.remove(&call);
    }

    async fn enter(
        &self,
        call: GatewayCall,
        table: &str,
        delay: Option<Duration>,
    ) -> Result<(), GatewayError> {
        *self.calls.entry(call).or_insert(0) += 1;

        let delay = delay.or_else(|| self.delays.get(&call).map(|d| *d));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(&call) {
            debug!(?call, table, "injected gateway failure");
            return Err(GatewayError::Status {
                method: call.method(),
                url: format!("memory://{table}"),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn not_found(table: &str, id: &str) -> GatewayError {
        GatewayError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl EntityGateway for MemoryEntityGateway {
    async fn lookup_by_name(&self, table: &str, text: &str) -> Result<Value, GatewayError> {
        let delay = self.lookup_delays.get(text).map(|d| *d);
        self.enter(GatewayCall::Lookup, table, delay).await?;

        let needle = text.to_lowercase();
        let mut matches: Vec<Value> = self
            .records(table)
            .into_iter()
            .filter(|record| record.text("name").to_lowercase().contains(&needle))
            .map(Value::from)
            .collect();

        Ok(if matches.len() == 1 {
            matches.remove(0)
        } else {
            Value::Array(matches)
        })
    }

    async fn create(&self, table: &str, payload: &Record) -> Result<Value, GatewayError> {
        self.enter(GatewayCall::Create, table, None).await?;

        let mut record = payload.clone();
        record.remove("id");
        let id = self.insert(table, record);
        self.writes.lock().push(WriteLog {
            call: GatewayCall::Create,
            table: table.to_string(),
            id: id.clone(),
            payload: payload.clone(),
        });

        let stored = self
            .records(table)
            .into_iter()
            .find(|r| r.id().as_deref() == Some(id.as_str()))
            .ok_or_else(|| Self::not_found(table, &id))?;
        Ok(stored.into())
    }

    async fn update(&self, table: &str, id: &str, payload: &Record) -> Result<Value, GatewayError> {
        self.enter(GatewayCall::Update, table, None).await?;

        let updated = {
            let mut rows = self
                .tables
                .get_mut(table)
                .ok_or_else(|| Self::not_found(table, id))?;
            let row = rows
                .iter_mut()
                .find(|r| r.id().as_deref() == Some(id))
                .ok_or_else(|| Self::not_found(table, id))?;
            for (key, value) in payload.iter().filter(|(key, _)| *key != "id") {
                row.set(key, value.clone());
            }
            row.clone()
        };

        self.writes.lock().push(WriteLog {
            call: GatewayCall::Update,
            table: table.to_string(),
            id: id.to_string(),
            payload: payload.clone(),
        });
        Ok(updated.into())
    }

    async fn get_by_id(&self, table: &str, id: &str) -> Result<Record, GatewayError> {
        self.enter(GatewayCall::GetById, table, None).await?;
        self.records(table)
            .into_iter()
            .find(|r| r.id().as_deref() == Some(id))
            .ok_or_else(|| Self::not_found(table, id))
    }

    async fn list(&self, table: &str, page: u32, page_size: u32) -> Result<PageResult, GatewayError> {
        self.enter(GatewayCall::List, table, None).await?;

        let rows = self.records(table);
        let skip = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        Ok(PageResult {
            total_records: rows.len() as u64,
            records: rows.into_iter().skip(skip).take(page_size as usize).collect(),
        })
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), GatewayError> {
        self.enter(GatewayCall::Delete, table, None).await?;

        let mut rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::not_found(table, id))?;
        let before = rows.len();
        rows.retain(|r| r.id().as_deref() != Some(id));
        if rows.len() == before {
            return Err(Self::not_found(table, id));
        }
        Ok(())
    }
}

/// Schemas and a menu held in memory.
#[derive(Default)]
pub struct MemorySchemaSource {
    schemas: DashMap<String, Schema>,
    menu: Mutex<Menu>,
    delay: Mutex<Option<Duration>>,
    loads: AtomicU64,
}

impl MemorySchemaSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_schema(self, path: &str, schema: Schema) -> Self {
        self.schemas.insert(path.to_string(), schema);
        self
    }

    #[must_use]
    pub fn with_menu(self, menu: Menu) -> Self {
        *self.menu.lock() = menu;
        self
    }

    /// Makes every schema load wait `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of `load_schema` calls so far.
    #[must_use]
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SchemaSource for MemorySchemaSource {
    async fn load_schema(&self, path: &str) -> Result<Schema, SchemaSourceError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.schemas
            .get(path)
            .map(|schema| schema.value().clone())
            .ok_or_else(|| SchemaSourceError::Fetch {
                path: path.to_string(),
                reason: "no such schema".to_string(),
            })
    }

    async fn load_menu(&self) -> Result<Menu, SchemaSourceError> {
        Ok(self.menu.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use schemaform_core::total_pages_for;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).expect("object")
    }

    #[tokio::test]
    async fn lookup_returns_single_record_or_array() {
        let gateway = MemoryEntityGateway::new();
        gateway.insert("customer", record(json!({ "name": "Acme" })));
        gateway.insert("customer", record(json!({ "name": "Apex" })));

        let one = gateway.lookup_by_name("customer", "ac").await.expect("lookup");
        assert_eq!(one["name"], "Acme");

        let many = gateway.lookup_by_name("customer", "A").await.expect("lookup");
        assert_eq!(many.as_array().map(Vec::len), Some(2));

        let none = gateway.lookup_by_name("customer", "zzz").await.expect("lookup");
        assert_eq!(none, json!([]));
        assert_eq!(gateway.calls(GatewayCall::Lookup), 3);
    }

    #[tokio::test]
    async fn create_assigns_ids_and_lists_in_pages() {
        let gateway = MemoryEntityGateway::new();
        for name in ["a", "b", "c"] {
            let mut payload = Record::new();
            payload.set("name", name);
            gateway.create("customer", &payload).await.expect("create");
        }

        let page = gateway.list("customer", 2, 2).await.expect("list");
        assert_eq!(page.total_records, 3);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].text("name"), "c");
        assert_eq!(page.records[0].id().as_deref(), Some("3"));
        assert_eq!(gateway.writes().len(), 3);
    }

    #[tokio::test]
    async fn update_merges_and_delete_removes() {
        let gateway = MemoryEntityGateway::new();
        let id = gateway.insert("customer", record(json!({ "name": "Bob", "email": "b@x.com" })));

        let mut patch = Record::new();
        patch.set("email", "bob@x.com");
        gateway.update("customer", &id, &patch).await.expect("update");
        let stored = gateway.get_by_id("customer", &id).await.expect("get");
        assert_eq!(stored.text("name"), "Bob");
        assert_eq!(stored.text("email"), "bob@x.com");

        gateway.delete("customer", &id).await.expect("delete");
        assert!(matches!(
            gateway.get_by_id("customer", &id).await,
            Err(GatewayError::NotFound { .. })
        ));
        assert!(gateway.delete("customer", &id).await.is_err());
    }

    #[tokio::test]
    async fn injected_failure_counts_the_call() {
        let gateway = MemoryEntityGateway::new();
        gateway.fail(GatewayCall::List);
        let err = gateway.list("customer", 1, 2).await.expect_err("injected");
        assert!(matches!(err, GatewayError::Status { status: 500, .. }));
        assert_eq!(gateway.calls(GatewayCall::List), 1);

        gateway.recover(GatewayCall::List);
        assert!(gateway.list("customer", 1, 2).await.is_ok());
    }

    proptest! {
        #[test]
        fn pages_partition_the_table(count in 0usize..30, page_size in 1u32..6) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("runtime");
            let gateway = MemoryEntityGateway::new();
            for i in 0..count {
                gateway.insert("t", record(json!({ "name": format!("r{i}") })));
            }

            let pages = total_pages_for(count as u64, page_size);
            let mut seen = Vec::new();
            for page in 1..=pages {
                let result = runtime
                    .block_on(gateway.list("t", page, page_size))
                    .expect("list");
                prop_assert_eq!(result.total_records, count as u64);
                prop_assert!(result.records.len() <= page_size as usize);
                seen.extend(result.records.into_iter().map(|r| r.text("name")));
            }
            let expected: Vec<String> = (0..count).map(|i| format!("r{i}")).collect();
            prop_assert_eq!(seen, expected);
        }
    }

    #[tokio::test]
    async fn schema_source_serves_registered_paths() {
        let source = MemorySchemaSource::new().with_schema("schemas/customer.json", Schema::default());
        assert!(source.load_schema("schemas/customer.json").await.is_ok());
        assert!(matches!(
            source.load_schema("schemas/missing.json").await,
            Err(SchemaSourceError::Fetch { .. })
        ));
        assert_eq!(source.loads(), 2);
        assert!(source.load_menu().await.expect("menu").is_empty());
    }
}
