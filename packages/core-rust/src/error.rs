//! Error types shared by the engine and its collaborators.

/// Errors returned by an [`EntityGateway`](crate::EntityGateway).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{method} {url} returned status {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("record {id} not found in {table}")]
    NotFound { table: String, id: String },
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Errors returned by a [`SchemaSource`](crate::SchemaSource).
#[derive(Debug, thiserror::Error)]
pub enum SchemaSourceError {
    #[error("failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures surfaced by the form and list renderers.
///
/// Schema and record load failures are recovered locally (logged, state left
/// empty); they appear here so callers that want to know can inspect them.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("schema {path} could not be loaded: {reason}")]
    SchemaLoad { path: String, reason: String },
    #[error("record {id} of {table} could not be loaded: {source}")]
    RecordLoad {
        table: String,
        id: String,
        #[source]
        source: GatewayError,
    },
    #[error("required fields are empty: {}", fields.join(", "))]
    Validation { fields: Vec<String> },
    #[error("saving to {table} failed: {source}")]
    Submit {
        table: String,
        #[source]
        source: GatewayError,
    },
    #[error("deleting record {id} of {table} failed: {source}")]
    Delete {
        table: String,
        id: String,
        #[source]
        source: GatewayError,
    },
    #[error("no form is open")]
    NoOpenForm,
    #[error("the schema is not loaded")]
    SchemaNotLoaded,
}
