//! `schemaform` Client: async form and list renderers over an entity gateway,
//! with HTTP and in-memory collaborators and a terminal presentation.

pub mod config;
pub mod form_renderer;
pub mod http;
pub mod list_renderer;
pub mod logging;
pub mod memory;
pub mod render;
pub mod schema_source;

pub use config::{ClientConfig, ConfigError, SchemaLocation};
pub use form_renderer::FormRenderer;
pub use http::HttpEntityGateway;
pub use list_renderer::{DeleteOutcome, ListRenderer};
pub use memory::{GatewayCall, MemoryEntityGateway, MemorySchemaSource};
pub use schema_source::{schema_source_from_config, FileSchemaSource, HttpSchemaSource};
