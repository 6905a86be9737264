//! Schema and menu document loaders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use schemaform_core::{Menu, Schema, SchemaSource, SchemaSourceError};

use crate::config::{ClientConfig, SchemaLocation};

/// Fetches documents relative to a static web root.
#[derive(Debug, Clone)]
pub struct HttpSchemaSource {
    client: Client,
    root: Url,
    menu_path: String,
}

impl HttpSchemaSource {
    /// `root` is normalized to end with `/` so relative paths resolve under it.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaSourceError::Fetch`] when `root` does not parse.
    pub fn new(
        client: Client,
        root: &str,
        menu_path: impl Into<String>,
    ) -> Result<Self, SchemaSourceError> {
        let normalized = if root.ends_with('/') {
            root.to_string()
        } else {
            format!("{root}/")
        };
        let root = Url::parse(&normalized).map_err(|e| SchemaSourceError::Fetch {
            path: root.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            root,
            menu_path: menu_path.into(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, SchemaSourceError> {
        let fetch_err = |reason: String| SchemaSourceError::Fetch {
            path: path.to_string(),
            reason,
        };

        let url = self
            .root
            .join(path.trim_start_matches('/'))
            .map_err(|e| fetch_err(e.to_string()))?;
        debug!(%url, "fetching schema document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("status {}", status.as_u16())));
        }
        let text = response.text().await.map_err(|e| fetch_err(e.to_string()))?;
        parse(path, &text)
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn load_schema(&self, path: &str) -> Result<Schema, SchemaSourceError> {
        self.fetch(path).await
    }

    async fn load_menu(&self) -> Result<Menu, SchemaSourceError> {
        self.fetch(&self.menu_path).await
    }
}

/// Reads documents from a local directory.
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    root: PathBuf,
    menu_path: String,
}

impl FileSchemaSource {
    pub fn new(root: impl Into<PathBuf>, menu_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            menu_path: menu_path.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read<T: DeserializeOwned>(&self, path: &str) -> Result<T, SchemaSourceError> {
        let file = self.root.join(path.trim_start_matches('/'));
        debug!(file = %file.display(), "reading schema document");
        let text = tokio::fs::read_to_string(&file)
            .await
            .map_err(|source| SchemaSourceError::Io {
                path: path.to_string(),
                source,
            })?;
        parse(path, &text)
    }
}

#[async_trait]
impl SchemaSource for FileSchemaSource {
    async fn load_schema(&self, path: &str) -> Result<Schema, SchemaSourceError> {
        self.read(path).await
    }

    async fn load_menu(&self) -> Result<Menu, SchemaSourceError> {
        self.read(&self.menu_path).await
    }
}

fn parse<T: DeserializeOwned>(path: &str, text: &str) -> Result<T, SchemaSourceError> {
    serde_json::from_str(text).map_err(|source| SchemaSourceError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Picks the source matching the configured location.
///
/// # Errors
///
/// Returns [`SchemaSourceError::Fetch`] when an HTTP root is unusable or the
/// client cannot be built.
pub fn schema_source_from_config(
    config: &ClientConfig,
) -> Result<Arc<dyn SchemaSource>, SchemaSourceError> {
    match &config.schema_location {
        SchemaLocation::Http(root) => {
            let client = Client::builder()
                .timeout(config.request_timeout)
                .danger_accept_invalid_certs(config.accept_invalid_certs)
                .build()
                .map_err(|e| SchemaSourceError::Fetch {
                    path: root.clone(),
                    reason: e.to_string(),
                })?;
            Ok(Arc::new(HttpSchemaSource::new(
                client,
                root,
                config.menu_path.clone(),
            )?))
        }
        SchemaLocation::Directory(dir) => Ok(Arc::new(FileSchemaSource::new(
            dir.clone(),
            config.menu_path.clone(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    const CUSTOMER: &str = r#"[
        { "sectionTitle": "General", "fields": [
            { "name": "name", "label": "Name", "type": "text", "required": true }
        ] }
    ]"#;

    const MENU: &str = r#"{ "Customers": "customer", "Orders": "order" }"#;

    fn write(dir: &Path, rel: &str, body: &str) {
        let file = dir.join(rel);
        std::fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
        std::fs::write(file, body).expect("write");
    }

    #[tokio::test]
    async fn file_source_reads_schema_and_menu() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "schemas/customer.json", CUSTOMER);
        write(dir.path(), "schemas/menu.json", MENU);

        let source = FileSchemaSource::new(dir.path(), "schemas/menu.json");
        assert_eq!(source.root(), dir.path());
        let schema = source
            .load_schema("schemas/customer.json")
            .await
            .expect("schema");
        assert_eq!(schema.sections()[0].section_title, "General");

        let menu = source.load_menu().await.expect("menu");
        let names: Vec<&str> = menu.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Customers", "Orders"]);
    }

    #[tokio::test]
    async fn file_source_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "schemas/broken.json", "{ nope");
        let source = FileSchemaSource::new(dir.path(), "schemas/menu.json");

        assert!(matches!(
            source.load_schema("schemas/missing.json").await,
            Err(SchemaSourceError::Io { .. })
        ));
        assert!(matches!(
            source.load_schema("schemas/broken.json").await,
            Err(SchemaSourceError::Parse { .. })
        ));
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}/app")
    }

    #[tokio::test]
    async fn http_source_resolves_under_root() {
        let router = Router::new()
            .route("/app/schemas/customer.json", get(|| async { CUSTOMER }))
            .route("/app/schemas/menu.json", get(|| async { MENU }));
        let root = serve(router).await;

        let source = HttpSchemaSource::new(Client::new(), &root, "schemas/menu.json").expect("source");
        let schema = source
            .load_schema("schemas/customer.json")
            .await
            .expect("schema");
        assert!(schema.field("name").is_some_and(|f| f.required));
        assert_eq!(source.load_menu().await.expect("menu").entries().len(), 2);

        assert!(matches!(
            source.load_schema("schemas/missing.json").await,
            Err(SchemaSourceError::Fetch { .. })
        ));
    }

    #[test]
    fn config_selects_source_kind() {
        let config = ClientConfig {
            schema_location: SchemaLocation::Directory(PathBuf::from("public")),
            ..ClientConfig::default()
        };
        assert!(schema_source_from_config(&config).is_ok());
        assert!(schema_source_from_config(&ClientConfig::default()).is_ok());
    }
}
