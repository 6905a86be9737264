//! `reqwest` implementation of [`EntityGateway`] against the generic entity
//! storage API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, warn};

use schemaform_core::{EntityGateway, GatewayError, PageResult, Record};

use crate::config::ClientConfig;

/// Entity gateway speaking JSON over HTTP.
///
/// Routes, relative to the base URL:
///
/// | operation        | request                                          |
/// |------------------|--------------------------------------------------|
/// | `lookup_by_name` | `GET Entity/{table}/{text}`                      |
/// | `create`         | `POST Entity/{table}`                            |
/// | `update`         | `PUT Entity/{table}/{id}`                        |
/// | `get_by_id`      | `GET Entity/GetById/{table}/{id}`                |
/// | `list`           | `GET Entity/list/{table}?page={n}&pageSize={s}`  |
/// | `delete`         | `DELETE Entity/{table}/{id}`                     |
#[derive(Debug, Clone)]
pub struct HttpEntityGateway {
    client: Client,
    base: Url,
}

impl HttpEntityGateway {
    /// Wraps an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unexpected`] when `base_url` does not parse or
    /// cannot carry path segments.
    pub fn new(client: Client, base_url: &str) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)
            .map_err(|e| GatewayError::Unexpected(format!("invalid base URL {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Unexpected(format!(
                "base URL {base_url:?} cannot carry a path"
            )));
        }
        Ok(Self { client, base })
    }

    /// Builds a client with the configured timeout and TLS policy.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the client cannot be built and
    /// [`GatewayError::Unexpected`] for an unusable base URL.
    pub fn from_config(config: &ClientConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Self::new(client, &config.api_base_url)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/Entity/{segments...}` with every segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("Entity").extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Record>,
    ) -> Result<Value, GatewayError> {
        let method_name = method_name(&method);
        debug!(method = method_name, %url, "entity request");

        let mut request: RequestBuilder = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(method = method_name, %url, status = status.as_u16(), "entity request rejected");
            return Err(GatewayError::Status {
                method: method_name,
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn method_name(method: &Method) -> &'static str {
    match method.as_str() {
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        _ => "GET",
    }
}

#[async_trait]
impl EntityGateway for HttpEntityGateway {
    async fn lookup_by_name(&self, table: &str, text: &str) -> Result<Value, GatewayError> {
        self.send(Method::GET, self.url(&[table, text]), None).await
    }

    async fn create(&self, table: &str, payload: &Record) -> Result<Value, GatewayError> {
        self.send(Method::POST, self.url(&[table]), Some(payload))
            .await
    }

    async fn update(&self, table: &str, id: &str, payload: &Record) -> Result<Value, GatewayError> {
        self.send(Method::PUT, self.url(&[table, id]), Some(payload))
            .await
    }

    async fn get_by_id(&self, table: &str, id: &str) -> Result<Record, GatewayError> {
        let value = self
            .send(Method::GET, self.url(&["GetById", table, id]), None)
            .await?;
        match value {
            Value::Null => Err(GatewayError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            }),
            other => Record::from_value(other).ok_or_else(|| {
                GatewayError::Unexpected(format!("record {id} of {table} is not an object"))
            }),
        }
    }

    async fn list(&self, table: &str, page: u32, page_size: u32) -> Result<PageResult, GatewayError> {
        let mut url = self.url(&["list", table]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &page_size.to_string());

        match self.send(Method::GET, url, None).await? {
            Value::Null => Ok(PageResult::default()),
            value => Ok(serde_json::from_value(value)?),
        }
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), GatewayError> {
        self.send(Method::DELETE, self.url(&[table, id]), None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{Method as AxumMethod, StatusCode, Uri};
    use axum::Router;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Seen {
        method: String,
        path: String,
        body: String,
    }

    /// Records every request and answers from a table keyed by
    /// `"METHOD /path?query"`.
    #[derive(Clone, Default)]
    struct Stub {
        seen: Arc<Mutex<Vec<Seen>>>,
        replies: Arc<Mutex<HashMap<String, (u16, String)>>>,
    }

    impl Stub {
        fn reply(&self, key: &str, status: u16, body: Value) {
            let body = if body.is_null() { String::new() } else { body.to_string() };
            self.replies.lock().insert(key.to_string(), (status, body));
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().clone()
        }
    }

    async fn handle(
        State(stub): State<Stub>,
        method: AxumMethod,
        uri: Uri,
        body: String,
    ) -> (StatusCode, String) {
        let path = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string);
        stub.seen.lock().push(Seen {
            method: method.to_string(),
            path: path.clone(),
            body,
        });
        let key = format!("{method} {path}");
        let (status, body) = stub
            .replies
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or((404, "no stub".to_string()));
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
    }

    async fn serve(stub: &Stub) -> HttpEntityGateway {
        let router = Router::new().fallback(handle).with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        HttpEntityGateway::new(Client::new(), &format!("http://{addr}/api")).expect("gateway")
    }

    #[tokio::test]
    async fn lookup_encodes_path_segments() {
        let stub = Stub::default();
        stub.reply(
            "GET /api/Entity/customer/Acme%20Co",
            200,
            json!({ "id": 42, "name": "Acme Co" }),
        );
        let gateway = serve(&stub).await;

        let value = gateway
            .lookup_by_name("customer", "Acme Co")
            .await
            .expect("lookup");
        assert_eq!(value["id"], 42);
        assert_eq!(stub.seen()[0].path, "/api/Entity/customer/Acme%20Co");
    }

    #[tokio::test]
    async fn slash_in_text_stays_inside_one_segment() {
        let stub = Stub::default();
        stub.reply("GET /api/Entity/customer/A%2FB", 200, json!([]));
        let gateway = serve(&stub).await;

        let value = gateway.lookup_by_name("customer", "A/B").await.expect("lookup");
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn create_and_update_send_json_bodies() {
        let stub = Stub::default();
        stub.reply("POST /api/Entity/customer", 200, json!({ "id": 1 }));
        stub.reply("PUT /api/Entity/customer/1", 204, Value::Null);
        let gateway = serve(&stub).await;

        let mut payload = Record::new();
        payload.set("name", "Bob");
        gateway.create("customer", &payload).await.expect("create");
        let updated = gateway
            .update("customer", "1", &payload)
            .await
            .expect("update");
        assert_eq!(updated, Value::Null);

        let seen = stub.seen();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(
            serde_json::from_str::<Value>(&seen[0].body).expect("json"),
            json!({ "name": "Bob" })
        );
        assert_eq!(seen[1].method, "PUT");
    }

    #[tokio::test]
    async fn get_by_id_decodes_record() {
        let stub = Stub::default();
        stub.reply(
            "GET /api/Entity/GetById/customer/9",
            200,
            json!({ "id": 9, "name": "Bob" }),
        );
        let gateway = serve(&stub).await;

        let record = gateway.get_by_id("customer", "9").await.expect("record");
        assert_eq!(record.text("name"), "Bob");
        assert_eq!(record.id().as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn list_sends_page_query() {
        let stub = Stub::default();
        stub.reply(
            "GET /api/Entity/list/customer?page=2&pageSize=2",
            200,
            json!({ "records": [{ "id": 3, "name": "Cy" }], "totalRecords": 3 }),
        );
        let gateway = serve(&stub).await;

        let page = gateway.list("customer", 2, 2).await.expect("page");
        assert_eq!(page.total_records, 3);
        assert_eq!(page.records[0].text("name"), "Cy");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let stub = Stub::default();
        stub.reply("DELETE /api/Entity/customer/9", 500, json!("boom"));
        let gateway = serve(&stub).await;

        match gateway.delete("customer", "9").await {
            Err(GatewayError::Status {
                method,
                status,
                body,
                ..
            }) => {
                assert_eq!(method, "DELETE");
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let stub = Stub::default();
        stub.replies.lock().insert(
            "GET /api/Entity/customer/x".to_string(),
            (200, "{not json".to_string()),
        );
        let gateway = serve(&stub).await;

        assert!(matches!(
            gateway.lookup_by_name("customer", "x").await,
            Err(GatewayError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let gateway =
            HttpEntityGateway::new(Client::new(), "http://127.0.0.1:1/api").expect("gateway");
        assert!(matches!(
            gateway.list("customer", 1, 2).await,
            Err(GatewayError::Transport(_))
        ));
    }

    #[test]
    fn routes_hang_off_the_configured_base() {
        let gateway =
            HttpEntityGateway::new(Client::new(), "https://localhost:7277/api/").expect("gateway");
        assert_eq!(gateway.base_url().path(), "/api/");
        assert_eq!(
            gateway.url(&["GetById", "customer", "9"]).as_str(),
            "https://localhost:7277/api/Entity/GetById/customer/9"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(HttpEntityGateway::new(Client::new(), "not a url").is_err());
        assert!(HttpEntityGateway::new(Client::new(), "mailto:a@b.c").is_err());
    }
}
