//! Client for the remote commerce platform's open API.
//!
//! Only the calls the sync pipeline needs are covered. Every call is fail-fast:
//! no retries, and any missing field in a response becomes a [`RemoteApiError`]
//! carrying the endpoint and the raw body.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::error::{RemoteApiError, truncate_body};

pub type RemoteResult<T> = std::result::Result<T, RemoteApiError>;

pub const TOKEN_PATH: &str = "/auth/token";
pub const LIST_GOODS_BY_TAG: &str = "youzan.showcase.render.api.listGoodsByTagId/1.0.0";
pub const ITEM_GET: &str = "youzan.item.get/3.0.0";
pub const ITEM_UPDATE: &str = "youzan.item.update/3.0.1";
pub const TAG_ADD: &str = "youzan.itemcategories.tag.add/3.0.0";
pub const TAGS_GET: &str = "youzan.itemcategories.tags.get/3.0.0";

/// One entry of a list-goods-by-tag page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: i64,
    pub title: String,
    /// Minor currency units.
    pub price: i64,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
    pub detail_url: String,
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: i64,
    pub name: String,
}

/// Operations the sync pipeline consumes. Implemented over HTTP by
/// [`RemoteCatalogClient`]; tests swap in a scripted fake.
pub trait CatalogApi {
    fn acquire_token(&self) -> RemoteResult<String>;

    /// One page of items tagged with `tag_id`. Pages start at 1; a page shorter
    /// than `page_size` is the last one.
    fn list_items_by_tag(&self, tag_id: i64, page: u32, page_size: usize) -> RemoteResult<Vec<ItemSummary>>;

    fn get_item_detail(&self, item_id: i64) -> RemoteResult<ItemDetail>;

    fn list_tags(&self) -> RemoteResult<Vec<RemoteTag>>;

    /// Create a tag remotely, returning its remote id.
    fn create_tag(&self, name: &str) -> RemoteResult<i64>;

    fn get_item_tag_ids(&self, item_id: i64) -> RemoteResult<Vec<i64>> {
        Ok(self.get_item_detail(item_id)?.tag_ids)
    }

    fn update_item_tags(&self, item_id: i64, tag_ids: &[i64]) -> RemoteResult<()>;
}

#[derive(Deserialize)]
struct ItemWire {
    detail_url: String,
    #[serde(default)]
    tag_ids: Vec<i64>,
}

/// Comma-joined id list, the format item-update expects.
pub fn join_tag_ids(tag_ids: &[i64]) -> String {
    tag_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn field<T: DeserializeOwned>(endpoint: &str, body: &Value, pointer: &str) -> RemoteResult<T> {
    let Some(raw) = body.pointer(pointer) else {
        return Err(RemoteApiError::malformed(
            endpoint,
            format!("missing {pointer}"),
            &body.to_string(),
        ));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        RemoteApiError::malformed(endpoint, format!("{pointer}: {e}"), &body.to_string())
    })
}

pub(crate) fn parse_token(endpoint: &str, body: &Value) -> RemoteResult<String> {
    match body.pointer("/data/access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(RemoteApiError::Auth {
            endpoint: endpoint.to_string(),
            response: truncate_body(&body.to_string()),
        }),
    }
}

pub(crate) fn parse_item_page(endpoint: &str, body: &Value) -> RemoteResult<Vec<ItemSummary>> {
    field(endpoint, body, "/data/list")
}

pub(crate) fn parse_item_detail(endpoint: &str, item_id: i64, body: &Value) -> RemoteResult<ItemDetail> {
    if body.pointer("/data/item").is_none_or(Value::is_null) {
        return Err(RemoteApiError::NotFound {
            endpoint: endpoint.to_string(),
            what: format!("item {item_id}"),
            response: truncate_body(&body.to_string()),
        });
    }
    let wire: ItemWire = field(endpoint, body, "/data/item")?;
    Ok(ItemDetail {
        detail_url: wire.detail_url,
        tag_ids: wire.tag_ids,
    })
}

pub(crate) fn parse_tags(endpoint: &str, body: &Value) -> RemoteResult<Vec<RemoteTag>> {
    field(endpoint, body, "/data/tags")
}

pub(crate) fn parse_created_tag_id(endpoint: &str, body: &Value) -> RemoteResult<i64> {
    body.pointer("/data/tag/id")
        .or_else(|| body.pointer("/data/id"))
        .and_then(Value::as_i64)
        .ok_or_else(|| RemoteApiError::malformed(endpoint, "missing created tag id", &body.to_string()))
}

/// Item-update answers 200 even when it refuses; only `success: true`, or a
/// `data` payload without `success: false`, counts as accepted.
pub(crate) fn parse_update_ack(endpoint: &str, body: &Value) -> RemoteResult<()> {
    let success = body.pointer("/success").and_then(Value::as_bool);
    let has_data = body.pointer("/data").is_some_and(|d| !d.is_null());
    match success {
        Some(true) => Ok(()),
        None if has_data => Ok(()),
        _ => Err(RemoteApiError::malformed(endpoint, "update not acknowledged", &body.to_string())),
    }
}

/// HTTP implementation of [`CatalogApi`].
///
/// Tokens are not cached: every API call first exchanges the client
/// credentials for a fresh access token.
#[derive(Debug, Clone)]
pub struct RemoteCatalogClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    grant_id: i64,
}

impl RemoteCatalogClient {
    pub fn new(config: &CatalogConfig) -> RemoteResult<Self> {
        let mut builder = Client::builder().user_agent(concat!("catalog-sync/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.http_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|source| RemoteApiError::Transport {
            endpoint: "client".to_string(),
            source,
        })?;

        Ok(Self {
            http,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            grant_id: config.grant_id,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/api/{}", self.base_url, method)
    }

    /// Send the request and decode a JSON body. Non-2xx is an error.
    fn send(&self, endpoint: &str, req: RequestBuilder) -> RemoteResult<Value> {
        let resp = req.send().map_err(|source| RemoteApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let status = resp.status();
        let text = resp.text().map_err(|source| RemoteApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        debug!(endpoint, %status, body = %truncate_body(&text), "remote response");

        if !status.is_success() {
            return Err(RemoteApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }
        serde_json::from_str(&text)
            .map_err(|e| RemoteApiError::malformed(endpoint, format!("invalid JSON: {e}"), &text))
    }

    fn get(&self, method: &str, query: &[(&str, String)]) -> RemoteResult<Value> {
        let token = self.acquire_token()?;
        let req = self
            .http
            .get(self.api_url(method))
            .query(&[("access_token", token.as_str())])
            .query(query);
        self.send(method, req)
    }

    fn post(&self, method: &str, body: &Value) -> RemoteResult<Value> {
        let token = self.acquire_token()?;
        let req = self
            .http
            .post(self.api_url(method))
            .query(&[("access_token", token.as_str())])
            .json(body);
        self.send(method, req)
    }
}

impl CatalogApi for RemoteCatalogClient {
    fn acquire_token(&self) -> RemoteResult<String> {
        let body = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "authorize_type": "silent",
            "grant_id": self.grant_id,
        });
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let resp = self.send(TOKEN_PATH, self.http.post(url).json(&body))?;
        parse_token(TOKEN_PATH, &resp)
    }

    fn list_items_by_tag(&self, tag_id: i64, page: u32, page_size: usize) -> RemoteResult<Vec<ItemSummary>> {
        let body = json!({ "page": page, "page_size": page_size, "tag_id": tag_id });
        let resp = self.post(LIST_GOODS_BY_TAG, &body)?;
        parse_item_page(LIST_GOODS_BY_TAG, &resp)
    }

    fn get_item_detail(&self, item_id: i64) -> RemoteResult<ItemDetail> {
        let resp = self.get(ITEM_GET, &[("item_id", item_id.to_string())])?;
        parse_item_detail(ITEM_GET, item_id, &resp)
    }

    fn list_tags(&self) -> RemoteResult<Vec<RemoteTag>> {
        let resp = self.get(TAGS_GET, &[])?;
        parse_tags(TAGS_GET, &resp)
    }

    fn create_tag(&self, name: &str) -> RemoteResult<i64> {
        let resp = self.post(TAG_ADD, &json!({ "name": name }))?;
        let id = parse_created_tag_id(TAG_ADD, &resp)?;
        info!(tag_id = id, name, "remote tag created");
        Ok(id)
    }

    fn update_item_tags(&self, item_id: i64, tag_ids: &[i64]) -> RemoteResult<()> {
        let body = json!({ "item_id": item_id, "tag_ids": join_tag_ids(tag_ids) });
        debug!(%body, "updating item tags");
        let resp = self.post(ITEM_UPDATE, &body)?;
        parse_update_ack(ITEM_UPDATE, &resp)
    }
}


#[cfg(test)]
mod http_tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};

    use super::*;

    /// Request line and body of every request the stub served.
    type Seen = Arc<Mutex<Vec<(String, String)>>>;

    const TOKEN_OK: &str = r#"{"data":{"access_token":"t"}}"#;

    /// Answer `replies` in order, one connection each.
    fn serve(replies: Vec<(u16, &'static str)>) -> (RemoteCatalogClient, Seen, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen: Seen = Arc::default();
        let log = Arc::clone(&seen);

        let server = thread::spawn(move || {
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();

                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut payload = vec![0; content_length];
                reader.read_exact(&mut payload).unwrap();
                log.lock()
                    .unwrap()
                    .push((request_line.trim_end().to_string(), String::from_utf8(payload).unwrap()));

                write!(
                    stream,
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
        });

        let config = CatalogConfig::from_lookup(|key| match key {
            "CATALOG_CLIENT_ID" => Some("cid".into()),
            "CATALOG_CLIENT_SECRET" => Some("secret".into()),
            "CATALOG_GRANT_ID" => Some("42".into()),
            "CATALOG_API_BASE" => Some(format!("http://127.0.0.1:{port}")),
            "CATALOG_HTTP_TIMEOUT_SECS" => Some("5".into()),
            _ => None,
        })
        .unwrap();
        (RemoteCatalogClient::new(&config).unwrap(), seen, server)
    }

    fn requests(seen: &Seen) -> Vec<(String, String)> {
        seen.lock().unwrap().clone()
    }

    #[test]
    fn every_call_fetches_a_token_first() {
        let (client, seen, server) = serve(vec![
            (200, TOKEN_OK),
            (200, r#"{"data":{"item":{"detail_url":"https://shop/5","tag_ids":[1,2]}}}"#),
        ]);
        let detail = client.get_item_detail(5).unwrap();
        server.join().unwrap();
        assert_eq!(detail.tag_ids, vec![1, 2]);

        let reqs = requests(&seen);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].0, "POST /auth/token HTTP/1.1");
        let token_body: Value = serde_json::from_str(&reqs[0].1).unwrap();
        assert_eq!(
            token_body,
            json!({ "client_id": "cid", "client_secret": "secret", "authorize_type": "silent", "grant_id": 42 })
        );
        assert_eq!(reqs[1].0, "GET /api/youzan.item.get/3.0.0?access_token=t&item_id=5 HTTP/1.1");
        assert!(reqs[1].1.is_empty());
    }

    #[test]
    fn list_items_posts_paging_fields() {
        let (client, seen, server) = serve(vec![(200, TOKEN_OK), (200, r#"{"data":{"list":[]}}"#)]);
        assert!(client.list_items_by_tag(7, 3, 2).unwrap().is_empty());
        server.join().unwrap();

        let reqs = requests(&seen);
        assert_eq!(
            reqs[1].0,
            "POST /api/youzan.showcase.render.api.listGoodsByTagId/1.0.0?access_token=t HTTP/1.1"
        );
        let body: Value = serde_json::from_str(&reqs[1].1).unwrap();
        assert_eq!(body, json!({ "page": 3, "page_size": 2, "tag_id": 7 }));
    }

    #[test]
    fn update_sends_comma_joined_tag_ids() {
        let (client, seen, server) = serve(vec![
            (200, TOKEN_OK),
            (200, r#"{"success":true,"data":{"is_success":true}}"#),
        ]);
        client.update_item_tags(5, &[1, 2, 9]).unwrap();
        server.join().unwrap();

        let reqs = requests(&seen);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].0, "POST /api/youzan.item.update/3.0.1?access_token=t HTTP/1.1");
        let body: Value = serde_json::from_str(&reqs[1].1).unwrap();
        assert_eq!(body, json!({ "item_id": 5, "tag_ids": "1,2,9" }));
    }

    #[test]
    fn refused_update_is_an_error() {
        let (client, _seen, server) = serve(vec![
            (200, TOKEN_OK),
            (200, r#"{"success":false,"code":4202,"gw_err_resp":{"err_msg":"no permission"}}"#),
        ]);
        let err = client.update_item_tags(5, &[1, 2, 9]).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, RemoteApiError::Malformed { .. }));
        assert_eq!(err.endpoint(), ITEM_UPDATE);
        assert!(err.to_string().contains("4202"));
    }

    #[test]
    fn non_2xx_reply_is_status_error() {
        let (client, _seen, server) = serve(vec![(200, TOKEN_OK), (503, r#"{"message":"busy"}"#)]);
        let err = client.list_tags().unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            RemoteApiError::Status { status: 503, ref body, .. } if body.contains("busy")
        ));
        assert_eq!(err.endpoint(), TAGS_GET);
    }

    #[test]
    fn token_failure_stops_before_the_call() {
        let (client, seen, server) = serve(vec![(200, r#"{"code":40001,"data":null}"#)]);
        let err = client.create_tag("tea").unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, RemoteApiError::Auth { .. }));
        assert_eq!(requests(&seen).len(), 1);
    }
}
