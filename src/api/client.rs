use color_eyre::{
  eyre::{bail, eyre},
  Result,
};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cache::{CacheLayer, Cacheable, QueryKey, Tag};
use crate::config::ApiConfig;
use crate::query::Query;
use crate::session::SessionStore;

/// REST client for the enterprise API.
///
/// Every request carries the session's access token as a Bearer token when
/// one is present.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: String,
  session: SessionStore,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, session: SessionStore) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .user_agent(concat!("cbt-admin/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.url.trim_end_matches('/').to_string(),
      session,
    })
  }

  pub fn session(&self) -> &SessionStore {
    &self.session
  }

  fn url(&self, path: &str) -> String {
    format!("{}/enterprise{}", self.base_url, path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let mut req = self
      .http
      .request(method, self.url(path))
      .header(ACCEPT, "application/json");
    if let Some(token) = self.session.access_token() {
      req = req.bearer_auth(token);
    }
    req
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    send(self.request(Method::GET, path)).await
  }

  /// GET with `query` encoded as URL parameters (unset fields are omitted)
  pub async fn get_with<T, Q>(&self, path: &str, query: &Q) -> Result<T>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    let pairs = query_pairs(query)?;
    let mut req = self.request(Method::GET, path);
    if !pairs.is_empty() {
      req = req.query(&pairs);
    }
    send(req).await
  }

  pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    send(self.request(Method::POST, path).json(body)).await
  }

  pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    send(self.request(Method::PUT, path).json(body)).await
  }

  pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    send(self.request(Method::PATCH, path).json(body)).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    send(self.request(Method::DELETE, path)).await
  }

  /// Declare a cached GET: keyed by `operation`, `path` and `params`,
  /// tagged with `provides`, served from `fallback` when the request fails.
  pub(crate) fn query<T, P, G>(
    &self,
    cache: &CacheLayer,
    operation: &'static str,
    path: impl Into<String>,
    params: P,
    provides: Vec<Tag>,
    fallback: G,
  ) -> Query<T>
  where
    T: Cacheable,
    P: Serialize + Send + Sync + 'static,
    G: Fn() -> T + Send + Sync + 'static,
  {
    let path = path.into();
    let key = QueryKey::new(
      operation,
      &KeyParams {
        path: &path,
        params: &params,
      },
    );

    let api = self.clone();
    let request = Arc::new((path, params));
    Query::new(
      cache.clone(),
      key,
      provides,
      move || {
        let api = api.clone();
        let request = Arc::clone(&request);
        async move { api.get_with(&request.0, &request.1).await }
      },
      fallback,
    )
  }
}

#[derive(Serialize)]
struct KeyParams<'a, P> {
  path: &'a str,
  params: &'a P,
}

/// Responses arrive either bare or wrapped as `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
  Wrapped { data: T },
  Bare(T),
}

impl<T> Envelope<T> {
  fn into_inner(self) -> T {
    match self {
      Envelope::Wrapped { data } => data,
      Envelope::Bare(data) => data,
    }
  }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
  let resp = req
    .send()
    .await
    .map_err(|e| eyre!("Failed to connect to server: {}", e))?;
  handle_response(resp).await
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
  let status = resp.status();
  let body = resp
    .text()
    .await
    .map_err(|e| eyre!("Failed to read response body: {}", e))?;

  if !status.is_success() {
    bail!("HTTP {}: {}", status.as_u16(), error_message(&body));
  }

  // 204 and friends
  let body = if body.trim().is_empty() { "{}" } else { &body };

  let envelope: Envelope<T> =
    serde_json::from_str(body).map_err(|e| eyre!("Failed to parse response: {}", e))?;
  Ok(envelope.into_inner())
}

/// The backend's `message` (or `error`) field, else the raw body.
fn error_message(body: &str) -> String {
  serde_json::from_str::<Value>(body)
    .ok()
    .and_then(|json| {
      json
        .get("message")
        .or_else(|| json.get("error"))
        .and_then(Value::as_str)
        .map(String::from)
    })
    .unwrap_or_else(|| body.trim().to_string())
}

/// Escape `segment` so it stays a single URL path segment.
pub(crate) fn path_segment(segment: &str) -> String {
  // byte_serialize writes spaces as '+' and escapes a literal '+'
  url::form_urlencoded::byte_serialize(segment.as_bytes())
    .collect::<String>()
    .replace('+', "%20")
}

/// Flatten a parameter struct into URL query pairs, skipping unset fields.
fn query_pairs<Q: Serialize + ?Sized>(query: &Q) -> Result<Vec<(String, String)>> {
  let value =
    serde_json::to_value(query).map_err(|e| eyre!("Failed to encode query parameters: {}", e))?;

  let Value::Object(map) = value else {
    return Ok(Vec::new());
  };

  Ok(
    map
      .into_iter()
      .filter_map(|(name, value)| query_value(&value).map(|v| (name, v)))
      .collect(),
  )
}

fn query_value(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) if s.trim().is_empty() => None,
    Value::String(s) => Some(s.trim().to_string()),
    Value::Array(items) => {
      let parts: Vec<String> = items.iter().filter_map(query_value).collect();
      (!parts.is_empty()).then(|| parts.join(","))
    }
    other => Some(other.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{admin_token, app_for};
  use chrono::Duration;
  use httpmock::MockServer;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Thing {
    id: u64,
  }

  #[test]
  fn test_query_pairs_skip_unset_fields() {
    let pairs = query_pairs(&json!({
      "page": 2,
      "search": "  ",
      "status": null,
      "active": true,
      "ids": [1, 2],
      "name": " ada "
    }))
    .unwrap();

    assert_eq!(
      pairs,
      vec![
        ("active".to_string(), "true".to_string()),
        ("ids".to_string(), "1,2".to_string()),
        ("name".to_string(), "ada".to_string()),
        ("page".to_string(), "2".to_string()),
      ]
    );
    assert!(query_pairs(&()).unwrap().is_empty());
  }

  #[test]
  fn test_path_segment_escaping() {
    assert_eq!(path_segment("proctoring"), "proctoring");
    assert_eq!(path_segment("new-grading_v2.1"), "new-grading_v2.1");
    assert_eq!(path_segment("a/b?c#d"), "a%2Fb%3Fc%23d");
    assert_eq!(path_segment("two words+more"), "two%20words%2Bmore");
  }

  #[test]
  fn test_error_message_extraction() {
    assert_eq!(error_message(r#"{"message":"Email taken"}"#), "Email taken");
    assert_eq!(error_message(r#"{"error":"Forbidden"}"#), "Forbidden");
    assert_eq!(error_message("gateway timeout\n"), "gateway timeout");
  }

  #[tokio::test]
  async fn test_bare_and_wrapped_responses() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method("GET").path("/enterprise/bare");
      then.status(200).json_body(json!({ "id": 1 }));
    });
    server.mock(|when, then| {
      when.method("GET").path("/enterprise/wrapped");
      then
        .status(200)
        .json_body(json!({ "success": true, "data": { "id": 2 } }));
    });

    let app = app_for(&server);
    let bare: Thing = app.api().get("/bare").await.unwrap();
    let wrapped: Thing = app.api().get("/wrapped").await.unwrap();
    assert_eq!(bare, Thing { id: 1 });
    assert_eq!(wrapped, Thing { id: 2 });
  }

  #[tokio::test]
  async fn test_bearer_token_attached_when_signed_in() {
    let server = MockServer::start();
    let app = app_for(&server);
    let token = admin_token(Duration::hours(1));
    app.session().set_credentials(&token, "r", None).unwrap();

    let mock = server.mock(|when, then| {
      when
        .method("GET")
        .path("/enterprise/thing")
        .header("authorization", format!("Bearer {}", token));
      then.status(200).json_body(json!({ "id": 3 }));
    });

    let thing: Thing = app.api().get("/thing").await.unwrap();
    assert_eq!(thing.id, 3);
    mock.assert();
  }

  #[tokio::test]
  async fn test_error_status_becomes_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method("POST").path("/enterprise/things");
      then
        .status(422)
        .json_body(json!({ "message": "name is required" }));
    });

    let app = app_for(&server);
    let err = app
      .api()
      .post::<Thing, _>("/things", &json!({}))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "HTTP 422: name is required");
  }
}
