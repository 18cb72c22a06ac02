//! Thin JSON client for the boarding backend.
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, ErrorShape};

pub mod admin;
pub mod boarding;
pub mod model;
pub mod partner;

pub use admin::AdminApi;
pub use boarding::BoardingApi;
pub use partner::PartnerApi;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    save_timeout: Duration,
    auth_url_timeout: Duration,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Per-request options: bearer token and timeout.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub bearer: Option<String>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            timeout: None,
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self {
            bearer: None,
            timeout: Some(timeout),
        }
    }
}

impl ApiClient {
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent("path-boarding/0.1")
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            save_timeout: Duration::from_secs(25),
            auth_url_timeout: Duration::from_secs(15),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        let base = Url::parse(cfg.api.base_url.trim())
            .map_err(|e| ApiError::Request(format!("invalid api.base_url: {}", e)))?;
        let mut client = Self::new(base)?;
        client.save_timeout = cfg.save_timeout();
        client.auth_url_timeout = cfg.auth_url_timeout();
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn save_timeout(&self) -> Duration {
        self.save_timeout
    }

    pub fn auth_url_timeout(&self) -> Duration {
        self.auth_url_timeout
    }

    /// Build a request against `path` (relative to the base URL, may carry a
    /// leading slash) with JSON headers, bearer token and timeout applied.
    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        opts: &RequestOptions,
    ) -> Result<reqwest::Request, ApiError> {
        let endpoint = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Request(format!("invalid path {}: {}", path, e)))?;
        let mut req: RequestBuilder = self.http.request(method.clone(), endpoint);
        if !query.is_empty() {
            req = req.query(query);
        }
        if method != Method::DELETE {
            req = req.header("Content-Type", "application/json");
        }
        if let Some(token) = opts.bearer.as_deref() {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(timeout) = opts.timeout {
            req = req.timeout(timeout);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.build().map_err(ApiError::from)
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        opts: &RequestOptions,
    ) -> Result<Response, ApiError> {
        let request = self.build_request(method, path, query, body, opts)?;
        debug!(method=%request.method(), path=%request.url().path(), "sending api request");
        let res = self.http.execute(request).await.map_err(|err| {
            let err = ApiError::from(err);
            warn!(path, error=%err, "api request failed");
            err
        })?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let raw = res.text().await.unwrap_or_default();
        let json: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
        warn!(path, status=%status, "api returned error status");
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Err(ApiError::Server(normalize_error(status.as_u16(), &json)))
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
        if res.status() == StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Null)
                .map_err(|e| ApiError::Decode(e.to_string()));
        }
        let raw = res.text().await?;
        let body = if raw.trim().is_empty() { "null" } else { raw.as_str() };
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        opts: &RequestOptions,
    ) -> Result<T, ApiError> {
        let res = self
            .execute::<Value>(Method::GET, path, query, None, opts)
            .await?;
        Self::decode(res).await
    }

    pub async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, &str)],
        opts: &RequestOptions,
    ) -> Result<Vec<u8>, ApiError> {
        let res = self
            .execute::<Value>(Method::GET, path, query, None, opts)
            .await?;
        Ok(res.bytes().await?.to_vec())
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        opts: &RequestOptions,
    ) -> Result<T, ApiError> {
        let res = self.execute(Method::POST, path, query, body, opts).await?;
        Self::decode(res).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        opts: &RequestOptions,
    ) -> Result<T, ApiError> {
        let res = self
            .execute(Method::PATCH, path, &[], Some(body), opts)
            .await?;
        Self::decode(res).await
    }

    pub async fn delete(&self, path: &str, opts: &RequestOptions) -> Result<(), ApiError> {
        self.execute::<Value>(Method::DELETE, path, &[], None, opts)
            .await?;
        Ok(())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Collapse an error body into `{ error, statusCode, validation_errors }`.
///
/// The message comes from `detail` when it is a string, then `message`, then a
/// generic fallback. Field errors come from `validation_errors`, or from a
/// structured `detail` (a list of `{loc, msg}` entries or a map of lists).
pub fn normalize_error(status: u16, body: &Value) -> ErrorShape {
    let error = body
        .get("detail")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .unwrap_or("Request failed")
        .to_string();
    let validation_errors = body
        .get("validation_errors")
        .and_then(field_errors)
        .or_else(|| body.get("detail").and_then(field_errors));
    ErrorShape {
        error,
        status_code: status,
        validation_errors,
    }
}

fn field_errors(v: &Value) -> Option<BTreeMap<String, Vec<String>>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    match v {
        Value::Object(map) => {
            for (field, msgs) in map {
                let list = match msgs {
                    Value::Array(items) => items
                        .iter()
                        .filter_map(|m| m.as_str().map(str::to_string))
                        .collect(),
                    Value::String(s) => vec![s.clone()],
                    _ => continue,
                };
                out.insert(field.clone(), list);
            }
        }
        Value::Array(items) => {
            for item in items {
                let msg = match item.get("msg").and_then(Value::as_str) {
                    Some(m) => m.to_string(),
                    None => continue,
                };
                let field = item
                    .get("loc")
                    .and_then(Value::as_array)
                    .and_then(|loc| loc.last())
                    .map(|l| match l {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "_".to_string());
                out.entry(field).or_default().push(msg);
            }
        }
        _ => return None,
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> ApiClient {
        ApiClient::new(Url::parse("http://localhost:8000/api").unwrap()).unwrap()
    }

    #[test]
    fn build_request_sets_headers() {
        let c = client();
        let body = json!({ "code": "123456" });
        let request = c
            .build_request(
                Method::POST,
                "/boarding/verify-email-code",
                &[("invite_token", "tok en")],
                Some(&body),
                &RequestOptions {
                    bearer: Some("secret".into()),
                    timeout: Some(Duration::from_secs(25)),
                },
            )
            .unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), "/api/boarding/verify-email-code");
        assert_eq!(request.url().query(), Some("invite_token=tok+en"));
        assert_eq!(request.timeout(), Some(&Duration::from_secs(25)));
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer secret"
        );
        assert_eq!(
            headers
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn build_request_without_bearer_or_body() {
        let c = client();
        let request = c
            .build_request::<Value>(
                Method::DELETE,
                "admin/fee-schedules/fs-1",
                &[],
                None,
                &RequestOptions::default(),
            )
            .unwrap();
        assert!(request.headers().get("Authorization").is_none());
        assert!(request.headers().get("Content-Type").is_none());
        assert!(request.body().is_none());
        assert_eq!(c.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn normalize_error_prefers_detail_then_message() {
        let shape = normalize_error(404, &json!({ "detail": "Invalid or expired link" }));
        assert_eq!(shape.error, "Invalid or expired link");
        assert_eq!(shape.status_code, 404);
        assert!(shape.validation_errors.is_none());

        let shape = normalize_error(500, &json!({ "message": "boom" }));
        assert_eq!(shape.error, "boom");

        let shape = normalize_error(502, &Value::Null);
        assert_eq!(shape.error, "Request failed");
    }

    #[test]
    fn normalize_error_collects_structured_detail() {
        let body = json!({
            "detail": [
                { "loc": ["body", "email"], "msg": "value is not a valid email address" },
                { "loc": ["body", "email"], "msg": "field required" },
                { "loc": ["query", 0], "msg": "bad" }
            ]
        });
        let shape = normalize_error(422, &body);
        assert_eq!(shape.error, "Request failed");
        let errs = shape.validation_errors.unwrap();
        assert_eq!(errs["email"].len(), 2);
        assert_eq!(errs["0"], vec!["bad".to_string()]);

        let body = json!({ "message": "Invalid", "validation_errors": { "iban": ["too short"] } });
        let errs = normalize_error(400, &body).validation_errors.unwrap();
        assert_eq!(errs["iban"], vec!["too short".to_string()]);
    }
}
