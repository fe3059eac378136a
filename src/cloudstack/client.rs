use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use sha1::Sha1;

use super::CloudStackError;
use super::types::{AsyncJobStatus, DEFAULT_PAGE_SIZE, Params, unwrap_envelope};

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(900);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub http_get_only: bool,
    pub async_timeout: Duration,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(api_url: String, api_key: String, secret_key: String) -> Self {
        Self {
            api_url,
            api_key,
            secret_key,
            http_get_only: false,
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("http_get_only", &self.http_get_only)
            .field("async_timeout", &self.async_timeout)
            .finish()
    }
}

/// Signed client for the CloudStack management API.
#[derive(Clone)]
pub struct CloudStackClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl CloudStackClient {
    pub fn new(config: ClientConfig) -> Result<Self, CloudStackError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(CloudStackError::Network)?;

        Ok(Self { client, config })
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub fn http_get_only(&self) -> bool {
        self.config.http_get_only
    }

    pub fn async_timeout(&self) -> Duration {
        self.config.async_timeout
    }

    /// Builds the query string for `command`, including the HMAC-SHA1
    /// `signature` computed over the sorted, lowercased parameters.
    pub fn signed_query(&self, command: &str, params: &Params) -> Result<String, CloudStackError> {
        let mut all: BTreeMap<&str, &str> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.insert("apikey", &self.config.api_key);
        all.insert("command", command);
        all.insert("response", "json");

        let query = all
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut mac = HmacSha1::new_from_slice(self.config.secret_key.as_bytes())
            .map_err(|e| CloudStackError::Signature(e.to_string()))?;
        mac.update(query.to_lowercase().as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}&signature={}",
            query,
            urlencoding::encode(&signature)
        ))
    }

    async fn send(
        &self,
        command: &str,
        params: &Params,
    ) -> Result<serde_json::Value, CloudStackError> {
        tracing::debug!(command, "calling CloudStack API");

        let query = self.signed_query(command, params)?;
        let response = if self.config.http_get_only {
            let url = format!("{}?{}", self.config.api_url, query);
            self.client.get(&url).send().await?
        } else {
            self.client
                .post(&self.config.api_url)
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .body(query)
                .send()
                .await?
        };

        let status = response.status();
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| CloudStackError::InvalidResponse {
                    command: command.to_string(),
                    message: format!("HTTP {}: failed to parse response: {}", status.as_u16(), e),
                })?;

        unwrap_envelope(command, body)
    }

    /// Runs a synchronous command and returns the response object.
    pub async fn execute(
        &self,
        command: &str,
        params: &Params,
    ) -> Result<serde_json::Value, CloudStackError> {
        self.send(command, params).await
    }

    /// Runs an asynchronous command and waits for its job result.
    pub async fn execute_async(
        &self,
        command: &str,
        params: &Params,
    ) -> Result<serde_json::Value, CloudStackError> {
        let response = self.send(command, params).await?;

        let job_id = response
            .get("jobid")
            .and_then(|j| j.as_str())
            .ok_or_else(|| CloudStackError::InvalidResponse {
                command: command.to_string(),
                message: "missing 'jobid' in async response".to_string(),
            })?
            .to_string();

        self.wait_for_job(&job_id).await
    }

    pub async fn wait_for_job(&self, job_id: &str) -> Result<serde_json::Value, CloudStackError> {
        let started = tokio::time::Instant::now();
        let params = Params::from([("jobid", job_id)]);

        loop {
            let response = self.send("queryAsyncJobResult", &params).await?;
            let status: AsyncJobStatus =
                serde_json::from_value(response).map_err(|e| CloudStackError::InvalidResponse {
                    command: "queryAsyncJobResult".to_string(),
                    message: e.to_string(),
                })?;

            match status.jobstatus {
                0 => {}
                1 => return Ok(status.jobresult),
                _ => {
                    let code = status
                        .jobresult
                        .get("errorcode")
                        .and_then(|c| c.as_u64())
                        .unwrap_or(0) as u16;
                    let message = status
                        .jobresult
                        .get("errortext")
                        .and_then(|t| t.as_str())
                        .unwrap_or("Unknown error")
                        .to_string();
                    return Err(CloudStackError::AsyncJobFailed {
                        job_id: job_id.to_string(),
                        code,
                        message,
                    });
                }
            }

            if started.elapsed() >= self.config.async_timeout {
                return Err(CloudStackError::Timeout {
                    job_id: job_id.to_string(),
                    seconds: self.config.async_timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Walks every page of a `list*` command and collects `response[key]`.
    pub async fn list<T: DeserializeOwned>(
        &self,
        command: &str,
        key: &str,
        params: &Params,
    ) -> Result<Vec<T>, CloudStackError> {
        let mut all_results = Vec::new();
        let mut page = 1u32;

        loop {
            let mut paged = params.clone();
            paged.set("page", page).set("pagesize", DEFAULT_PAGE_SIZE);

            let response = self.send(command, &paged).await?;
            let total_count = response
                .get("count")
                .and_then(|c| c.as_u64())
                .unwrap_or(0) as usize;

            let page_results: Vec<T> = match response.get(key) {
                Some(items) => serde_json::from_value(items.clone()).map_err(|e| {
                    CloudStackError::InvalidResponse {
                        command: command.to_string(),
                        message: format!("failed to parse '{}': {}", key, e),
                    }
                })?,
                None => Vec::new(),
            };

            let count = page_results.len();
            all_results.extend(page_results);

            if count == 0 || all_results.len() >= total_count {
                break;
            }

            page += 1;
        }

        Ok(all_results)
    }

    /// Fetches a single object by id. `Ok(None)` means it no longer exists.
    pub async fn get_by_id<T: DeserializeOwned>(
        &self,
        command: &str,
        key: &str,
        id: &str,
        params: &Params,
    ) -> Result<Option<T>, CloudStackError> {
        let mut params = params.clone();
        params.set("id", id);

        match self.list::<T>(command, key, &params).await {
            Ok(items) => Ok(items.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for CloudStackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudStackClient")
            .field("api_url", &self.config.api_url)
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> CloudStackClient {
        CloudStackClient::new(ClientConfig::new(
            "http://localhost:8080/client/api".to_string(),
            "test_api_key".to_string(),
            "super_secret_key_12345".to_string(),
        ))
        .unwrap()
    }

    #[test]
    fn test_debug_does_not_expose_keys() {
        let client = test_client();
        let debug_output = format!("{:?}", client);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key_12345"));
        assert!(!debug_output.contains("test_api_key"));
    }

    #[test]
    fn test_config_debug_does_not_expose_keys() {
        let config = ClientConfig::new(
            "http://localhost".to_string(),
            "key".to_string(),
            "super_secret_key_12345".to_string(),
        );
        assert!(!format!("{:?}", config).contains("super_secret_key_12345"));
    }

    #[test]
    fn test_signed_query_is_sorted_and_signed() {
        let client = test_client();
        let mut params = Params::new();
        params.set("zoneid", "z1").set("name", "my network");

        let query = client.signed_query("createNetwork", &params).unwrap();

        assert!(query.starts_with(
            "apikey=test_api_key&command=createNetwork&name=my%20network&response=json&zoneid=z1"
        ));
        assert!(query.contains("&signature="));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let client = test_client();
        let params = Params::from([("id", "abc")]);

        let first = client.signed_query("listZones", &params).unwrap();
        let second = client.signed_query("listZones", &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signature_depends_on_parameters() {
        let client = test_client();
        let a = client
            .signed_query("listZones", &Params::from([("id", "a")]))
            .unwrap();
        let b = client
            .signed_query("listZones", &Params::from([("id", "b")]))
            .unwrap();

        let sig = |q: &str| q.rsplit("signature=").next().map(str::to_string);
        assert_ne!(sig(&a), sig(&b));
    }

    #[test]
    fn test_client_is_clone() {
        let client = test_client();
        let cloned = client.clone();
        assert_eq!(cloned.api_url(), "http://localhost:8080/client/api");
    }
}
