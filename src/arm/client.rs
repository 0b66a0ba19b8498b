//! Blocking ARM transport with long-running-operation polling.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::RequestBuilder;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::TokenCredential;
use crate::config::Config;
use crate::error::{Result, WoError};
use crate::retry::{Sleeper, ThreadSleeper};

const ASYNC_OPERATION: &str = "azure-asyncoperation";
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// How often and how long to poll a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }
}

/// Status, LRO headers and decoded body of one response.
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub body: Value,
    async_operation: Option<String>,
    location: Option<String>,
    retry_after: Option<Duration>,
}

impl ArmResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    fn into_error(self) -> WoError {
        remote_error(self.status, &self.body)
    }
}

pub struct ArmClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    subscription_id: String,
    api_version: String,
    scope: String,
    credential: Arc<dyn TokenCredential>,
    poll: PollSettings,
    sleeper: Arc<dyn Sleeper>,
}

impl ArmClient {
    pub fn new(
        endpoint: impl Into<String>,
        subscription_id: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(WoError::Config("azure.endpoint is empty".to_string()));
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("wo/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            scope: format!("{endpoint}/.default"),
            endpoint,
            subscription_id: subscription_id.into(),
            api_version: crate::config::DEFAULT_API_VERSION.to_string(),
            credential,
            poll: PollSettings::default(),
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    pub fn from_config(config: &Config, credential: Arc<dyn TokenCredential>) -> Result<Self> {
        let subscription = config.azure.require_subscription()?;
        Ok(Self::new(&config.azure.endpoint, subscription, credential)?
            .with_api_version(&config.azure.api_version)
            .with_scope(&config.azure.token_scope)
            .with_polling(PollSettings {
                interval: config.polling.interval,
                max_polls: config.polling.max_polls,
            }))
    }

    #[must_use]
    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        if !scope.trim().is_empty() {
            self.scope = scope.to_string();
        }
        self
    }

    #[must_use]
    pub const fn with_polling(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    #[must_use]
    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    #[must_use]
    pub fn shared_sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    #[must_use]
    pub fn credential(&self) -> Arc<dyn TokenCredential> {
        Arc::clone(&self.credential)
    }

    /// `/subscriptions/{sub}/resourceGroups/{rg}`
    #[must_use]
    pub fn resource_group_id(&self, resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, resource_group
        )
    }

    /// Resource id under the `Microsoft.Edge` provider.
    #[must_use]
    pub fn edge_id(&self, resource_group: &str, relative: &str) -> String {
        format!(
            "{}/providers/Microsoft.Edge/{}",
            self.resource_group_id(resource_group),
            relative.trim_start_matches('/')
        )
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.endpoint,
            path,
            urlencoding::encode(api_version)
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.credential.get_token(&self.scope)?;
        Ok(builder
            .bearer_auth(token.secret())
            .header(CLIENT_REQUEST_ID, uuid::Uuid::new_v4().to_string())
            .header("Accept", "application/json"))
    }

    /// Send one request without interpreting the status.
    pub fn send(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse> {
        let url = self.url(path, api_version);
        self.send_url(method, &url, body)
    }

    fn send_url(&self, method: Method, url: &str, body: Option<&Value>) -> Result<ArmResponse> {
        debug!(method = %method, url, "sending request");
        let mut builder = self.authorized(self.http.request(method, url))?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send()?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        debug!(url, status, "received response");

        Ok(ArmResponse {
            status,
            body,
            async_operation: header_string(&headers, ASYNC_OPERATION),
            location: header_string(&headers, LOCATION.as_str()),
            retry_after: retry_after(&headers),
        })
    }

    /// GET a resource; 404 is `None`.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let response = self.send(Method::GET, path, &self.api_version, None)?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => Ok(Some(response.body)),
            _ => Err(response.into_error()),
        }
    }

    /// Create or replace a resource and wait for provisioning to finish.
    pub fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.send(Method::PUT, path, &self.api_version, Some(body))?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        info!(resource = path, status = response.status, "create or update accepted");

        if let Some(operation) = response.async_operation.clone() {
            self.poll_operation(path, &operation, response.retry_after)?;
            return self.read_back(path);
        }
        if response.status == 202 {
            if let Some(location) = response.location.clone() {
                self.poll_location(path, &location, response.retry_after)?;
                return self.read_back(path);
            }
        }
        match provisioning_state(&response.body) {
            Some(state @ ("Failed" | "Canceled")) => Err(WoError::OperationFailed {
                operation: path.to_string(),
                status: state.to_string(),
                message: error_message(&response.body)
                    .unwrap_or_else(|| "no error details".to_string()),
            }),
            Some(state) if !is_terminal(state) => self.poll_provisioning(path, response.retry_after),
            _ => Ok(response.body),
        }
    }

    /// Invoke an action and wait for it to finish.
    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.send(Method::POST, path, &self.api_version, Some(body))?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        info!(resource = path, status = response.status, "action accepted");

        if let Some(operation) = response.async_operation.clone() {
            let document = self.poll_operation(path, &operation, response.retry_after)?;
            if let Some(location) = response.location.as_deref() {
                let result = self.send_url(Method::GET, location, None)?;
                if result.is_success() && !result.body.is_null() {
                    return Ok(result.body);
                }
            }
            return Ok(document.get("properties").cloned().unwrap_or(document));
        }
        if response.status == 202 {
            if let Some(location) = response.location.clone() {
                return self.poll_location(path, &location, response.retry_after);
            }
        }
        Ok(response.body)
    }

    fn read_back(&self, path: &str) -> Result<Value> {
        self.get(path)?.ok_or_else(|| WoError::Remote {
            status: 404,
            code: Some("ResourceNotFound".to_string()),
            message: format!("{path} not found after provisioning"),
        })
    }

    fn wait(&self, hint: Option<Duration>) {
        let delay = hint.unwrap_or(self.poll.interval).min(MAX_RETRY_AFTER);
        self.sleeper.sleep(delay);
    }

    /// Poll an `Azure-AsyncOperation` URL until it reports a terminal status.
    fn poll_operation(
        &self,
        resource: &str,
        operation_url: &str,
        mut hint: Option<Duration>,
    ) -> Result<Value> {
        let mut last_status = "InProgress".to_string();
        for poll in 1..=self.poll.max_polls {
            self.wait(hint);
            let response = self.send_url(Method::GET, operation_url, None)?;
            if !response.is_success() {
                return Err(response.into_error());
            }
            let status = response
                .body
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("InProgress")
                .to_string();
            debug!(resource, poll, status = %status, "polled operation");

            match status.as_str() {
                "Succeeded" => return Ok(response.body),
                "Failed" | "Canceled" | "Cancelled" => {
                    let message = error_message(&response.body)
                        .unwrap_or_else(|| "no error details".to_string());
                    return Err(WoError::OperationFailed {
                        operation: resource.to_string(),
                        status,
                        message,
                    });
                }
                _ => {
                    last_status = status;
                    hint = response.retry_after;
                }
            }
        }
        warn!(resource, status = %last_status, polls = self.poll.max_polls, "operation still running");
        Err(WoError::OperationPending {
            operation: resource.to_string(),
            status: last_status,
        })
    }

    /// Poll a `Location` URL until it stops answering 202.
    fn poll_location(&self, resource: &str, location: &str, mut hint: Option<Duration>) -> Result<Value> {
        for poll in 1..=self.poll.max_polls {
            self.wait(hint);
            let response = self.send_url(Method::GET, location, None)?;
            debug!(resource, poll, status = response.status, "polled location");
            match response.status {
                202 => hint = response.retry_after,
                _ if response.is_success() => return Ok(response.body),
                _ => return Err(response.into_error()),
            }
        }
        Err(WoError::OperationPending {
            operation: resource.to_string(),
            status: "Accepted".to_string(),
        })
    }

    /// Re-read a resource until its `provisioningState` is terminal.
    fn poll_provisioning(&self, path: &str, mut hint: Option<Duration>) -> Result<Value> {
        let mut last_state = String::new();
        for poll in 1..=self.poll.max_polls {
            self.wait(hint);
            let response = self.send(Method::GET, path, &self.api_version, None)?;
            if !response.is_success() {
                return Err(response.into_error());
            }
            let state = provisioning_state(&response.body).unwrap_or("Succeeded").to_string();
            debug!(resource = path, poll, state = %state, "polled provisioning state");
            match state.as_str() {
                "Succeeded" => return Ok(response.body),
                "Failed" | "Canceled" => {
                    return Err(WoError::OperationFailed {
                        operation: path.to_string(),
                        message: error_message(&response.body)
                            .unwrap_or_else(|| "no error details".to_string()),
                        status: state,
                    });
                }
                _ => {
                    last_state = state;
                    hint = response.retry_after;
                }
            }
        }
        Err(WoError::OperationPending {
            operation: path.to_string(),
            status: last_state,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

#[must_use]
pub fn provisioning_state(body: &Value) -> Option<&str> {
    body.pointer("/properties/provisioningState")
        .and_then(Value::as_str)
}

fn is_terminal(state: &str) -> bool {
    matches!(state, "Succeeded" | "Failed" | "Canceled")
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let message = error.get("message").and_then(Value::as_str);
    let code = error.get("code").and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (None, Some(message)) => Some(message.to_string()),
        (Some(code), None) => Some(code.to_string()),
        (None, None) => None,
    }
}

/// Map a non-2xx response onto [`WoError::Remote`] using the ARM error envelope.
#[must_use]
pub fn remote_error(status: u16, body: &Value) -> WoError {
    let error = body.get("error");
    let code = error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| body.as_str().map(ToString::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));
    WoError::Remote {
        status,
        code,
        message,
    }
}
