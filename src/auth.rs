//! Bearer-token acquisition for the control plane.
//!
//! Credentials are tried in a configured order: a pre-issued token from the
//! environment, a service principal secret, then the Azure CLI. The first
//! source to produce a token wins and the token is cached per scope until
//! shortly before it expires.

use std::collections::HashMap;
use std::process::Command;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::{Result, WoError};

/// Printed when no credential source produced a token.
pub const AUTH_SETUP_HINT: &str = "\
Authentication setup:
  1. Service principal: set AZURE_CLIENT_ID, AZURE_TENANT_ID and AZURE_CLIENT_SECRET.
     See https://learn.microsoft.com/azure/active-directory/develop/howto-create-service-principal-portal
  2. Azure CLI: run `az login` (and `az account set --subscription <id>`).
  3. Azure PowerShell: run `Connect-AzAccount`, then export a token as AZURE_ACCESS_TOKEN.
Set AZURE_SUBSCRIPTION_ID or azure.subscription_id in wo.toml to pick the subscription.";

const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Still usable at `now` with the refresh margin applied. Tokens without
    /// an expiry never go stale.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_none_or(|expires| expires - TimeDelta::seconds(REFRESH_MARGIN_SECS) > now)
    }
}

pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    ClientSecret,
    AzureCli,
}

impl CredentialSource {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "environment" | "env" => Ok(Self::Environment),
            "client_secret" | "service_principal" => Ok(Self::ClientSecret),
            "azure_cli" | "cli" | "az" => Ok(Self::AzureCli),
            other => Err(WoError::Config(format!(
                "unknown auth source {other:?} (expected environment, client_secret or azure_cli)"
            ))),
        }
    }
}

/// Token handed over in `AZURE_ACCESS_TOKEN`.
#[derive(Debug, Clone)]
pub struct EnvironmentCredential {
    token: Option<String>,
}

impl EnvironmentCredential {
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            token: env("AZURE_ACCESS_TOKEN").filter(|t| !t.trim().is_empty()),
        }
    }
}

impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        self.token
            .as_ref()
            .map(|token| AccessToken::new(token.trim(), None))
            .ok_or_else(|| WoError::Auth("AZURE_ACCESS_TOKEN is not set".to_string()))
    }
}

/// OAuth2 client-credentials flow against the identity authority.
pub struct ClientSecretCredential {
    http: reqwest::blocking::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("wo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Build from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
    /// Returns `None` unless all three are present.
    pub fn from_lookup(
        authority_host: &str,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>> {
        let read = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        match (
            read("AZURE_TENANT_ID"),
            read("AZURE_CLIENT_ID"),
            read("AZURE_CLIENT_SECRET"),
        ) {
            (Some(tenant), Some(client), Some(secret)) => {
                Self::new(authority_host, tenant, client, secret).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            urlencoding::encode(&self.tenant_id)
        )
    }
}

impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "client_secret"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let body = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ]
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        let response = self
            .http
            .post(self.token_url())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(WoError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let parsed: TokenResponse = response.json()?;
        let expires_at = parsed
            .expires_in
            .map(|secs| Utc::now() + TimeDelta::seconds(secs));
        Ok(AccessToken::new(parsed.access_token, expires_at))
    }
}

/// Token from a logged-in Azure CLI session.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenOutput {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure_cli"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let az = which::which("az")
            .map_err(|_| WoError::Auth("Azure CLI (az) not found on PATH".to_string()))?;
        let resource = scope.trim_end_matches("/.default");

        let output = Command::new(az)
            .args(["account", "get-access-token", "--resource", resource, "--output", "json"])
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WoError::Auth(format!(
                "az account get-access-token failed: {}",
                stderr.trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken> {
    let parsed: CliTokenOutput = serde_json::from_slice(stdout)?;
    let expires_at = parsed
        .expires_on
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    Ok(AccessToken::new(parsed.access_token, expires_at))
}

/// Tries each credential in turn and caches the winner's token per scope.
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl ChainedCredential {
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Chain in the order given by `auth.sources`.
    pub fn from_config(config: &AuthConfig, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::new();
        for raw in &config.sources {
            match CredentialSource::parse(raw)? {
                CredentialSource::Environment => {
                    sources.push(Arc::new(EnvironmentCredential::from_lookup(env)));
                }
                CredentialSource::ClientSecret => {
                    if let Some(credential) =
                        ClientSecretCredential::from_lookup(&config.authority_host, env)?
                    {
                        sources.push(Arc::new(credential));
                    } else {
                        debug!("client_secret source skipped: AZURE_TENANT_ID/CLIENT_ID/CLIENT_SECRET incomplete");
                    }
                }
                CredentialSource::AzureCli => sources.push(Arc::new(AzureCliCredential)),
            }
        }
        Ok(Self::new(sources))
    }

    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let now = Utc::now();
        let cached = self
            .cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(scope).filter(|t| t.is_fresh_at(now)).cloned());
        if let Some(token) = cached {
            debug!(scope, "using cached token");
            return Ok(token);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(scope) {
                Ok(token) => {
                    info!(source = source.name(), scope, "acquired access token");
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(scope.to_string(), token.clone());
                    }
                    return Ok(token);
                }
                Err(err) => {
                    warn!(source = source.name(), error = %err, "credential source failed");
                    failures.push(format!("{}: {err}", source.name()));
                }
            }
        }

        if failures.is_empty() {
            return Err(WoError::Auth("no credential sources configured".to_string()));
        }
        Err(WoError::Auth(format!(
            "no credential source produced a token ({})",
            failures.join("; ")
        )))
    }
}
