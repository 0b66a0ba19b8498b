use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dynconfig::ConfigValue;
use crate::error::{Result, WoError};
use crate::retry::RetryPolicy;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2025-06-01";
pub const DEFAULT_CONFIGURATION_API_VERSION: &str = "2024-06-01-preview";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub configuration: ConfigurationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        Self::load_with_env(explicit_path, project_root, &env)
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    pub fn load_with_env(
        explicit_path: Option<&Path>,
        project_root: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| env("WO_CONFIG").map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(project_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides(env)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a complete document, as the layered loader would for a single file.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config = Self::default();
        let patch: ConfigPatch = toml::from_str(raw)?;
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("wo/config.toml"))
    }

    fn load_project(project_root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&project_root.join("wo.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| WoError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| WoError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.azure {
            self.azure.merge(patch);
        }
        if let Some(patch) = patch.context {
            self.context.merge(patch);
        }
        if let Some(patch) = patch.resources {
            self.resources.merge(patch);
        }
        if let Some(patch) = patch.retry {
            self.retry.merge(patch);
        }
        if let Some(patch) = patch.polling {
            self.polling.merge(patch);
        }
        if let Some(patch) = patch.state {
            self.state.merge(patch);
        }
        if let Some(patch) = patch.configuration {
            self.configuration.merge(patch);
        }
        if let Some(patch) = patch.auth {
            self.auth.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = env("AZURE_SUBSCRIPTION_ID").filter(|v| !v.trim().is_empty()) {
            self.azure.subscription_id = Some(value);
        }
        if let Some(value) = env("WO_SUBSCRIPTION_ID") {
            self.azure.subscription_id = Some(value);
        }
        if let Some(value) = env("WO_RESOURCE_GROUP") {
            self.azure.resource_group = value;
        }
        if let Some(value) = env("WO_LOCATION") {
            self.azure.location = value;
        }
        if let Some(value) = env("WO_ENDPOINT") {
            self.azure.endpoint = value;
        }
        if let Some(value) = env("WO_TOKEN_SCOPE") {
            self.azure.token_scope = value;
        }
        if let Some(value) = env("WO_API_VERSION") {
            self.azure.api_version = value;
        }
        if let Some(value) = env("WO_CUSTOM_LOCATION") {
            self.azure.custom_location = Some(value);
        }

        if let Some(value) = env("WO_CONTEXT_NAME") {
            self.context.name = value;
        }
        if let Some(value) = env("WO_CONTEXT_RESOURCE_GROUP") {
            self.context.resource_group = value;
        }
        if let Some(value) = env_duration(env, "WO_CONTEXT_PROPAGATION_WAIT")? {
            self.context.propagation_wait = value;
        }

        if let Some(value) = env("WO_TARGET_NAME") {
            self.resources.target_name = value;
        }
        if let Some(value) = env("WO_NAME_PREFIX") {
            self.resources.name_prefix = value;
        }

        if let Some(value) = env_duration(env, "WO_POLL_INTERVAL")? {
            self.polling.interval = value;
        }
        if let Some(value) = env_u32(env, "WO_POLL_MAX_POLLS")? {
            self.polling.max_polls = value;
        }

        if let Some(value) = env("WO_VERSION_FILE") {
            self.state.version_file = PathBuf::from(value);
        }
        if let Some(value) = env("WO_CAPABILITIES_FILE") {
            self.state.capabilities_file = PathBuf::from(value);
        }

        if let Some(values) = env_list(env, "WO_AUTH_SOURCES") {
            self.auth.sources = values;
        }
        if let Some(value) = env("AZURE_AUTHORITY_HOST").filter(|v| !v.trim().is_empty()) {
            self.auth.authority_host = value;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.retry.context.policy()?;
        self.retry.solution_template.policy()?;
        self.retry.target.policy()?;
        self.retry.lifecycle.policy()?;
        if self.polling.max_polls == 0 {
            return Err(WoError::Config("polling.max_polls must be at least 1".to_string()));
        }
        for source in &self.auth.sources {
            crate::auth::CredentialSource::parse(source)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub token_scope: String,
    #[serde(default)]
    pub api_version: String,
    /// Resource id of the custom location targets are bound to.
    #[serde(default)]
    pub custom_location: Option<String>,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            resource_group: "sdkexamples".to_string(),
            location: "eastus2euap".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_scope: format!("{DEFAULT_ENDPOINT}/.default"),
            api_version: DEFAULT_API_VERSION.to_string(),
            custom_location: None,
        }
    }
}

impl AzureConfig {
    pub fn require_subscription(&self) -> Result<&str> {
        self.subscription_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                WoError::MissingConfig(
                    "azure.subscription_id (or AZURE_SUBSCRIPTION_ID) is not set".to_string(),
                )
            })
    }

    pub fn require_custom_location(&self) -> Result<&str> {
        self.custom_location
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                WoError::MissingConfig(
                    "azure.custom_location (or WO_CUSTOM_LOCATION) is not set".to_string(),
                )
            })
    }

    fn merge(&mut self, patch: AzurePatch) {
        if let Some(value) = patch.subscription_id {
            self.subscription_id = Some(value);
        }
        if let Some(value) = patch.resource_group {
            self.resource_group = value;
        }
        if let Some(value) = patch.location {
            self.location = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = value;
        }
        if let Some(value) = patch.token_scope {
            self.token_scope = value;
        }
        if let Some(value) = patch.api_version {
            self.api_version = value;
        }
        if let Some(value) = patch.custom_location {
            self.custom_location = Some(value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hierarchy {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub hierarchies: Vec<Hierarchy>,
    #[serde(default)]
    pub capability_prefix: String,
    #[serde(default)]
    pub capability_kinds: Vec<String>,
    /// Capability used when nothing can be selected from the context.
    #[serde(default)]
    pub fallback_capability: String,
    #[serde(default, with = "humantime_serde")]
    pub propagation_wait: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: "Mehoopany-Context".to_string(),
            resource_group: "Mehoopany".to_string(),
            hierarchies: vec![
                Hierarchy {
                    name: "country".to_string(),
                    description: "Country level hierarchy".to_string(),
                },
                Hierarchy {
                    name: "region".to_string(),
                    description: "Regional level hierarchy".to_string(),
                },
                Hierarchy {
                    name: "factory".to_string(),
                    description: "Factory level hierarchy".to_string(),
                },
                Hierarchy {
                    name: "line".to_string(),
                    description: "Production line hierarchy".to_string(),
                },
            ],
            capability_prefix: "sdkexamples".to_string(),
            capability_kinds: vec!["shampoo".to_string(), "soap".to_string()],
            fallback_capability: "sdkexamples-soap".to_string(),
            propagation_wait: Duration::from_secs(30),
        }
    }
}

impl ContextConfig {
    fn merge(&mut self, patch: ContextPatch) {
        if let Some(value) = patch.name {
            self.name = value;
        }
        if let Some(value) = patch.resource_group {
            self.resource_group = value;
        }
        if let Some(value) = patch.hierarchies {
            self.hierarchies = value;
        }
        if let Some(value) = patch.capability_prefix {
            self.capability_prefix = value;
        }
        if let Some(value) = patch.capability_kinds {
            self.capability_kinds = value;
        }
        if let Some(value) = patch.fallback_capability {
            self.fallback_capability = value;
        }
        if let Some(value) = patch.propagation_wait {
            self.propagation_wait = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    pub repo: String,
    pub version: String,
    #[serde(default)]
    pub wait: bool,
    #[serde(default)]
    pub timeout: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            repo: "ghcr.io/eclipse-symphony/tests/helm/simple-chart".to_string(),
            version: "0.3.0".to_string(),
            wait: true,
            timeout: "5m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub name_prefix: String,
    #[serde(default)]
    pub solution_template_name: String,
    #[serde(default)]
    pub solution_template_description: String,
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub target_display_name: String,
    #[serde(default)]
    pub target_description: String,
    #[serde(default)]
    pub hierarchy_level: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub chart: ChartConfig,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            name_prefix: "sdkexamples".to_string(),
            solution_template_name: "sdkexamples-solution1".to_string(),
            solution_template_description: "This is Holtmelt Solution with random capabilities"
                .to_string(),
            target_name: "sdkbox-mk71".to_string(),
            target_display_name: "sdkbox-mk71".to_string(),
            target_description: "This is MK-71 Site with random capabilities".to_string(),
            hierarchy_level: "line".to_string(),
            app_name: "Hotmelt".to_string(),
            chart: ChartConfig::default(),
        }
    }
}

impl ResourcesConfig {
    fn merge(&mut self, patch: ResourcesPatch) {
        if let Some(value) = patch.name_prefix {
            self.name_prefix = value;
        }
        if let Some(value) = patch.solution_template_name {
            self.solution_template_name = value;
        }
        if let Some(value) = patch.solution_template_description {
            self.solution_template_description = value;
        }
        if let Some(value) = patch.target_name {
            self.target_name = value;
        }
        if let Some(value) = patch.target_display_name {
            self.target_display_name = value;
        }
        if let Some(value) = patch.target_description {
            self.target_description = value;
        }
        if let Some(value) = patch.hierarchy_level {
            self.hierarchy_level = value;
        }
        if let Some(value) = patch.app_name {
            self.app_name = value;
        }
        if let Some(value) = patch.chart {
            self.chart = value;
        }
    }
}

/// Attempts and first backoff delay for one call site.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
}

impl RetrySettings {
    const fn new(max_attempts: u32, initial_secs: u64) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(initial_secs),
        }
    }

    pub fn policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(self.max_attempts, self.initial_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_context_retry")]
    pub context: RetrySettings,
    #[serde(default = "default_template_retry")]
    pub solution_template: RetrySettings,
    #[serde(default = "default_target_retry")]
    pub target: RetrySettings,
    #[serde(default = "default_lifecycle_retry")]
    pub lifecycle: RetrySettings,
}

const fn default_context_retry() -> RetrySettings {
    RetrySettings::new(3, 30)
}

const fn default_template_retry() -> RetrySettings {
    RetrySettings::new(3, 30)
}

const fn default_target_retry() -> RetrySettings {
    RetrySettings::new(5, 60)
}

const fn default_lifecycle_retry() -> RetrySettings {
    RetrySettings::new(3, 30)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            context: default_context_retry(),
            solution_template: default_template_retry(),
            target: default_target_retry(),
            lifecycle: default_lifecycle_retry(),
        }
    }
}

impl RetryConfig {
    fn merge(&mut self, patch: RetryPatch) {
        if let Some(value) = patch.context {
            self.context.merge(value);
        }
        if let Some(value) = patch.solution_template {
            self.solution_template.merge(value);
        }
        if let Some(value) = patch.target {
            self.target.merge(value);
        }
        if let Some(value) = patch.lifecycle {
            self.lifecycle.merge(value);
        }
    }

    /// Apply the same settings to every call site.
    pub fn set_all(&mut self, settings: RetrySettings) {
        self.context = settings;
        self.solution_template = settings;
        self.target = settings;
        self.lifecycle = settings;
    }
}

impl RetrySettings {
    fn merge(&mut self, patch: RetrySettingsPatch) {
        if let Some(value) = patch.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = patch.initial_delay {
            self.initial_delay = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default, with = "humantime_serde")]
    pub interval: Duration,
    #[serde(default)]
    pub max_polls: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }
}

impl PollingConfig {
    fn merge(&mut self, patch: PollingPatch) {
        if let Some(value) = patch.interval {
            self.interval = value;
        }
        if let Some(value) = patch.max_polls {
            self.max_polls = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub version_file: PathBuf,
    #[serde(default)]
    pub capabilities_file: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            version_file: PathBuf::from("version.txt"),
            capabilities_file: PathBuf::from("context-capabilities.json"),
        }
    }
}

impl StateConfig {
    fn merge(&mut self, patch: StatePatch) {
        if let Some(value) = patch.version_file {
            self.version_file = value;
        }
        if let Some(value) = patch.capabilities_file {
            self.capabilities_file = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationConfig {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub version_name: String,
    /// Suffix appended to the target name to form the configuration name.
    #[serde(default)]
    pub config_name_suffix: String,
    #[serde(default)]
    pub values: BTreeMap<String, ConfigValue>,
}

impl Default for ConfigurationConfig {
    fn default() -> Self {
        let values = [
            ("ErrorThreshold", ConfigValue::Float(35.3)),
            (
                "HealthCheckEndpoint",
                ConfigValue::String("http://localhost:8080/health".to_string()),
            ),
            ("EnableLocalLog", ConfigValue::Bool(true)),
            (
                "AgentEndpoint",
                ConfigValue::String("http://localhost:8080/agent".to_string()),
            ),
            ("HealthCheckEnabled", ConfigValue::Bool(true)),
            (
                "ApplicationEndpoint",
                ConfigValue::String("http://localhost:8080/app".to_string()),
            ),
            ("TemperatureRangeMax", ConfigValue::Float(100.5)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Self {
            api_version: DEFAULT_CONFIGURATION_API_VERSION.to_string(),
            version_name: "version1".to_string(),
            config_name_suffix: "Config".to_string(),
            values,
        }
    }
}

impl ConfigurationConfig {
    fn merge(&mut self, patch: ConfigurationPatch) {
        if let Some(value) = patch.api_version {
            self.api_version = value;
        }
        if let Some(value) = patch.version_name {
            self.version_name = value;
        }
        if let Some(value) = patch.config_name_suffix {
            self.config_name_suffix = value;
        }
        if let Some(values) = patch.values {
            self.values = values;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Credential sources tried in order.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub authority_host: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                "environment".to_string(),
                "client_secret".to_string(),
                "azure_cli".to_string(),
            ],
            authority_host: "https://login.microsoftonline.com".to_string(),
        }
    }
}

impl AuthConfig {
    fn merge(&mut self, patch: AuthPatch) {
        if let Some(value) = patch.sources {
            self.sources = value;
        }
        if let Some(value) = patch.authority_host {
            self.authority_host = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub azure: Option<AzurePatch>,
    pub context: Option<ContextPatch>,
    pub resources: Option<ResourcesPatch>,
    pub retry: Option<RetryPatch>,
    pub polling: Option<PollingPatch>,
    pub state: Option<StatePatch>,
    pub configuration: Option<ConfigurationPatch>,
    pub auth: Option<AuthPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AzurePatch {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub endpoint: Option<String>,
    pub token_scope: Option<String>,
    pub api_version: Option<String>,
    pub custom_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ContextPatch {
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub hierarchies: Option<Vec<Hierarchy>>,
    pub capability_prefix: Option<String>,
    pub capability_kinds: Option<Vec<String>>,
    pub fallback_capability: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub propagation_wait: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResourcesPatch {
    pub name_prefix: Option<String>,
    pub solution_template_name: Option<String>,
    pub solution_template_description: Option<String>,
    pub target_name: Option<String>,
    pub target_display_name: Option<String>,
    pub target_description: Option<String>,
    pub hierarchy_level: Option<String>,
    pub app_name: Option<String>,
    pub chart: Option<ChartConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RetryPatch {
    pub context: Option<RetrySettingsPatch>,
    pub solution_template: Option<RetrySettingsPatch>,
    pub target: Option<RetrySettingsPatch>,
    pub lifecycle: Option<RetrySettingsPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RetrySettingsPatch {
    pub max_attempts: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub initial_delay: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PollingPatch {
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    pub max_polls: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StatePatch {
    pub version_file: Option<PathBuf>,
    pub capabilities_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigurationPatch {
    pub api_version: Option<String>,
    pub version_name: Option<String>,
    pub config_name_suffix: Option<String>,
    pub values: Option<BTreeMap<String, ConfigValue>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuthPatch {
    pub sources: Option<Vec<String>>,
    pub authority_host: Option<String>,
}

fn env_u32(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>> {
    match env(key) {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|err| WoError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_duration(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    match env(key) {
        Some(value) => humantime_serde::re::humantime::parse_duration(&value)
            .map(Some)
            .map_err(|err| WoError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_list(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<Vec<String>> {
    env(key).map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
