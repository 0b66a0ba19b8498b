//! Capability records and reconciliation.
//!
//! A capability is a named tag attached to a context, target or solution
//! template. Records arriving from the control plane or from disk are
//! normalized into [`Capability`] right away; anything beyond `name` and
//! `description` (for example a deprecated `state` flag) is dropped.

use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, WoError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Normalize a loosely shaped record.
    ///
    /// Accepts `{"name": .., "description": ..}` objects (extra keys ignored)
    /// and bare strings. A missing description becomes empty.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::new(name.as_str(), "")),
            Value::Object(map) => {
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        WoError::Validation(format!("capability record has no name: {value}"))
                    })?;
                let description = map
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(Self::new(name, description))
            }
            other => Err(WoError::Validation(format!(
                "capability record must be an object or string, got {other}"
            ))),
        }
    }

    /// Normalize every element of a JSON array.
    pub fn list_from_value(value: &Value) -> Result<Vec<Self>> {
        let items = value.as_array().ok_or_else(|| {
            WoError::Validation("capability list must be a JSON array".to_string())
        })?;
        items.iter().map(Self::from_value).collect()
    }
}

/// What happened to each input record during [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub kept: usize,
    pub added: Vec<String>,
    pub rejected: Vec<String>,
    pub skipped_existing: Vec<String>,
}

/// Merge `incoming` into `existing`, keyed by name.
///
/// Existing records keep their order and description; incoming records are
/// appended only if their name is non-empty and unseen. Empty or repeated
/// names in either list are dropped.
pub fn reconcile(existing: &[Capability], incoming: &[Capability]) -> Result<Vec<Capability>> {
    reconcile_with_report(existing, incoming).map(|(merged, _)| merged)
}

pub fn reconcile_with_report(
    existing: &[Capability],
    incoming: &[Capability],
) -> Result<(Vec<Capability>, ReconcileReport)> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut report = ReconcileReport::default();

    for (index, cap) in existing.iter().enumerate() {
        if !cap.name.is_empty() && seen.insert(cap.name.as_str()) {
            merged.push(Capability::new(cap.name.as_str(), cap.description.as_str()));
            report.kept += 1;
        } else {
            debug!(index, name = %cap.name, "skipped existing capability (empty or duplicate)");
            report.skipped_existing.push(cap.name.clone());
        }
    }

    for (index, cap) in incoming.iter().enumerate() {
        if !cap.name.is_empty() && seen.insert(cap.name.as_str()) {
            debug!(index, name = %cap.name, "added capability");
            merged.push(Capability::new(cap.name.as_str(), cap.description.as_str()));
            report.added.push(cap.name.clone());
        } else {
            debug!(index, name = %cap.name, "rejected incoming capability (empty or duplicate)");
            report.rejected.push(cap.name.clone());
        }
    }

    let limit = existing.len() + incoming.len();
    if merged.len() > limit {
        return Err(WoError::Invariant(format!(
            "merged {} capabilities from {} existing and {} incoming",
            merged.len(),
            existing.len(),
            incoming.len()
        )));
    }
    if let Some(position) = merged.iter().position(|cap| cap.name.is_empty()) {
        return Err(WoError::Invariant(format!(
            "merged capability at index {position} has an empty name"
        )));
    }

    info!(
        existing = existing.len(),
        incoming = incoming.len(),
        merged = merged.len(),
        added = report.added.len(),
        rejected = report.rejected.len(),
        "reconciled capabilities"
    );
    Ok((merged, report))
}

/// Generate a fresh capability such as `sdkexamples-soap-4821`.
pub fn generate<R: Rng>(rng: &mut R, prefix: &str, kinds: &[String]) -> Result<Capability> {
    if kinds.is_empty() {
        return Err(WoError::Config(
            "context.capability_kinds must not be empty".to_string(),
        ));
    }
    let kind = &kinds[rng.random_range(0..kinds.len())];
    let suffix: u32 = rng.random_range(1000..=9999);
    let capability = Capability::new(
        format!("{prefix}-{kind}-{suffix}"),
        format!("SDK generated {kind} manufacturing capability"),
    );
    debug!(name = %capability.name, "generated capability");
    Ok(capability)
}

/// Write the capability list as a pretty JSON array, replacing the file.
pub fn save(path: &Path, capabilities: &[Capability]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string_pretty(capabilities)?;
    std::fs::write(path, payload)?;
    info!(path = %path.display(), count = capabilities.len(), "saved capabilities");
    Ok(())
}

/// Read and normalize a capability list from a JSON file.
pub fn load(path: &Path) -> Result<Vec<Capability>> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    Capability::list_from_value(&value)
}
