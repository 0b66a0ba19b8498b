use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::error::{Result, WoError};

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    Partial { completed: usize, failed: usize },
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

/// Success that carried warnings along the way.
pub fn robot_with_warnings<T: Serialize>(data: T, warnings: Vec<String>) -> RobotResponse<T> {
    let mut response = robot_ok(data);
    if !warnings.is_empty() {
        response.status = RobotStatus::Partial {
            completed: 1,
            failed: warnings.len(),
        };
    }
    response.warnings = warnings;
    response
}

/// Error document printed on stdout in robot mode.
#[must_use]
pub fn robot_error(err: &WoError) -> serde_json::Value {
    let mut value = serde_json::json!({
        "error": true,
        "code": err.code(),
        "message": err.to_string(),
    });
    if matches!(err, WoError::Auth(_)) {
        value["hint"] = serde_json::Value::String(crate::auth::AUTH_SETUP_HINT.to_string());
    }
    value
}

pub fn emit_robot<T: Serialize>(response: &RobotResponse<T>) -> Result<()> {
    emit_json(response)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 22,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(String::new());
        self.lines.push(style(text).bold().to_string());
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines
            .push(format!("{} {value}", style(padded).dim()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn warnings(&mut self, warnings: &[String]) -> &mut Self {
        if warnings.is_empty() {
            return self;
        }
        self.section("Warnings");
        for warning in warnings {
            self.lines
                .push(format!("{} {warning}", style("!").yellow().bold()));
        }
        self
    }

    #[must_use]
    pub fn build(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: &HumanLayout) {
    println!("{}", layout.build());
}
