//! Shared test utilities for wo.

pub mod fixtures;
pub mod logging;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::auth::{AccessToken, TokenCredential};
use crate::error::{Result, WoError};
use crate::retry::Sleeper;

/// Table-driven test case structure.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
}

/// Run table-driven tests, stopping at the first mismatch.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F) -> std::result::Result<(), String>
where
    I: std::fmt::Debug + Clone,
    E: std::fmt::Debug + PartialEq,
    F: Fn(I) -> E,
{
    for case in cases {
        let start = std::time::Instant::now();
        println!("[TEST] Running: {}", case.name);
        println!("[TEST] Input: {:?}", case.input);

        let actual = test_fn(case.input.clone());
        let elapsed = start.elapsed();

        if actual != case.expected {
            return Err(format!(
                "Test '{}' failed: expected {:?}, got {:?}",
                case.name, case.expected, actual
            ));
        }
        println!("[TEST] PASSED: {} ({:?})\n", case.name, elapsed);
    }
    Ok(())
}

/// Sleeper that records requested delays instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

/// Credential returning a fixed token, or failing when built with [`StaticTokenCredential::failing`].
#[derive(Debug)]
pub struct StaticTokenCredential {
    token: Option<String>,
    calls: AtomicUsize,
    scopes: Mutex<HashMap<String, usize>>,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            calls: AtomicUsize::new(0),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn calls_for(&self, scope: &str) -> usize {
        self.scopes
            .lock()
            .ok()
            .and_then(|scopes| scopes.get(scope).copied())
            .unwrap_or(0)
    }
}

impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &'static str {
        "static"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut scopes) = self.scopes.lock() {
            *scopes.entry(scope.to_string()).or_insert(0) += 1;
        }
        self.token
            .as_ref()
            .map(|token| AccessToken::new(token.clone(), None))
            .ok_or_else(|| WoError::Auth("static credential has no token".to_string()))
    }
}
