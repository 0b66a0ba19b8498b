//! wo auth - Verify that a token can be acquired

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::auth::{ChainedCredential, TokenCredential};
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Token scope to request (defaults to azure.token_scope)
    #[arg(long)]
    pub scope: Option<String>,
}

#[derive(Serialize)]
struct AuthReport {
    scope: String,
    sources: Vec<&'static str>,
    expires_at: Option<String>,
    subscription_id: Option<String>,
}

pub fn run(ctx: &AppContext, args: &AuthArgs) -> Result<()> {
    let env = |key: &str| std::env::var(key).ok();
    let chain = ChainedCredential::from_config(&ctx.config.auth, &env)?;
    let scope = args
        .scope
        .clone()
        .unwrap_or_else(|| ctx.config.azure.token_scope.clone());

    let token = chain.get_token(&scope)?;
    let report = AuthReport {
        scope,
        sources: chain.source_names(),
        expires_at: token.expires_at().map(|at| at.to_rfc3339()),
        subscription_id: ctx.config.azure.subscription_id.clone(),
    };

    if ctx.wants_json() {
        return emit_robot(&robot_ok(report));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Token acquired")
        .kv("Scope", &report.scope)
        .kv("Sources", &report.sources.join(", "))
        .kv(
            "Expires",
            report.expires_at.as_deref().unwrap_or("no expiry reported"),
        )
        .kv(
            "Subscription",
            report.subscription_id.as_deref().unwrap_or("(not set)"),
        );
    emit_human(&layout);
    Ok(())
}
