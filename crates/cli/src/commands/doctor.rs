//! Doctor command - validate configuration and show status

use anyhow::Result;
use chirp_adapters::store::SqlitePostStore;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::commands::services::rate_limit_policy;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    store: CheckResult,
    identity: CheckResult,
    ratelimit: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        store: CheckResult::error("Not checked"),
        identity: CheckResult::error("Not checked"),
        ratelimit: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    match AppConfig::load(config_path.as_deref()) {
        Ok(config) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            report.store = check_store(&config).await;
            report.identity = check_identity(&config);
            report.ratelimit = check_ratelimit(&config);
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {}", e));
        }
    }

    let checks = [
        &report.config,
        &report.store,
        &report.identity,
        &report.ratelimit,
    ];

    report.overall = if checks.iter().any(|c| c.is_error()) {
        "error".to_string()
    } else if checks.iter().all(|c| c.is_ok()) {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_store(config: &AppConfig) -> CheckResult {
    match config.store.provider.as_str() {
        "sqlite" => {
            let path = &config.store.db_path;
            match SqlitePostStore::new(path).await {
                Ok(store) => {
                    let result = match store.count().await {
                        Ok(count) => CheckResult::ok(format!(
                            "SQLite store at {} ({} posts)",
                            path.display(),
                            count
                        ))
                        .with_details(serde_json::json!({ "posts": count })),
                        Err(e) => CheckResult::error(format!("Failed to query posts: {}", e)),
                    };
                    store.close().await;
                    result
                }
                Err(e) => CheckResult::error(format!(
                    "Failed to open SQLite store at {}: {}",
                    path.display(),
                    e
                )),
            }
        }
        "memory" => CheckResult::warn("In-memory store, posts are lost on exit"),
        other => CheckResult::error(format!("Unknown store provider: {}", other)),
    }
}

fn check_identity(config: &AppConfig) -> CheckResult {
    match config.identity.provider.as_str() {
        "clerk" => check_env_set(
            &config.identity.clerk.secret_key_env,
            &format!("Provider: clerk, base_url: {}", config.identity.clerk.base_url),
        ),
        "stub" => CheckResult::warn("Provider: stub (every author id resolves to itself)"),
        other => CheckResult::error(format!("Unknown identity provider: {}", other)),
    }
}

fn check_ratelimit(config: &AppConfig) -> CheckResult {
    let policy = rate_limit_policy(config);
    if policy.capacity == 0 {
        return CheckResult::warn("Capacity is 0, every post will be rejected");
    }

    let summary = format!(
        "{} per {}s",
        policy.capacity,
        policy.window.as_secs()
    );

    match config.ratelimit.provider.as_str() {
        "upstash" => {
            let url = check_env_set(&config.ratelimit.upstash.url_env, "REST URL");
            if !url.is_ok() {
                return url;
            }
            check_env_set(
                &config.ratelimit.upstash.token_env,
                &format!("Provider: upstash, {}", summary),
            )
        }
        "memory" => CheckResult::warn(format!(
            "Provider: memory, {} (single process only)",
            summary
        )),
        other => CheckResult::error(format!("Unknown rate limit provider: {}", other)),
    }
}

/// Report whether an env var holds a value, without revealing it
fn check_env_set(env_var: &str, label: &str) -> CheckResult {
    if env_var.is_empty() {
        return CheckResult::error(format!("{}: no env var configured", label));
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!("{}, {} (set)", label, env_var)),
        _ => CheckResult::error(format!("{}, {} (not set)", label, env_var)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("chirp Doctor Report");
    println!("===================");
    println!();

    print_check("Config", &report.config);
    print_check("Post Store", &report.store);
    print_check("Identity Provider", &report.identity);
    print_check("Rate Limiter", &report.ratelimit);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
