//! Builds the posts service from configuration

use anyhow::{Context, Result, bail};
use chirp_adapters::{
    identity::{ClerkIdentityProvider, StubIdentityProvider},
    ratelimit::{InMemoryRateLimiter, UpstashRateLimiter},
    store::{InMemoryPostStore, SqlitePostStore},
};
use chirp_domain::{
    IdentityProvider, PostStore, RateLimitPolicy, RateLimiter,
    usecases::{PostsError, PostsService},
};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

pub(crate) type AppPostsService = PostsService<dyn PostStore, dyn IdentityProvider, dyn RateLimiter>;

pub(crate) async fn build_service(config: &AppConfig) -> Result<AppPostsService> {
    let store = build_store(config).await?;
    let identity = build_identity_provider(config)?;
    let rate_limiter = build_rate_limiter(config)?;

    Ok(PostsService::new(store, identity, rate_limiter))
}

pub(crate) async fn build_store(config: &AppConfig) -> Result<Arc<dyn PostStore>> {
    match config.store.provider.as_str() {
        "sqlite" => {
            let store = SqlitePostStore::new(&config.store.db_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to open SQLite post store at {}",
                        config.store.db_path.display()
                    )
                })?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemoryPostStore::new())),
        other => bail!("Unknown store provider: {}", other),
    }
}

pub(crate) fn build_identity_provider(config: &AppConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.identity.provider.as_str() {
        "clerk" => {
            let secret_key = load_secret(&config.identity.clerk.secret_key_env, "clerk")?;
            Ok(Arc::new(ClerkIdentityProvider::with_base_url(
                secret_key,
                config.identity.clerk.base_url.clone(),
                Duration::from_secs(config.identity.timeout_secs),
            )))
        }
        "stub" => Ok(Arc::new(StubIdentityProvider::echo())),
        other => bail!("Unknown identity provider: {}", other),
    }
}

pub(crate) fn build_rate_limiter(config: &AppConfig) -> Result<Arc<dyn RateLimiter>> {
    let policy = rate_limit_policy(config);

    match config.ratelimit.provider.as_str() {
        "upstash" => {
            let url = load_env(&config.ratelimit.upstash.url_env, "upstash")?;
            let token = load_secret(&config.ratelimit.upstash.token_env, "upstash")?;
            let limiter = UpstashRateLimiter::new(
                url,
                token,
                policy,
                Duration::from_secs(config.ratelimit.timeout_secs),
            )
            .with_prefix(config.ratelimit.prefix.clone());
            Ok(Arc::new(limiter))
        }
        "memory" => Ok(Arc::new(InMemoryRateLimiter::new(policy))),
        other => bail!("Unknown rate limit provider: {}", other),
    }
}

pub(crate) fn rate_limit_policy(config: &AppConfig) -> RateLimitPolicy {
    RateLimitPolicy::new(
        config.ratelimit.capacity,
        Duration::from_secs(config.ratelimit.window_secs),
    )
}

pub(crate) fn load_env(env_var: &str, provider: &str) -> Result<String> {
    if env_var.trim().is_empty() {
        bail!("No env var configured for provider {}", provider);
    }

    let value = std::env::var(env_var)
        .with_context(|| format!("Missing env var {} for provider {}", env_var, provider))?;

    if value.trim().is_empty() {
        bail!("Env var {} is empty for provider {}", env_var, provider);
    }

    Ok(value)
}

pub(crate) fn load_secret(env_var: &str, provider: &str) -> Result<SecretString> {
    load_env(env_var, provider).map(|value| SecretString::new(value.into()))
}

/// Attach the caller-facing code so scripts can tell client errors from outages
pub(crate) fn posts_failure(error: PostsError) -> anyhow::Error {
    let code = error.code();
    if code.is_client_error() {
        tracing::debug!(code = %code, error = %error, "Request rejected");
    } else {
        tracing::error!(code = %code, retryable = error.is_retryable(), error = %error, "Request failed");
    }
    anyhow::anyhow!("[{}] {}", code, error)
}
