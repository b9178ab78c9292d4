//! Clerk Backend API adapter for resolving post authors

use async_trait::async_trait;
use chirp_domain::{AuthorProfile, IDENTITY_BATCH_LIMIT, IdentityError, IdentityProvider};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.clerk.com";

/// Identity provider backed by Clerk's user list endpoint
pub struct ClerkIdentityProvider {
    client: Client,
    secret_key: SecretString,
    base_url: String,
}

impl ClerkIdentityProvider {
    pub fn new(secret_key: SecretString, timeout: Duration) -> Self {
        Self::with_base_url(secret_key, DEFAULT_BASE_URL.to_string(), timeout)
    }

    pub fn with_base_url(secret_key: SecretString, base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one batch of at most `IDENTITY_BATCH_LIMIT` users
    async fn fetch_users(&self, ids: &[&String]) -> Result<Vec<ClerkUser>, IdentityError> {
        let url = format!("{}/v1/users", self.base_url);

        let mut query: Vec<(&str, String)> = ids
            .iter()
            .map(|id| ("user_id", id.to_string()))
            .collect();
        query.push(("limit", IDENTITY_BATCH_LIMIT.to_string()));

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .query(&query)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::Auth("Invalid Clerk secret key".to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Api(format!(
                "Failed to list users ({}): {}",
                status, body
            )));
        }

        response.json().await.map_err(request_error)
    }
}

fn request_error(error: reqwest::Error) -> IdentityError {
    if error.is_timeout() {
        IdentityError::Timeout
    } else if error.is_decode() {
        IdentityError::Api(error.to_string())
    } else {
        IdentityError::Network(error.to_string())
    }
}

#[derive(Deserialize)]
struct ClerkUser {
    id: String,
    username: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    /// Deprecated by Clerk in favour of `image_url`
    #[serde(default)]
    profile_image_url: Option<String>,
}

impl From<ClerkUser> for AuthorProfile {
    fn from(user: ClerkUser) -> Self {
        AuthorProfile {
            id: user.id,
            username: user.username,
            profile_image_url: user
                .image_url
                .or(user.profile_image_url)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl IdentityProvider for ClerkIdentityProvider {
    async fn resolve_authors(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, AuthorProfile>, IdentityError> {
        let ids: Vec<&String> = ids.iter().collect();
        let mut profiles = HashMap::with_capacity(ids.len());

        for batch in ids.chunks(IDENTITY_BATCH_LIMIT) {
            tracing::debug!(count = batch.len(), "Looking up users in Clerk");

            let users = self.fetch_users(batch).await?;
            profiles.extend(users.into_iter().map(|user| {
                let profile = AuthorProfile::from(user);
                (profile.id.clone(), profile)
            }));
        }

        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> ClerkIdentityProvider {
        ClerkIdentityProvider::with_base_url(
            SecretString::new("sk_test".into()),
            server.uri(),
            Duration::from_secs(5),
        )
    }

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_authors_projects_profiles() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .and(header("Authorization", "Bearer sk_test"))
            .and(query_param("user_id", "user_a"))
            .and(query_param("user_id", "user_b"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "user_a",
                    "username": "alice",
                    "image_url": "https://img.clerk.com/a.png",
                    "first_name": "Alice"
                },
                {
                    "id": "user_b",
                    "username": null,
                    "profile_image_url": "https://img.clerk.com/b.png"
                }
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let profiles = provider(&mock_server)
            .resolve_authors(&ids(&["user_a", "user_b"]))
            .await
            .unwrap();

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["user_a"].username.as_deref(), Some("alice"));
        assert_eq!(
            profiles["user_a"].profile_image_url,
            "https://img.clerk.com/a.png"
        );
        assert_eq!(profiles["user_b"].username, None);
        assert_eq!(
            profiles["user_b"].profile_image_url,
            "https://img.clerk.com/b.png"
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_are_absent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let profiles = provider(&mock_server)
            .resolve_authors(&ids(&["ghost"]))
            .await
            .unwrap();

        assert!(profiles.is_empty());
    }

    #[tokio::test]
    async fn test_large_input_is_split_into_batches() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(2)
            .mount(&mock_server)
            .await;

        let many: BTreeSet<String> = (0..150).map(|i| format!("user_{}", i)).collect();
        provider(&mock_server).resolve_authors(&many).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&mock_server)
            .await;

        let profiles = provider(&mock_server)
            .resolve_authors(&BTreeSet::new())
            .await
            .unwrap();
        assert!(profiles.is_empty());
    }

    #[tokio::test]
    async fn test_auth_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .resolve_authors(&ids(&["user_a"]))
            .await;

        assert!(matches!(result, Err(IdentityError::Auth(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_not_an_empty_result() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .resolve_authors(&ids(&["user_a"]))
            .await;

        assert!(matches!(result, Err(IdentityError::Api(msg)) if msg.contains("maintenance")));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let provider = ClerkIdentityProvider::with_base_url(
            SecretString::new("sk_test".into()),
            mock_server.uri(),
            Duration::from_millis(100),
        );

        let result = provider.resolve_authors(&ids(&["user_a"])).await;

        assert!(matches!(result, Err(IdentityError::Timeout)));
    }
}
