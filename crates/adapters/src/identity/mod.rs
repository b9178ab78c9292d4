//! Identity provider adapters

mod clerk;

pub use clerk::{ClerkIdentityProvider, DEFAULT_BASE_URL as CLERK_DEFAULT_BASE_URL};

use async_trait::async_trait;
use chirp_domain::{AuthorProfile, IdentityError, IdentityProvider};
use std::collections::{BTreeSet, HashMap};

/// Offline identity provider.
///
/// Resolves a fixed set of profiles. In echo mode every requested id
/// resolves, using the id itself as the username.
pub struct StubIdentityProvider {
    profiles: HashMap<String, AuthorProfile>,
    echo: bool,
}

impl StubIdentityProvider {
    /// Resolve only the given profiles
    pub fn with_profiles(profiles: Vec<AuthorProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
            echo: false,
        }
    }

    /// Resolve every id
    pub fn echo() -> Self {
        Self {
            profiles: HashMap::new(),
            echo: true,
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn resolve_authors(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, AuthorProfile>, IdentityError> {
        let resolved = ids
            .iter()
            .filter_map(|id| match self.profiles.get(id) {
                Some(profile) => Some(profile.clone()),
                None if self.echo => Some(AuthorProfile {
                    id: id.clone(),
                    username: Some(id.clone()),
                    profile_image_url: String::new(),
                }),
                None => None,
            })
            .map(|profile| (profile.id.clone(), profile))
            .collect();

        Ok(resolved)
    }
}
