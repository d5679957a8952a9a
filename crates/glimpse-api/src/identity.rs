use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use glimpse_db::models::NewUser;
use glimpse_db::{Database, StoreError, StoreResult};
use glimpse_types::models::{SessionIdentity, User};

use crate::blocking;
use crate::error::ApiError;
use crate::token::TokenCodec;

pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const LOGIN_FAILED: &str = "Failed to authenticate with Google.";

/// The subset of the provider's token-introspection payload we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub email: String,
    /// Google sends this as the string "true" or "false".
    pub email_verified: String,
    #[serde(default)]
    pub given_name: String,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate an identity assertion and return the profile it vouches for.
    async fn verify_assertion(&self, assertion: &str) -> anyhow::Result<ProviderProfile>;
}

/// Google's tokeninfo endpoint.
pub struct GoogleTokenInfo {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTokenInfo {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleTokenInfo {
    async fn verify_assertion(&self, assertion: &str) -> anyhow::Result<ProviderProfile> {
        let profile = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", assertion)])
            .send()
            .await?
            .error_for_status()?
            .json::<ProviderProfile>()
            .await?;

        Ok(profile)
    }
}

/// Turns a provider assertion into a local user and a session token.
pub struct IdentityProvisioner {
    db: Arc<Database>,
    provider: Arc<dyn IdentityProvider>,
    tokens: Arc<TokenCodec>,
}

impl IdentityProvisioner {
    pub fn new(
        db: Arc<Database>,
        provider: Arc<dyn IdentityProvider>,
        tokens: Arc<TokenCodec>,
    ) -> Self {
        Self {
            db,
            provider,
            tokens,
        }
    }

    pub async fn login_with_assertion(&self, assertion: &str) -> Result<String, ApiError> {
        let profile = self.provider.verify_assertion(assertion).await.map_err(|e| {
            warn!("Identity provider rejected assertion: {:#}", e);
            ApiError::Auth(LOGIN_FAILED.into())
        })?;

        if profile.email_verified != "true" {
            return Err(ApiError::Auth("email not verified".into()));
        }

        let db = self.db.clone();
        let user = blocking(move || find_or_create_user(&db, &profile))
            .await
            .map_err(|_| ApiError::Auth(LOGIN_FAILED.into()))?
            .map_err(|e| {
                error!("Failed to provision user: {}", e);
                ApiError::Auth(LOGIN_FAILED.into())
            })?;

        let identity = SessionIdentity {
            id: user.id,
            username: user.username,
        };

        self.tokens.issue(&identity).map_err(|e| {
            error!("Failed to issue session token for {}: {}", identity.id, e);
            ApiError::Auth(LOGIN_FAILED.into())
        })
    }
}

fn find_or_create_user(db: &Database, profile: &ProviderProfile) -> StoreResult<User> {
    if let Some(row) = db.get_user_by_email(&profile.email)? {
        return row.into_user();
    }

    let id = Uuid::new_v4().to_string();
    let full_name = full_name(&profile.given_name, profile.family_name.as_deref());

    let created = db.create_user(&NewUser {
        id: &id,
        username: username_from_email(&profile.email),
        full_name: &full_name,
        email: &profile.email,
        profile_image_url: profile.picture.as_deref(),
        is_verified: true,
    });

    match created {
        Ok(()) => info!("Created user {} for {}", id, profile.email),
        // A concurrent first login for the same email got there first.
        Err(StoreError::UniqueViolation) => {
            if let Some(row) = db.get_user_by_email(&profile.email)? {
                return row.into_user();
            }
            return Err(StoreError::UniqueViolation);
        }
        Err(e) => return Err(e),
    }

    db.get_user_by_id(&id)?.ok_or(StoreError::NotFound)?.into_user()
}

fn username_from_email(email: &str) -> &str {
    email.split_once('@').map_or(email, |(local, _)| local)
}

fn full_name(given: &str, family: Option<&str>) -> String {
    match family {
        Some(family) if !family.is_empty() => format!("{} {}", given, family),
        _ => given.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeProvider {
        profiles: HashMap<String, ProviderProfile>,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn verify_assertion(&self, assertion: &str) -> anyhow::Result<ProviderProfile> {
            self.profiles
                .get(assertion)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("tokeninfo returned 400 for {}", assertion))
        }
    }

    fn profile(email: &str, verified: &str, family: Option<&str>) -> ProviderProfile {
        ProviderProfile {
            email: email.into(),
            email_verified: verified.into(),
            given_name: "Ada".into(),
            family_name: family.map(str::to_string),
            picture: Some("https://img.example/ada.png".into()),
        }
    }

    fn setup() -> (IdentityProvisioner, Arc<Database>, Arc<TokenCodec>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let tokens = Arc::new(TokenCodec::new("test-secret"));
        let provider = FakeProvider {
            profiles: HashMap::from([
                ("ada-1".to_string(), profile("ada@example.com", "true", Some("Lovelace"))),
                ("ada-2".to_string(), profile("ada@example.com", "true", Some("Lovelace"))),
                ("solo".to_string(), profile("solo@example.com", "true", None)),
                ("unverified".to_string(), profile("eve@example.com", "false", None)),
            ]),
        };
        let provisioner = IdentityProvisioner::new(db.clone(), Arc::new(provider), tokens.clone());
        (provisioner, db, tokens)
    }

    #[tokio::test]
    async fn first_login_creates_user() {
        let (provisioner, db, tokens) = setup();

        let token = provisioner.login_with_assertion("ada-1").await.unwrap();
        let identity = tokens.verify(&token).unwrap();
        assert_eq!(identity.username, "ada");

        let user = db
            .get_user_by_email("ada@example.com")
            .unwrap()
            .unwrap()
            .into_user()
            .unwrap();
        assert_eq!(user.id, identity.id);
        assert_eq!(user.full_name, "Ada Lovelace");
        assert_eq!(
            user.profile_image_url.as_deref(),
            Some("https://img.example/ada.png")
        );
        assert!(user.is_verified);
    }

    #[tokio::test]
    async fn repeat_login_reuses_user() {
        let (provisioner, _db, tokens) = setup();

        let first = provisioner.login_with_assertion("ada-1").await.unwrap();
        let second = provisioner.login_with_assertion("ada-2").await.unwrap();

        assert_eq!(
            tokens.verify(&first).unwrap().id,
            tokens.verify(&second).unwrap().id
        );
    }

    #[tokio::test]
    async fn family_name_is_optional() {
        let (provisioner, db, _) = setup();
        provisioner.login_with_assertion("solo").await.unwrap();

        let user = db.get_user_by_email("solo@example.com").unwrap().unwrap();
        assert_eq!(user.full_name, "Ada");
        assert_eq!(user.username, "solo");
    }

    #[tokio::test]
    async fn unverified_email_is_rejected_without_creating_user() {
        let (provisioner, db, _) = setup();

        let err = provisioner.login_with_assertion("unverified").await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(ref msg) if msg == "email not verified"));
        assert!(db.get_user_by_email("eve@example.com").unwrap().is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_generic() {
        let (provisioner, _, _) = setup();

        let err = provisioner.login_with_assertion("forged").await.unwrap_err();
        match err {
            ApiError::Auth(msg) => {
                assert_eq!(msg, LOGIN_FAILED);
                assert!(!msg.contains("400"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_logins_share_one_user() {
        let dir = std::env::temp_dir().join(format!("glimpse_login_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = Arc::new(Database::open(&dir.join("glimpse.db")).unwrap());
        let tokens = Arc::new(TokenCodec::new("test-secret"));
        let provider = FakeProvider {
            profiles: HashMap::from([(
                "ada".to_string(),
                profile("ada@example.com", "true", Some("Lovelace")),
            )]),
        };
        let provisioner = Arc::new(IdentityProvisioner::new(
            db.clone(),
            Arc::new(provider),
            tokens.clone(),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provisioner = provisioner.clone();
                tokio::spawn(async move { provisioner.login_with_assertion("ada").await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            ids.push(tokens.verify(&token).unwrap().id);
        }
        assert!(ids.iter().all(|id| *id == ids[0]));

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 1);

        drop(provisioner);
        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn derives_username_from_local_part() {
        assert_eq!(username_from_email("ada.l@example.com"), "ada.l");
        assert_eq!(username_from_email("no-at-sign"), "no-at-sign");
    }
}
