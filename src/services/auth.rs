//! Registration, login and bearer token verification.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Merchant, NewUser, Role, User};
use crate::domain::value_objects::Money;
use crate::store::Store;
use crate::{Result, ShopError};

type HmacSha256 = Hmac<Sha256>;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

// =============================================================================
// Passwords
// =============================================================================

#[instrument(name = "auth::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(ShopError::Validation("Password cannot be empty".into()));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            ShopError::Internal(format!("password hashing failed: {e}"))
        })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
#[instrument(name = "auth::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, password: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        ShopError::Internal(format!("invalid stored password hash: {e}"))
    })?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ShopError::Internal(format!("password verification failed: {e}"))),
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
}

/// Issues and checks `base64url(claims).base64url(hmac_sha256(claims))` tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: chrono::Duration,
}

impl TokenSigner {
    pub fn new(secret: SecretString, ttl: chrono::Duration) -> Self { Self { secret, ttl } }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| ShopError::Internal(format!("invalid signing key: {e}")))
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String> { self.issue_at(user_id, Utc::now()) }

    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims { sub: user_id, exp: (now + self.ttl).timestamp() };
        let payload = serde_json::to_vec(&claims).map_err(|e| ShopError::Internal(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Returns the user id the token was issued for.
    pub fn verify(&self, token: &str) -> Result<Uuid> { self.verify_at(token, Utc::now()) }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid> {
        let rejected = || ShopError::Unauthenticated(INVALID_CREDENTIALS.into());
        let (payload, signature) = token.split_once('.').ok_or_else(rejected)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| rejected())?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| rejected())?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(rejected)?;
        if claims.exp <= now.timestamp() {
            debug!(user_id = %claims.sub, "token expired");
            return Err(rejected());
        }
        Ok(claims.sub)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Account view returned to clients; never carries the password hash.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            balance: user.balance,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    signer: TokenSigner,
    initial_balance: Money,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, signer: TokenSigner, initial_balance: Money) -> Self {
        Self { store, signer, initial_balance }
    }

    /// Creates the account, and for merchants the shop profile in the same write.
    #[instrument(skip(self, registration), fields(username = %registration.username, role = %registration.role))]
    pub async fn register(&self, registration: Registration) -> Result<UserProfile> {
        let password_hash = hash_password(&registration.password)?;
        let user = User::register(NewUser {
            username: registration.username,
            email: registration.email,
            password_hash,
            role: registration.role,
            balance: self.initial_balance,
        });
        let merchant = user.is_merchant().then(|| Merchant::for_user(&user));
        self.store.insert_user(&user, merchant.as_ref()).await?;
        info!(user_id = %user.id, "account registered");
        Ok(UserProfile::from(&user))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let wrong = || ShopError::Unauthenticated("Incorrect username or password".into());
        let user = self.store.find_user_by_username(username).await?.ok_or_else(wrong)?;
        if !verify_password(&user.password_hash, password)? {
            return Err(wrong());
        }
        Ok(LoginOutcome {
            access_token: self.signer.issue(user.id)?,
            token_type: "bearer",
            user: UserProfile::from(&user),
        })
    }

    /// Resolves a bearer token to the live account record.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let user_id = self.signer.verify(token)?;
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ShopError::Unauthenticated(INVALID_CREDENTIALS.into()))
    }
}
