//! Credential checks, token issuance and account recovery.
//!
//! Every method is synchronous (bcrypt and the repository both block), so
//! handlers run them on the blocking pool.

use std::sync::Arc;

use axum::{http::StatusCode, Json};
use chrono::{Duration, NaiveDateTime};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        jwt::JwtConfig,
        lockout::LockoutPolicy,
        password::{PasswordPolicy, PasswordPolicyError, PasswordService},
    },
    error::{ApiError, FieldError},
    models::{new_id, now, Session, User, UserStatus},
    store::{RepoError, Store},
    telemetry::{record_auth_attempt, AuthOutcome},
};

/// Lifetime of a password reset token.
pub const RESET_TOKEN_LIFETIME_MINS: i64 = 30;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is pending email verification")]
    PendingVerification,
    #[error("email address is not verified")]
    EmailNotVerified,
    #[error("account is suspended")]
    Suspended,
    #[error("account is locked until {until}")]
    Locked { until: NaiveDateTime },
    #[error("password does not meet the policy")]
    PasswordPolicy(Vec<PasswordPolicyError>),
    #[error("user already exists")]
    UserExists,
    #[error("refresh token is invalid or expired")]
    InvalidRefreshToken,
    #[error("verification token is invalid")]
    InvalidVerificationToken,
    #[error("reset token is invalid or expired")]
    InvalidResetToken,
    #[error("user not found")]
    UserNotFound,
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<AuthError> for (StatusCode, Json<ApiError>) {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE, "INVALID_CREDENTIALS")
            }
            AuthError::PendingVerification => (
                StatusCode::UNAUTHORIZED,
                Json(
                    ApiError::new(
                        "Please verify your email address before logging in",
                        "ACCOUNT_PENDING",
                    )
                    .with_verification_flag(),
                ),
            ),
            AuthError::EmailNotVerified => (
                StatusCode::UNAUTHORIZED,
                Json(
                    ApiError::new("Email address has not been verified", "EMAIL_NOT_VERIFIED")
                        .with_verification_flag(),
                ),
            ),
            AuthError::Suspended => {
                ApiError::unauthorized("Account has been suspended", "ACCOUNT_SUSPENDED")
            }
            AuthError::Locked { until } => (
                StatusCode::UNAUTHORIZED,
                Json(
                    ApiError::new(
                        "Account temporarily locked due to too many failed login attempts",
                        "ACCOUNT_LOCKED",
                    )
                    .with_locked_until(until),
                ),
            ),
            AuthError::PasswordPolicy(violations) => {
                let mut body = ApiError::new(
                    "Password does not meet requirements",
                    "PASSWORD_POLICY_VIOLATION",
                );
                body.errors = Some(
                    violations
                        .into_iter()
                        .map(|v| FieldError {
                            field: "password".to_string(),
                            message: v.to_string(),
                        })
                        .collect(),
                );
                (StatusCode::BAD_REQUEST, Json(body))
            }
            AuthError::UserExists => {
                ApiError::conflict("User with this email already exists", "USER_EXISTS")
            }
            AuthError::InvalidRefreshToken => {
                ApiError::unauthorized("Invalid or expired refresh token", "INVALID_REFRESH_TOKEN")
            }
            AuthError::InvalidVerificationToken => ApiError::bad_request(
                "Invalid or already used verification token",
                "INVALID_VERIFICATION_TOKEN",
            ),
            AuthError::InvalidResetToken => {
                ApiError::bad_request("Invalid or expired reset token", "INVALID_RESET_TOKEN")
            }
            AuthError::UserNotFound => ApiError::not_found("User not found", "USER_NOT_FOUND"),
            AuthError::Hashing(e) => {
                error!(error = %e, "Password hashing failed");
                ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
            }
            AuthError::Signing(e) => {
                error!(error = %e, "Token generation failed");
                ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
            }
            AuthError::Repo(e) => e.into(),
        }
    }
}

/// Login input after boundary validation.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub two_factor_code: Option<String>,
    pub remember_me: bool,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Client details stored alongside a refresh session.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub access_max_age: i64,
    pub refresh_max_age: i64,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// Raw verification token, only handed back when tokens are exposed.
    pub verification_token: Option<String>,
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// 256 random bits, hex encoded.
pub fn generate_opaque_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt: Arc<JwtConfig>,
    policy: PasswordPolicy,
    lockout: LockoutPolicy,
    hash_cost: u32,
    expose_tokens: bool,
    /// Hash checked against when the email is unknown, so every login pays
    /// for one bcrypt verify.
    dummy_hash: Arc<OnceCell<Option<String>>>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        jwt: Arc<JwtConfig>,
        policy: PasswordPolicy,
        lockout: LockoutPolicy,
        hash_cost: u32,
        expose_tokens: bool,
    ) -> Self {
        Self {
            store,
            jwt,
            policy,
            lockout,
            hash_cost,
            expose_tokens,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    fn verify_against_dummy(&self, password: &str) {
        let hash = self.dummy_hash.get_or_init(|| {
            let placeholder = generate_opaque_token();
            PasswordService::hash_password_with_cost(&placeholder, self.hash_cost)
                .map_err(|e| error!(error = %e, "Failed to build placeholder hash"))
                .ok()
        });
        if let Some(hash) = hash {
            let _ = PasswordService::verify_password(password, hash);
        }
    }

    pub fn login(&self, creds: &Credentials, meta: &ClientMeta) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(&creds.email);

        let Some(user) = self.store.find_user_by_email(&email)? else {
            self.verify_against_dummy(&creds.password);
            warn!(email = %email, "Login attempt for unknown email");
            record_auth_attempt("login", AuthOutcome::InvalidCredentials);
            return Err(AuthError::InvalidCredentials);
        };

        match user.status {
            UserStatus::Pending => {
                record_auth_attempt("login", AuthOutcome::AccountPending);
                return Err(AuthError::PendingVerification);
            }
            UserStatus::Suspended => {
                warn!(user_id = %user.id, "Login attempt on suspended account");
                record_auth_attempt("login", AuthOutcome::AccountSuspended);
                return Err(AuthError::Suspended);
            }
            UserStatus::Active => {}
        }

        if !user.email_verified {
            record_auth_attempt("login", AuthOutcome::EmailNotVerified);
            return Err(AuthError::EmailNotVerified);
        }

        let at = now();
        if let Some(until) = self.lockout.check(&user, at) {
            warn!(user_id = %user.id, locked_until = %until, "Login attempt on locked account");
            record_auth_attempt("login", AuthOutcome::AccountLocked);
            return Err(AuthError::Locked { until });
        }

        if !PasswordService::verify_password(&creds.password, &user.password_hash)? {
            let failure = self.lockout.register_failure(&user, at);
            self.store
                .record_failed_login(&user.id, failure.attempts, failure.locked_until)?;
            warn!(user_id = %user.id, "Login failed: wrong password");
            record_auth_attempt("login", AuthOutcome::InvalidCredentials);
            return Err(AuthError::InvalidCredentials);
        }

        if creds.two_factor_code.is_some() && user.two_factor_secret.is_none() {
            debug!(user_id = %user.id, "Ignoring two-factor code for account without 2FA");
        }

        self.store.record_successful_login(&user.id, at)?;
        let user = User {
            failed_login_attempts: 0,
            locked_until: None,
            last_login: Some(at),
            ..user
        };

        let issued = self.issue(user, creds.remember_me, meta, at)?;
        info!(user_id = %issued.user.id, role = %issued.user.role, "User logged in");
        record_auth_attempt("login", AuthOutcome::Success);
        Ok(issued)
    }

    /// Exchanges a live refresh token for a new pair. The old session is deleted.
    pub fn refresh(&self, token: &str, meta: &ClientMeta) -> Result<IssuedSession, AuthError> {
        let claims = self.jwt.verify_refresh_token(token).map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            record_auth_attempt("refresh", AuthOutcome::TokenInvalid);
            AuthError::InvalidRefreshToken
        })?;

        let token_hash = hash_token(token);
        let session = self
            .store
            .find_session(&token_hash)?
            .filter(|s| s.user_id == claims.sub)
            .ok_or_else(|| {
                record_auth_attempt("refresh", AuthOutcome::TokenInvalid);
                AuthError::InvalidRefreshToken
            })?;

        self.store.delete_session(&token_hash)?;

        let at = now();
        if session.expires_at <= at {
            record_auth_attempt("refresh", AuthOutcome::TokenInvalid);
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .store
            .find_user_by_id(&claims.sub)?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if user.status == UserStatus::Suspended {
            record_auth_attempt("refresh", AuthOutcome::AccountSuspended);
            return Err(AuthError::Suspended);
        }

        let remember_me = claims.exp - claims.iat > self.jwt.refresh_token_expiry;
        let issued = self.issue(user, remember_me, meta, at)?;
        info!(user_id = %issued.user.id, "Session refreshed");
        record_auth_attempt("refresh", AuthOutcome::Success);
        Ok(issued)
    }

    /// Deletes the session behind the refresh token, if there is one.
    pub fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token {
            if self.store.delete_session(&hash_token(token))? {
                info!("Session ended");
            }
        }
        Ok(())
    }

    pub fn register(&self, account: &NewAccount) -> Result<Registration, AuthError> {
        let violations = self.policy.violations(&account.password);
        if !violations.is_empty() {
            return Err(AuthError::PasswordPolicy(violations));
        }

        let email = normalize_email(&account.email);
        if self.store.find_user_by_email(&email)?.is_some() {
            record_auth_attempt("register", AuthOutcome::InvalidCredentials);
            return Err(AuthError::UserExists);
        }

        let password_hash =
            PasswordService::hash_password_with_cost(&account.password, self.hash_cost)?;
        let verification_token = generate_opaque_token();

        let mut user = User::new(
            email,
            password_hash,
            account.first_name.trim().to_string(),
            account.last_name.trim().to_string(),
        );
        user.phone = account
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        user.verification_token_hash = Some(hash_token(&verification_token));

        match self.store.insert_user(&user) {
            Ok(()) => {}
            Err(RepoError::Conflict(_)) => return Err(AuthError::UserExists),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, "User registered");
        record_auth_attempt("register", AuthOutcome::Success);

        Ok(Registration {
            user,
            verification_token: self.expose_tokens.then_some(verification_token),
        })
    }

    pub fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let user = self
            .store
            .find_user_by_verification_token(&hash_token(token))?
            .ok_or(AuthError::InvalidVerificationToken)?;

        self.store.mark_email_verified(&user.id)?;
        info!(user_id = %user.id, "Email verified");

        self.store
            .find_user_by_id(&user.id)?
            .ok_or(AuthError::UserNotFound)
    }

    /// Unknown emails succeed silently. Returns the raw token when exposed.
    pub fn request_password_reset(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email)? else {
            debug!(email = %email, "Password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_opaque_token();
        let expires_at = now() + Duration::minutes(RESET_TOKEN_LIFETIME_MINS);
        self.store
            .set_reset_token(&user.id, &hash_token(&token), expires_at)?;

        info!(user_id = %user.id, "Password reset token issued");
        Ok(self.expose_tokens.then_some(token))
    }

    /// Sets the new password and ends every session of the user.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<User, AuthError> {
        let violations = self.policy.violations(new_password);
        if !violations.is_empty() {
            return Err(AuthError::PasswordPolicy(violations));
        }

        let at = now();
        let user = self
            .store
            .find_user_by_reset_token(&hash_token(token))?
            .filter(|u| u.reset_token_expires_at.is_some_and(|exp| exp > at))
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = PasswordService::hash_password_with_cost(new_password, self.hash_cost)?;
        self.store.update_password(&user.id, &password_hash)?;
        let ended = self.store.delete_user_sessions(&user.id)?;

        info!(user_id = %user.id, sessions_ended = ended, "Password reset");
        Ok(user)
    }

    pub fn current_user(&self, user_id: &str) -> Result<User, AuthError> {
        self.store
            .find_user_by_id(user_id)?
            .ok_or(AuthError::UserNotFound)
    }

    fn issue(
        &self,
        user: User,
        remember_me: bool,
        meta: &ClientMeta,
        at: NaiveDateTime,
    ) -> Result<IssuedSession, AuthError> {
        let access_token = self
            .jwt
            .generate_access_token(&user.id, &user.email, user.role)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let refresh_token = self
            .jwt
            .generate_refresh_token(&user.id, &user.email, user.role, remember_me)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        let refresh_max_age = self.jwt.refresh_lifetime(remember_me);
        self.store.create_session(&Session {
            id: new_id(),
            user_id: user.id.clone(),
            refresh_token_hash: hash_token(&refresh_token),
            user_agent: meta.user_agent.clone(),
            ip_address: meta.ip_address.clone(),
            expires_at: at + Duration::seconds(refresh_max_age),
            created_at: at,
        })?;

        Ok(IssuedSession {
            user,
            access_token,
            refresh_token,
            access_max_age: self.jwt.access_token_expiry,
            refresh_max_age,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::{MemoryStore, SessionRepository, UserRepository};
    use jwt_simple::prelude::Ed25519KeyPair;

    const TEST_COST: u32 = 4;

    fn service_with(store: Arc<MemoryStore>) -> AuthService {
        AuthService::new(
            store,
            Arc::new(JwtConfig::from_key_pair(Ed25519KeyPair::generate())),
            PasswordPolicy::complex(8),
            LockoutPolicy::new(3, 15),
            TEST_COST,
            true,
        )
    }

    fn active_user(store: &MemoryStore, email: &str, password: &str, role: Role) -> User {
        let hash = PasswordService::hash_password_with_cost(password, TEST_COST).unwrap();
        let mut user = User::new(email.into(), hash, "Test".into(), "User".into());
        user.status = UserStatus::Active;
        user.email_verified = true;
        user.role = role;
        store.insert_user(&user).unwrap();
        user
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
            two_factor_code: None,
            remember_me: false,
        }
    }

    fn account(email: &str) -> NewAccount {
        NewAccount {
            email: email.into(),
            password: "Str0ng!Pass".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: Some("+254700000000".into()),
        }
    }

    #[test]
    fn test_login_issues_tokens_with_stored_role() {
        let store = Arc::new(MemoryStore::new());
        let user = active_user(&store, "admin@akibeks.co.ke", "Admin123!", Role::Admin);
        let service = service_with(store.clone());

        let issued = service
            .login(&creds("Admin@Akibeks.co.ke ", "Admin123!"), &ClientMeta::default())
            .unwrap();

        assert_eq!(issued.user.id, user.id);
        let claims = service.jwt.verify_access_token(&issued.access_token).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(issued.access_max_age, 900);
        assert_eq!(issued.refresh_max_age, 604_800);
        assert!(store
            .find_session(&hash_token(&issued.refresh_token))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_wrong_password_and_unknown_email_look_the_same() {
        let store = Arc::new(MemoryStore::new());
        active_user(&store, "jane@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store);

        let wrong = service
            .login(&creds("jane@example.com", "wrong"), &ClientMeta::default())
            .unwrap_err();
        let unknown = service
            .login(&creds("nobody@example.com", "wrong"), &ClientMeta::default())
            .unwrap_err();

        let (s1, Json(b1)) = <(StatusCode, Json<ApiError>)>::from(wrong);
        let (s2, Json(b2)) = <(StatusCode, Json<ApiError>)>::from(unknown);
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(
            serde_json::to_string(&b1).unwrap(),
            serde_json::to_string(&b2).unwrap()
        );
        assert_eq!(b1.message, INVALID_CREDENTIALS_MESSAGE);
    }

    #[test]
    fn test_unknown_email_still_runs_bcrypt() {
        let service = service_with(Arc::new(MemoryStore::new()));
        assert!(service.dummy_hash.get().is_none());

        let err = service
            .login(&creds("nobody@example.com", "Str0ng!Pass"), &ClientMeta::default())
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        let hash = service.dummy_hash.get().unwrap().as_deref().unwrap();
        assert!(hash.starts_with("$2"));
        assert!(!PasswordService::verify_password("Str0ng!Pass", hash).unwrap());
    }

    #[test]
    fn test_status_gate() {
        let store = Arc::new(MemoryStore::new());
        let pending = active_user(&store, "pending@example.com", "Str0ng!Pass", Role::User);
        store
            .set_user_status(&pending.id, UserStatus::Pending)
            .unwrap();
        let suspended = active_user(&store, "suspended@example.com", "Str0ng!Pass", Role::User);
        store
            .set_user_status(&suspended.id, UserStatus::Suspended)
            .unwrap();
        let mut unverified = User::new(
            "unverified@example.com".into(),
            PasswordService::hash_password_with_cost("Str0ng!Pass", TEST_COST).unwrap(),
            "U".into(),
            "V".into(),
        );
        unverified.status = UserStatus::Active;
        store.insert_user(&unverified).unwrap();

        let service = service_with(store);
        let meta = ClientMeta::default();

        assert!(matches!(
            service.login(&creds("pending@example.com", "Str0ng!Pass"), &meta),
            Err(AuthError::PendingVerification)
        ));
        assert!(matches!(
            service.login(&creds("suspended@example.com", "Str0ng!Pass"), &meta),
            Err(AuthError::Suspended)
        ));
        assert!(matches!(
            service.login(&creds("unverified@example.com", "Str0ng!Pass"), &meta),
            Err(AuthError::EmailNotVerified)
        ));
    }

    #[test]
    fn test_lockout_after_repeated_failures() {
        let store = Arc::new(MemoryStore::new());
        let user = active_user(&store, "lock@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store.clone());
        let meta = ClientMeta::default();

        for _ in 0..3 {
            assert!(matches!(
                service.login(&creds("lock@example.com", "nope"), &meta),
                Err(AuthError::InvalidCredentials)
            ));
        }

        let stored = store.find_user_by_id(&user.id).unwrap().unwrap();
        assert!(stored.locked_until.is_some());

        // Correct password is still refused while locked.
        assert!(matches!(
            service.login(&creds("lock@example.com", "Str0ng!Pass"), &meta),
            Err(AuthError::Locked { .. })
        ));
    }

    #[test]
    fn test_successful_login_resets_failure_counter() {
        let store = Arc::new(MemoryStore::new());
        let user = active_user(&store, "reset@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store.clone());
        let meta = ClientMeta::default();

        let _ = service.login(&creds("reset@example.com", "nope"), &meta);
        assert_eq!(
            store
                .find_user_by_id(&user.id)
                .unwrap()
                .unwrap()
                .failed_login_attempts,
            1
        );

        service
            .login(&creds("reset@example.com", "Str0ng!Pass"), &meta)
            .unwrap();
        let stored = store.find_user_by_id(&user.id).unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.last_login.is_some());
    }

    #[test]
    fn test_remember_me_extends_refresh_session() {
        let store = Arc::new(MemoryStore::new());
        active_user(&store, "remember@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store);

        let mut input = creds("remember@example.com", "Str0ng!Pass");
        input.remember_me = true;
        let issued = service.login(&input, &ClientMeta::default()).unwrap();
        assert_eq!(issued.refresh_max_age, 2_592_000);

        let rotated = service
            .refresh(&issued.refresh_token, &ClientMeta::default())
            .unwrap();
        assert_eq!(rotated.refresh_max_age, 2_592_000);
    }

    #[test]
    fn test_refresh_rotates_session() {
        let store = Arc::new(MemoryStore::new());
        active_user(&store, "rotate@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store);
        let meta = ClientMeta::default();

        let issued = service
            .login(&creds("rotate@example.com", "Str0ng!Pass"), &meta)
            .unwrap();
        let rotated = service.refresh(&issued.refresh_token, &meta).unwrap();
        assert_ne!(rotated.refresh_token, issued.refresh_token);

        assert!(matches!(
            service.refresh(&issued.refresh_token, &meta),
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            service.refresh(&issued.access_token, &meta),
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn test_logout_deletes_session() {
        let store = Arc::new(MemoryStore::new());
        active_user(&store, "bye@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store);
        let meta = ClientMeta::default();

        let issued = service
            .login(&creds("bye@example.com", "Str0ng!Pass"), &meta)
            .unwrap();
        service.logout(Some(&issued.refresh_token)).unwrap();
        assert!(service.refresh(&issued.refresh_token, &meta).is_err());
        assert!(service.logout(None).is_ok());
    }

    #[test]
    fn test_register_creates_pending_user() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone());

        let registration = service.register(&account("New@Example.com")).unwrap();
        assert_eq!(registration.user.email, "new@example.com");
        assert_eq!(registration.user.status, UserStatus::Pending);
        assert!(!registration.user.email_verified);
        assert!(registration.verification_token.is_some());

        let stored = store.find_user_by_email("new@example.com").unwrap().unwrap();
        assert_ne!(stored.password_hash, "Str0ng!Pass");
    }

    #[test]
    fn test_duplicate_email_rejected_before_hashing() {
        let store = Arc::new(MemoryStore::new());
        service_with(store.clone())
            .register(&account("dup@example.com"))
            .unwrap();

        // An invalid bcrypt cost would fail if hashing were attempted.
        let mut service = service_with(store);
        service.hash_cost = 2;

        assert!(matches!(
            service.register(&account("DUP@example.com")),
            Err(AuthError::UserExists)
        ));
    }

    #[test]
    fn test_register_enforces_password_policy() {
        let service = service_with(Arc::new(MemoryStore::new()));
        let mut weak = account("weak@example.com");
        weak.password = "password".into();

        match service.register(&weak) {
            Err(AuthError::PasswordPolicy(v)) => assert!(v.len() >= 2),
            other => panic!("expected policy violation, got {:?}", other.map(|r| r.user.id)),
        }
    }

    #[test]
    fn test_verify_email_activates_account() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store);

        let registration = service.register(&account("verify@example.com")).unwrap();
        let token = registration.verification_token.unwrap();

        let user = service.verify_email(&token).unwrap();
        assert!(user.email_verified);
        assert_eq!(user.status, UserStatus::Active);

        assert!(matches!(
            service.verify_email(&token),
            Err(AuthError::InvalidVerificationToken)
        ));
        service
            .login(&creds("verify@example.com", "Str0ng!Pass"), &ClientMeta::default())
            .unwrap();
    }

    #[test]
    fn test_password_reset_flow() {
        let store = Arc::new(MemoryStore::new());
        active_user(&store, "forgot@example.com", "Str0ng!Pass", Role::User);
        let service = service_with(store);
        let meta = ClientMeta::default();

        let issued = service
            .login(&creds("forgot@example.com", "Str0ng!Pass"), &meta)
            .unwrap();

        let token = service
            .request_password_reset("forgot@example.com")
            .unwrap()
            .unwrap();
        service.reset_password(&token, "N3w!Password").unwrap();

        assert!(service.refresh(&issued.refresh_token, &meta).is_err());
        assert!(service
            .login(&creds("forgot@example.com", "N3w!Password"), &meta)
            .is_ok());
        assert!(matches!(
            service.reset_password(&token, "An0ther!Pass"),
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[test]
    fn test_password_reset_unknown_email_is_silent() {
        let service = service_with(Arc::new(MemoryStore::new()));
        assert!(service
            .request_password_reset("ghost@example.com")
            .unwrap()
            .is_none());
    }
}
