use std::sync::Arc;

use async_trait::async_trait;
use docwell_core::{AppError, AppResult, UserId, UserIdentity};

/// Minimum password length accepted for new accounts.
pub const PASSWORD_MIN_LENGTH: usize = 10;

/// Maximum password length to allow passphrases while bounding hash cost.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Stored user account used by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Stable user identifier.
    pub id: UserId,
    /// Unique lowercase email address.
    pub email: String,
    /// Display name shown in sessions.
    pub display_name: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Deactivated accounts cannot authenticate.
    pub is_active: bool,
}

impl UserAccount {
    /// Returns the session identity for this account.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(
            self.id,
            self.display_name.clone(),
            Some(self.email.clone()),
        )
    }
}

/// Repository port for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds an account by normalized email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserAccount>>;

    /// Finds an account by id.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserAccount>>;

    /// Persists a new account.
    async fn insert(&self, account: &UserAccount) -> AppResult<()>;

    /// Counts existing accounts; used to guard bootstrap.
    async fn count(&self) -> AppResult<u64>;
}

/// Port for password hashing and verification.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Input payload for account creation.
#[derive(Debug, Clone)]
pub struct NewUserInput {
    /// Email address; normalized to lowercase.
    pub email: String,
    /// Display name shown in sessions.
    pub display_name: String,
    /// Plaintext password; hashed before storage.
    pub password: String,
}

/// Application service for the session layer's account concerns.
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            repository,
            password_hasher,
        }
    }

    /// Verifies credentials and returns the session identity.
    ///
    /// Unknown emails, wrong passwords, and deactivated accounts all fail
    /// with the same message so the endpoint does not leak which accounts
    /// exist.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<UserIdentity> {
        let denied = || AppError::Unauthorized("invalid credentials".to_owned());

        let account = self
            .repository
            .find_by_email(email.trim().to_lowercase().as_str())
            .await?
            .ok_or_else(denied)?;

        if !account.is_active {
            return Err(denied());
        }

        let verified = self
            .password_hasher
            .verify_password(password, &account.password_hash)?;
        if !verified {
            return Err(denied());
        }

        Ok(account.identity())
    }

    /// Creates a new account with a validated password.
    pub async fn create_user(&self, input: NewUserInput) -> AppResult<UserAccount> {
        let email = normalize_email(&input.email)?;
        validate_password(&input.password)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "an account with email '{email}' already exists"
            )));
        }

        let display_name = input.display_name.trim().to_owned();
        if display_name.is_empty() {
            return Err(AppError::Validation(
                "display name must not be empty".to_owned(),
            ));
        }

        let account = UserAccount {
            id: UserId::new(),
            email,
            display_name,
            password_hash: self.password_hasher.hash_password(&input.password)?,
            is_active: true,
        };

        self.repository.insert(&account).await?;
        Ok(account)
    }

    /// Returns whether any account exists yet.
    pub async fn has_accounts(&self) -> AppResult<bool> {
        Ok(self.repository.count().await? > 0)
    }

    /// Loads the session identity for a user id.
    pub async fn identity_for(&self, user_id: UserId) -> AppResult<UserIdentity> {
        let account = self
            .repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}'")))?;

        Ok(account.identity())
    }
}

fn normalize_email(value: &str) -> AppResult<String> {
    let email = value.trim().to_lowercase();

    let parts: Vec<&str> = email.splitn(2, '@').collect();
    let valid = parts.len() == 2
        && !parts[0].is_empty()
        && parts[1].contains('.')
        && !parts[1].starts_with('.')
        && email.len() <= 254;
    if !valid {
        return Err(AppError::Validation(format!(
            "'{value}' is not a valid email address"
        )));
    }

    Ok(email)
}

fn validate_password(password: &str) -> AppResult<()> {
    let length = password.chars().count();
    if length < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }
    if length > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "password must not exceed {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    Ok(())
}
