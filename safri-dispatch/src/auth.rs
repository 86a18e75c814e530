use std::sync::Arc;

use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use serde_json::json;
use thiserror::Error;

use safri_store::{changes, RealtimeStore, StoreError};

use crate::{
    paths,
    util::{is_valid_cnic, is_valid_email, is_valid_phone_number, random_string},
    AccountData, DriverData, Role, SessionData,
};

/// Accounts, sessions, and driver PIN login.
///
/// Account records live in the realtime store under their role's
/// collection; sessions live under `Sessions/{token}`.
pub struct Auth<S> {
    store: Arc<S>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Invalid phone number")]
    InvalidPhoneNumber,
    #[error("Invalid CNIC")]
    InvalidCnic,
    #[error("Email already in use")]
    EmailInUse,
    #[error("User not found")]
    UserNotFound,
    #[error("Wrong password")]
    WrongPassword,
    #[error("Invalid PIN")]
    InvalidPin,
    #[error("Session does not exist or has expired")]
    InvalidSession,
    #[error("HashError: {0}")]
    HashError(String),
    /// Something else went wrong with the store
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct NewAccount {
    pub user_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug)]
pub struct NewDriverProfile {
    pub cnic: String,
    pub first_name: String,
    pub last_name: String,
}

impl<S> Auth<S>
where
    S: RealtimeStore,
{
    const SESSION_DURATION_IN_DAYS: i64 = 7;

    pub fn new(store: &Arc<S>) -> Self {
        Self {
            store: store.clone(),
            argon: Argon2::default(),
        }
    }

    /// Creates an account under its role's collection.
    pub async fn register(&self, new_account: NewAccount) -> Result<AccountData, AuthError> {
        if !is_valid_email(&new_account.email) {
            return Err(AuthError::InvalidEmail);
        }

        if !is_valid_phone_number(&new_account.phone_number) {
            return Err(AuthError::InvalidPhoneNumber);
        }

        let taken = self
            .account_by_email(new_account.role, &new_account.email)
            .await?
            .is_some();

        if taken {
            return Err(AuthError::EmailInUse);
        }

        let account = AccountData {
            uid: random_string(28),
            user_name: new_account.user_name,
            email: new_account.email,
            phone_number: new_account.phone_number,
            password_hash: self.hash_password(&new_account.password)?,
            photo_url: None,
            is_online: false,
            role: new_account.role,
        };

        let path = paths::account(account.role, &account.uid);
        let value = serde_json::to_value(&account).map_err(|source| StoreError::Decode {
            path: path.clone(),
            source,
        })?;

        self.store.set(&path, value).await?;

        Ok(account)
    }

    /// Logs in an account, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let account = self
            .account_by_email(credentials.role, &credentials.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let stored = PasswordHash::parse(&account.password_hash, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored)
            .map_err(|_| AuthError::WrongPassword)?;

        self.create_session(&account.uid, account.role).await
    }

    /// Logs a driver in by PIN. The PIN doubles as the driver's key, so a
    /// miss is indistinguishable from a wrong credential.
    pub async fn driver_login(&self, pin: &str) -> Result<(SessionData, DriverData), AuthError> {
        self.clear_expired().await;

        let snapshot = self.store.get(&paths::driver(pin)).await?;

        if !snapshot.exists() {
            return Err(AuthError::InvalidPin);
        }

        let driver: DriverData = snapshot.decode()?;
        let session = self.create_session(pin, Role::Driver).await?;

        Ok((session, driver))
    }

    /// Fills in the personal details a driver provides on first login.
    pub async fn complete_driver_profile(
        &self,
        pin: &str,
        profile: NewDriverProfile,
    ) -> Result<DriverData, AuthError> {
        if !is_valid_cnic(&profile.cnic) {
            return Err(AuthError::InvalidCnic);
        }

        let driver = self.driver(pin).await?;

        let details = changes([
            ("CNIC", json!(profile.cnic)),
            ("firstName", json!(profile.first_name)),
            ("lastName", json!(profile.last_name)),
        ]);

        // The owner's mirror of the driver record is kept in step
        self.store
            .update(&paths::driver(pin), details.clone())
            .await?;
        self.store
            .update(
                &paths::owner_driver(&driver.rent_a_car_uid, pin),
                details,
            )
            .await?;

        self.driver(pin).await
    }

    /// Returns a session if it exists and has not expired
    pub async fn session(&self, token: &str) -> Result<SessionData, AuthError> {
        let snapshot = self.store.get(&paths::session(token)).await?;

        if !snapshot.exists() {
            return Err(AuthError::InvalidSession);
        }

        let session: SessionData = snapshot.decode()?;

        if session.expires_at < Utc::now() {
            self.store.remove(&paths::session(token)).await?;

            return Err(AuthError::InvalidSession);
        }

        Ok(session)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.store.remove(&paths::session(token)).await?;

        Ok(())
    }

    pub async fn account(&self, role: Role, uid: &str) -> Result<AccountData, AuthError> {
        let snapshot = self.store.get(&paths::account(role, uid)).await?;

        if !snapshot.exists() {
            return Err(AuthError::UserNotFound);
        }

        Ok(snapshot.decode()?)
    }

    pub async fn driver(&self, pin: &str) -> Result<DriverData, AuthError> {
        let snapshot = self.store.get(&paths::driver(pin)).await?;

        if !snapshot.exists() {
            return Err(AuthError::InvalidPin);
        }

        Ok(snapshot.decode()?)
    }

    pub async fn change_password(
        &self,
        role: Role,
        uid: &str,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let account = self.account(role, uid).await?;

        let stored = PasswordHash::parse(&account.password_hash, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(current.as_bytes(), &stored)
            .map_err(|_| AuthError::WrongPassword)?;

        self.store
            .update(
                &paths::account(role, uid),
                changes([("passwordHash", json!(self.hash_password(new)?))]),
            )
            .await?;

        Ok(())
    }

    async fn account_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<AccountData>, AuthError> {
        let snapshot = self.store.get(&paths::accounts(role)).await?;

        Ok(snapshot
            .decode_children::<AccountData>()
            .into_iter()
            .find(|account| account.email == email))
    }

    async fn create_session(&self, uid: &str, role: Role) -> Result<SessionData, AuthError> {
        let session = SessionData {
            token: random_string(32),
            uid: uid.to_string(),
            role,
            expires_at: Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS),
        };

        let path = paths::session(&session.token);
        let value = serde_json::to_value(&session).map_err(|source| StoreError::Decode {
            path: path.clone(),
            source,
        })?;

        self.store.set(&path, value).await?;

        Ok(session)
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string())
    }

    async fn clear_expired(&self) {
        let Ok(snapshot) = self.store.get(&paths::sessions()).await else {
            return;
        };

        let now = Utc::now();
        let expired: Vec<_> = snapshot
            .decode_children::<SessionData>()
            .into_iter()
            .filter(|session| session.expires_at < now)
            .collect();

        for session in expired {
            let _ = self.store.remove(&paths::session(&session.token)).await;
        }
    }
}

/// Email-and-password credentials, scoped to the collection the role's
/// accounts live in.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use safri_impls::MemoryStore;

    use super::{Auth, AuthError, Credentials, NewAccount};
    use crate::Role;

    fn auth() -> Auth<MemoryStore> {
        Auth::new(&Arc::new(MemoryStore::new()))
    }

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            user_name: "Hassan".to_string(),
            email: email.to_string(),
            phone_number: "+923001234567".to_string(),
            password: "a-strong-password".to_string(),
            role: Role::Rider,
        }
    }

    #[tokio::test]
    async fn register_and_login() {
        let auth = auth();

        auth.register(new_account("rider@safri360.pk")).await.unwrap();

        let session = auth
            .login(Credentials {
                email: "rider@safri360.pk".to_string(),
                password: "a-strong-password".to_string(),
                role: Role::Rider,
            })
            .await
            .unwrap();

        let restored = auth.session(&session.token).await.unwrap();

        assert_eq!(restored.uid, session.uid);
        assert_eq!(restored.role, Role::Rider);
    }

    #[tokio::test]
    async fn duplicate_email_is_refused() {
        let auth = auth();

        auth.register(new_account("rider@safri360.pk")).await.unwrap();
        let result = auth.register(new_account("rider@safri360.pk")).await;

        assert!(matches!(result, Err(AuthError::EmailInUse)));
    }

    #[tokio::test]
    async fn wrong_password_is_refused() {
        let auth = auth();

        auth.register(new_account("rider@safri360.pk")).await.unwrap();

        let result = auth
            .login(Credentials {
                email: "rider@safri360.pk".to_string(),
                password: "not-the-password".to_string(),
                role: Role::Rider,
            })
            .await;

        assert!(matches!(result, Err(AuthError::WrongPassword)));
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let auth = auth();

        auth.register(new_account("rider@safri360.pk")).await.unwrap();

        let session = auth
            .login(Credentials {
                email: "rider@safri360.pk".to_string(),
                password: "a-strong-password".to_string(),
                role: Role::Rider,
            })
            .await
            .unwrap();

        auth.logout(&session.token).await.unwrap();

        assert!(matches!(
            auth.session(&session.token).await,
            Err(AuthError::InvalidSession)
        ));
    }
}
