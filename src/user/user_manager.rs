use super::{
    auth::RallyHasher,
    permissions::{Permission, UserRole},
    AuthToken, AuthTokenValue, UserAuthCredentials, UserStore, UsernamePasswordCredentials,
};
use anyhow::{bail, Context, Result};
use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};
use tracing::{debug, info};

pub struct UserManager {
    user_store: Arc<Mutex<Box<dyn UserStore>>>,
}

impl UserManager {
    pub fn new(user_store: Box<dyn UserStore>) -> Self {
        Self {
            user_store: Arc::new(Mutex::new(user_store)),
        }
    }

    pub fn add_user<T: AsRef<str>>(&self, user_handle: T) -> Result<usize> {
        let user_handle = user_handle.as_ref().trim();
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.")
        }

        let locked_store = self.user_store.lock().unwrap();
        if locked_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }
        locked_store.create_user(user_handle)
    }

    fn create_hashed_password(
        user_id: usize,
        password: &str,
    ) -> Result<UsernamePasswordCredentials> {
        if password.is_empty() {
            bail!("The password cannot be empty.");
        }
        let hasher = RallyHasher::Argon2;
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;
        Ok(UsernamePasswordCredentials {
            user_id,
            salt,
            hash,
            hasher,
            created: SystemTime::now(),
            last_tried: None,
            last_used: None,
        })
    }

    pub fn create_password_credentials(&self, user_handle: &str, password: &str) -> Result<()> {
        let user_store = self.user_store.lock().unwrap();
        let mut credentials = user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        if credentials.username_password.is_some() {
            bail!(
                "User with handle {} already has a password. Maybe you want to modify it?",
                user_handle
            );
        }
        credentials.username_password =
            Some(Self::create_hashed_password(credentials.user_id, password)?);
        user_store.update_user_auth_credentials(credentials)
    }

    pub fn update_password_credentials(&self, user_handle: &str, password: &str) -> Result<()> {
        let user_store = self.user_store.lock().unwrap();
        let mut credentials = user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        if credentials.username_password.is_none() {
            bail!(
                "Cannot update password of user with handle {} since it never had one.",
                user_handle
            );
        }
        credentials.username_password =
            Some(Self::create_hashed_password(credentials.user_id, password)?);
        user_store.update_user_auth_credentials(credentials)
    }

    pub fn delete_password_credentials(&self, user_handle: &str) -> Result<()> {
        let user_store = self.user_store.lock().unwrap();
        let mut credentials = user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        credentials.username_password = None;
        user_store.update_user_auth_credentials(credentials)
    }

    pub fn get_user_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        self.user_store
            .lock()
            .unwrap()
            .get_user_auth_credentials(user_handle)
    }

    /// Verifies the password and issues a new session token.
    /// Returns Ok(None) when the handle is unknown or the password is wrong.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let user_store = self.user_store.lock().unwrap();
        let password_credentials = match user_store
            .get_user_auth_credentials(user_handle)?
            .and_then(|c| c.username_password)
        {
            Some(password_credentials) => password_credentials,
            None => {
                debug!("Login for {} without password credentials", user_handle);
                return Ok(None);
            }
        };

        let verified = password_credentials
            .hasher
            .verify(password, &password_credentials.hash)?;
        user_store.touch_password_credentials(password_credentials.user_id, verified)?;
        if !verified {
            return Ok(None);
        }

        let token = AuthToken {
            user_id: password_credentials.user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        user_store.add_user_auth_token(token.clone())?;
        info!("User {} logged in", user_handle);
        Ok(Some(token))
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.lock().unwrap().get_user_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store
            .lock()
            .unwrap()
            .update_user_auth_token_last_used_timestamp(value)
    }

    /// Deletes a token, only if it belongs to `user_id`.
    pub fn logout(&self, user_id: usize, token_value: &AuthTokenValue) -> Result<()> {
        let user_store = self.user_store.lock().unwrap();
        match user_store.get_user_auth_token(token_value)? {
            Some(token) if token.user_id == user_id => {
                user_store.delete_user_auth_token(token_value)?;
                Ok(())
            }
            Some(token) => bail!(
                "Tried to delete auth token of user {}, but the authenticated user is {}",
                token.user_id,
                user_id
            ),
            None => bail!("Did not find auth token"),
        }
    }

    pub fn get_user_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>> {
        self.user_store
            .lock()
            .unwrap()
            .get_all_user_auth_tokens(user_handle)
    }

    pub fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize> {
        self.user_store
            .lock()
            .unwrap()
            .prune_unused_auth_tokens(unused_for_days)
    }

    pub fn get_all_user_handles(&self) -> Result<Vec<String>> {
        self.user_store.lock().unwrap().get_all_user_handles()
    }

    pub fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        self.user_store.lock().unwrap().get_user_id(user_handle)
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.lock().unwrap().get_user_handle(user_id)
    }

    pub fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>> {
        self.user_store
            .lock()
            .unwrap()
            .resolve_user_permissions(user_id)
    }

    pub fn get_user_roles(&self, user_id: usize) -> Result<Vec<UserRole>> {
        self.user_store.lock().unwrap().get_user_roles(user_id)
    }

    pub fn add_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        self.user_store.lock().unwrap().add_user_role(user_id, role)
    }

    pub fn remove_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        self.user_store
            .lock()
            .unwrap()
            .remove_user_role(user_id, role)
    }
}
