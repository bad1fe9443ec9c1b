use super::{
    auth::CredentialHasher, AuthToken, AuthTokenValue, User, UserAuthCredentials, UserStore,
    UsernamePasswordCredentials,
};
use anyhow::{bail, Context, Result};
use std::time::SystemTime;
use tracing::{debug, info};

pub struct UserManager {
    user_store: Box<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Box<dyn UserStore>) -> Self {
        Self { user_store }
    }

    pub fn add_user<T: AsRef<str>>(&self, user_handle: T, is_staff: bool) -> Result<usize> {
        let user_handle = user_handle.as_ref();
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.")
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }

        let id = self.user_store.create_user(user_handle, is_staff)?;
        info!("Created user {} (id {}, staff: {})", user_handle, id, is_staff);
        Ok(id)
    }

    pub fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        self.user_store.get_user(user_id)
    }

    pub fn get_all_users(&self) -> Result<Vec<User>> {
        self.user_store.get_all_users()
    }

    pub fn is_staff(&self, user_id: usize) -> Result<bool> {
        Ok(self.user_store.get_user(user_id)?.is_some_and(|u| u.is_staff))
    }

    pub fn set_staff(&self, user_handle: &str, is_staff: bool) -> Result<()> {
        let user_id = self
            .user_store
            .get_user_id(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        self.user_store.set_user_staff(user_id, is_staff)?;
        Ok(())
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_user_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store.update_user_auth_token_last_used_timestamp(value)
    }

    pub fn generate_auth_token(&mut self, credentials: &UserAuthCredentials) -> Result<AuthToken> {
        let token = AuthToken {
            user_id: credentials.user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(token)
    }

    /// Verifies the password and issues a new token. Ok(None) for an unknown
    /// handle, a user without password or a wrong password.
    pub fn login(&mut self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let Some(credentials) = self.user_store.get_user_auth_credentials(user_handle)? else {
            debug!("Login attempt for unknown user {}", user_handle);
            return Ok(None);
        };
        let Some(password_credentials) = &credentials.username_password else {
            return Ok(None);
        };

        let success = password_credentials.matches(password);
        self.user_store
            .record_password_attempt(credentials.user_id, success)?;
        if !success {
            return Ok(None);
        }
        Ok(Some(self.generate_auth_token(&credentials)?))
    }

    fn create_hashed_password(
        user_id: usize,
        password: &str,
    ) -> Result<UsernamePasswordCredentials> {
        let hasher = CredentialHasher::Argon2;
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

    pub fn create_password_credentials(&mut self, user_handle: &str, password: &str) -> Result<()> {
        let credentials = self
            .user_store
            .get_user_auth_credentials(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        if credentials.username_password.is_some() {
            bail!("User with handle {} already has password credentials method. Maybe you want to modify it?", user_handle);
        }

        let new_credentials = UserAuthCredentials {
            user_id: credentials.user_id,
            username_password: Some(Self::create_hashed_password(credentials.user_id, password)?),
        };
        self.user_store.update_user_auth_credentials(new_credentials)
    }

    pub fn update_password_credentials(&mut self, user_handle: &str, password: &str) -> Result<()> {
        let mut credentials = self
            .user_store
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
        self.user_store.update_user_auth_credentials(credentials)
    }

    /// Creates or replaces the password.
    pub fn set_password(&mut self, user_handle: &str, password: &str) -> Result<()> {
        let has_password = self
            .user_store
            .get_user_auth_credentials(user_handle)?
            .is_some_and(|c| c.username_password.is_some());
        if has_password {
            self.update_password_credentials(user_handle, password)
        } else {
            self.create_password_credentials(user_handle, password)
        }
    }

    pub fn delete_auth_token(&mut self, user_id: &usize, token_value: &AuthTokenValue) -> Result<()> {
        match self.user_store.delete_user_auth_token(token_value)? {
            Some(removed) => {
                if &removed.user_id == user_id {
                    Ok(())
                } else {
                    self.user_store.add_user_auth_token(removed.clone())?;
                    bail!("Tried to delete auth token {}, but the authenticated user {} was not the owner {} of the token.", token_value.0, user_id, &removed.user_id)
                }
            }
            None => bail!("Did not find auth token {}", token_value.0),
        }
    }

    pub fn get_user_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>> {
        self.user_store.get_all_user_auth_tokens(user_handle)
    }
}
