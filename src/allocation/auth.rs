use std::sync::Arc;

use super::domain::{Nric, RuleViolation, User};
use super::service::{integrity, LifecycleError};
use super::store::UserDirectory;

/// Credential checks for the console and HTTP entry points.
pub struct AuthService<S> {
    store: Arc<S>,
}

impl<S> AuthService<S>
where
    S: UserDirectory,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn login(&self, nric: &str, credential: &str) -> Result<User, LifecycleError> {
        let nric = Nric::parse(nric)?;
        let user = self
            .store
            .find_user_by_nric(&nric)
            .map_err(integrity)?
            .ok_or(RuleViolation::UnknownUser)?;

        if !user.verify_credential(credential) {
            return Err(RuleViolation::BadCredential.into());
        }
        Ok(user)
    }

    pub fn change_credential(
        &self,
        nric: &Nric,
        current: &str,
        new_credential: &str,
    ) -> Result<(), LifecycleError> {
        let mut user = self
            .store
            .find_user_by_nric(nric)
            .map_err(integrity)?
            .ok_or(RuleViolation::UnknownUser)?;

        if !user.verify_credential(current) {
            return Err(RuleViolation::BadCredential.into());
        }

        user.change_credential(new_credential)?;
        self.store.update_user(user).map_err(integrity)
    }
}
