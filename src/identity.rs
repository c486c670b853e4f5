use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigStore};
use crate::error::QuizError;

/// The signed-in user as seen by the quiz engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

pub trait IdentityProvider {
    fn current_user(&self) -> Option<Identity>;
    fn sign_in(&mut self, user_id: &str) -> Result<Identity, QuizError>;
    fn sign_out(&mut self);

    /// Gate for quiz entry
    fn require_user(&self) -> Result<Identity, QuizError> {
        self.current_user().ok_or(QuizError::IdentityUnavailable)
    }
}

/// Local profile provider: remembers the last user in the config file
pub struct LocalIdentityProvider<S: ConfigStore> {
    store: S,
    current: Option<Identity>,
}

impl<S: ConfigStore> LocalIdentityProvider<S> {
    pub fn new(store: S) -> Self {
        let current = store
            .load()
            .user
            .filter(|u| valid_user_id(u))
            .map(Identity::new);
        Self { store, current }
    }

    /// A user given explicitly (e.g. on the command line) takes precedence
    pub fn with_user(store: S, user: Option<String>) -> Self {
        let mut provider = Self::new(store);
        if let Some(user) = user {
            if let Err(e) = provider.sign_in(&user) {
                log::warn!("ignoring user '{user}': {e}");
            }
        }
        provider
    }

    fn remember(&self, user: Option<String>) {
        let cfg = Config {
            user,
            ..self.store.load()
        };
        if let Err(e) = self.store.save(&cfg) {
            log::warn!("could not persist signed-in user: {e}");
        }
    }
}

fn valid_user_id(user_id: &str) -> bool {
    let trimmed = user_id.trim();
    !trimmed.is_empty() && trimmed.len() <= 64 && !trimmed.chars().any(char::is_control)
}

impl<S: ConfigStore> IdentityProvider for LocalIdentityProvider<S> {
    fn current_user(&self) -> Option<Identity> {
        self.current.clone()
    }

    fn sign_in(&mut self, user_id: &str) -> Result<Identity, QuizError> {
        if !valid_user_id(user_id) {
            return Err(QuizError::IdentityUnavailable);
        }
        let identity = Identity::new(user_id.trim());
        self.remember(Some(identity.user_id.clone()));
        log::info!("signed in as '{}'", identity.user_id);
        self.current = Some(identity.clone());
        Ok(identity)
    }

    fn sign_out(&mut self) {
        if let Some(user) = self.current.take() {
            log::info!("signed out '{}'", user.user_id);
        }
        self.remember(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfigStore;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn no_user_by_default() {
        let dir = tempdir().unwrap();
        let provider = LocalIdentityProvider::new(FileConfigStore::with_path(
            dir.path().join("config.json"),
        ));
        assert_eq!(provider.current_user(), None);
        assert_matches!(provider.require_user(), Err(QuizError::IdentityUnavailable));
    }

    #[test]
    fn sign_in_is_remembered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut provider = LocalIdentityProvider::new(FileConfigStore::with_path(&path));
        let user = provider.sign_in("  alice ").unwrap();
        assert_eq!(user.user_id, "alice");

        let reopened = LocalIdentityProvider::new(FileConfigStore::with_path(&path));
        assert_eq!(reopened.current_user(), Some(Identity::new("alice")));
    }

    #[test]
    fn sign_out_forgets_user() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut provider = LocalIdentityProvider::new(FileConfigStore::with_path(&path));
        provider.sign_in("bob").unwrap();
        provider.sign_out();
        assert_eq!(provider.current_user(), None);

        let reopened = LocalIdentityProvider::new(FileConfigStore::with_path(&path));
        assert_eq!(reopened.current_user(), None);
    }

    #[test]
    fn blank_user_is_rejected() {
        let dir = tempdir().unwrap();
        let mut provider = LocalIdentityProvider::new(FileConfigStore::with_path(
            dir.path().join("config.json"),
        ));
        assert_matches!(provider.sign_in("   "), Err(QuizError::IdentityUnavailable));
        assert_eq!(provider.current_user(), None);
    }

    #[test]
    fn explicit_user_overrides_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        LocalIdentityProvider::new(FileConfigStore::with_path(&path))
            .sign_in("old")
            .unwrap();

        let provider =
            LocalIdentityProvider::with_user(FileConfigStore::with_path(&path), Some("new".into()));
        assert_eq!(provider.current_user(), Some(Identity::new("new")));
    }
}
