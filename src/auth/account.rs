//! Cached online account.
//!
//! The account session is acquired out of band (device-code sign-in) and
//! persisted as pretty JSON so restarts skip the sign-in.

use crate::auth::keys::IdentityKeyPair;
use crate::auth::ForgeError;
use crate::config::AccountConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub display_name: String,
    pub play_fab_id: String,
    pub device_id: String,
    /// Standard base64 PKCS#8 DER of the account key.
    pub private_key: String,
    /// Authority-signed certificate naming the account key.
    pub mojang_jwt: String,
    pub identity_jwt: String,
    /// Unix seconds after which the tokens need a refresh.
    pub expires_at: i64,
}

impl Account {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    pub fn key_pair(&self) -> std::result::Result<IdentityKeyPair, ForgeError> {
        IdentityKeyPair::from_pkcs8_base64(&self.private_key)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("display_name", &self.display_name)
            .field("play_fab_id", &self.play_fab_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Source of fresh account sessions (the interactive sign-in flow).
pub trait AccountProvider {
    fn acquire(&self) -> Result<Account>;

    fn refresh(&self, account: &Account) -> Result<Account>;
}

/// Loads the cached account, refreshing or acquiring it as needed. The cache
/// is rewritten whenever the provider was consulted.
pub fn fetch_account<P: AsRef<Path>>(path: P, provider: &dyn AccountProvider) -> Result<Account> {
    let path = path.as_ref();
    let now = crate::utils::time::unix_seconds();

    let account = match Account::load(path)? {
        Some(cached) if !cached.is_expired(now) => return Ok(cached),
        Some(expired) => {
            warn!(name = %expired.display_name, "Cached account expired, refreshing");
            provider.refresh(&expired)?
        }
        None => {
            info!(path = %path.display(), "No cached account, signing in");
            provider.acquire()?
        }
    };

    account.save(path)?;
    Ok(account)
}

/// The upstream account when `config` asks for online mode, `None` offline.
pub fn configured_account(
    config: &AccountConfig,
    provider: &dyn AccountProvider,
) -> Result<Option<Account>> {
    if !config.online {
        return Ok(None);
    }
    fetch_account(&config.cache_file, provider).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProvider {
        acquired: Cell<u32>,
        refreshed: Cell<u32>,
    }

    fn account(expires_at: i64) -> Account {
        Account {
            display_name: "Player".into(),
            play_fab_id: "ABCDEF".into(),
            device_id: "device".into(),
            private_key: IdentityKeyPair::generate().to_pkcs8_base64().unwrap(),
            mojang_jwt: "a.b.c".into(),
            identity_jwt: "d.e.f".into(),
            expires_at,
        }
    }

    impl AccountProvider for CountingProvider {
        fn acquire(&self) -> Result<Account> {
            self.acquired.set(self.acquired.get() + 1);
            Ok(account(i64::MAX))
        }

        fn refresh(&self, previous: &Account) -> Result<Account> {
            self.refreshed.set(self.refreshed.get() + 1);
            Ok(Account {
                expires_at: i64::MAX,
                ..previous.clone()
            })
        }
    }

    fn provider() -> CountingProvider {
        CountingProvider {
            acquired: Cell::new(0),
            refreshed: Cell::new(0),
        }
    }

    #[test]
    fn test_absent_cache_acquires_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bedrockSession.json");
        let provider = provider();

        let first = fetch_account(&path, &provider).unwrap();
        assert_eq!(provider.acquired.get(), 1);
        assert!(path.exists());

        let second = fetch_account(&path, &provider).unwrap();
        assert_eq!(provider.acquired.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_expired_cache_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bedrockSession.json");
        account(0).save(&path).unwrap();
        let provider = provider();

        let refreshed = fetch_account(&path, &provider).unwrap();
        assert_eq!(provider.refreshed.get(), 1);
        assert_eq!(provider.acquired.get(), 0);
        assert_eq!(refreshed.expires_at, i64::MAX);
        assert_eq!(Account::load(&path).unwrap(), Some(refreshed));
    }

    #[test]
    fn test_cache_is_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.json");
        account(5).save(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"playFabId\""));
        assert!(raw.contains("\"expiresAt\": 5"));
        assert!(account(5).key_pair().is_ok());
    }

    #[test]
    fn test_offline_config_skips_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let config = AccountConfig {
            online: false,
            cache_file: dir.path().join("bedrockSession.json"),
        };
        let provider = provider();

        assert_eq!(configured_account(&config, &provider).unwrap(), None);
        assert_eq!(provider.acquired.get(), 0);
        assert!(!config.cache_file.exists());
    }

    #[test]
    fn test_online_config_uses_the_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AccountConfig {
            online: true,
            cache_file: dir.path().join("bedrockSession.json"),
        };
        let provider = provider();

        let account = configured_account(&config, &provider).unwrap();
        assert_eq!(provider.acquired.get(), 1);
        assert_eq!(Account::load(&config.cache_file).unwrap(), account);
    }
}
