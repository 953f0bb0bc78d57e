//! Credential pool for the hosted inference API.
//!
//! Loaded once at startup from layered sources and shared by reference.
//! The pool never changes size; rotation only moves the "current" index.

pub mod sources;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::credentials::sources::{discover_credentials, KeyValueSource};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("No API credentials configured")]
    NoCredentials,
}

impl ConfigurationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigurationError::NoCredentials => "NoCredentials",
        }
    }
}

/// A single API key plus its 1-indexed position in the pool.
#[derive(Clone)]
pub struct Credential {
    ordinal: usize,
    secret: Arc<SecretString>,
}

impl Credential {
    pub fn new(ordinal: usize, secret: String) -> Self {
        Self {
            ordinal,
            secret: Arc::new(SecretString::new(secret)),
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(#{}, [REDACTED])", self.ordinal)
    }
}

/// Round-robin pool of credentials.
///
/// Every advance is a single atomic update. `rotate_from` only moves the index
/// away from the key that failed, so callers racing on the same failure
/// rotate once between them.
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    current: AtomicUsize,
}

impl CredentialRotator {
    pub fn new(secrets: Vec<String>) -> Self {
        let credentials = secrets
            .into_iter()
            .enumerate()
            .map(|(i, secret)| Credential::new(i + 1, secret))
            .collect();

        Self {
            credentials,
            current: AtomicUsize::new(0),
        }
    }

    /// Builds the pool from the first layer that yields at least one key.
    pub fn discover(
        secret_store: &dyn KeyValueSource,
        environment: &dyn KeyValueSource,
        prefix: &str,
    ) -> Self {
        let secrets = discover_credentials(secret_store, environment, prefix);

        if secrets.is_empty() {
            error!(
                "No API keys found. Set {prefix}_1..{prefix}_9 in the secrets file or environment, or {prefix} as a single key"
            );
        } else {
            info!("Loaded {} API key(s) for rotation", secrets.len());
        }

        Self::new(secrets)
    }

    pub fn total(&self) -> usize {
        self.credentials.len()
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// 1-indexed position of the current credential, for diagnostics.
    pub fn key_ordinal(&self) -> usize {
        self.current_index() + 1
    }

    /// Startup guard: the service refuses to run without credentials.
    pub fn ensure_configured(&self) -> Result<(), ConfigurationError> {
        self.get_current().map(|_| ())
    }

    pub fn get_current(&self) -> Result<Credential, ConfigurationError> {
        self.credentials
            .get(self.current_index())
            .cloned()
            .ok_or(ConfigurationError::NoCredentials)
    }

    pub fn credential_at(&self, index: usize) -> Option<Credential> {
        self.credentials.get(index).cloned()
    }

    /// Advances past the credential at `failed_index`, wrapping around.
    ///
    /// Only moves the index if it still points at `failed_index`. If another
    /// caller already advanced it, the current credential is returned as is,
    /// so concurrent failures on the same key rotate once.
    pub fn rotate_from(&self, failed_index: usize) -> Result<Credential, ConfigurationError> {
        let total = self.credentials.len();

        match total {
            0 => Err(ConfigurationError::NoCredentials),
            1 => {
                warn!("Only 1 API key available, cannot rotate");
                Ok(self.credentials[0].clone())
            }
            _ => {
                let next = (failed_index + 1) % total;
                match self.current.compare_exchange(
                    failed_index,
                    next,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => {
                        info!("Rotating API key: #{} -> #{}", failed_index + 1, next + 1);
                        Ok(self.credentials[next].clone())
                    }
                    Err(actual) => {
                        debug!(
                            "API key #{} already rotated away, now on #{}",
                            failed_index + 1,
                            actual + 1
                        );
                        Ok(self.credentials[actual].clone())
                    }
                }
            }
        }
    }

    /// Advances to the next credential, wrapping around.
    /// With a single credential this is a no-op that only warns.
    #[allow(dead_code)]
    pub fn rotate(&self) -> Result<Credential, ConfigurationError> {
        let total = self.credentials.len();

        match total {
            0 => Err(ConfigurationError::NoCredentials),
            1 => {
                warn!("Only 1 API key available, cannot rotate");
                Ok(self.credentials[0].clone())
            }
            _ => {
                let previous = self
                    .current
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % total))
                    .unwrap_or_else(|i| i);
                let next = (previous + 1) % total;
                info!("Rotating API key: #{} -> #{}", previous + 1, next + 1);
                Ok(self.credentials[next].clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> CredentialRotator {
        CredentialRotator::new((1..=n).map(|i| format!("key-{i}")).collect())
    }

    #[test]
    fn test_rotation_index_is_k_mod_n() {
        for n in 1..=4 {
            let rotator = pool(n);
            for k in 0..=10 {
                assert_eq!(rotator.current_index(), k % n, "n={n}, k={k}");
                rotator.rotate().unwrap();
            }
        }
    }

    #[test]
    fn test_rotate_returns_the_new_current() {
        let rotator = pool(3);
        let next = rotator.rotate().unwrap();
        assert_eq!(next.expose(), "key-2");
        assert_eq!(rotator.get_current().unwrap().expose(), "key-2");
        assert_eq!(rotator.key_ordinal(), 2);
    }

    #[test]
    fn test_single_key_rotation_is_a_no_op() {
        let rotator = pool(1);
        assert_eq!(rotator.rotate().unwrap().expose(), "key-1");
        assert_eq!(rotator.current_index(), 0);
    }

    #[test]
    fn test_empty_pool_fails_with_no_credentials() {
        let rotator = CredentialRotator::new(vec![]);
        assert_eq!(rotator.get_current().unwrap_err(), ConfigurationError::NoCredentials);
        assert_eq!(rotator.rotate().unwrap_err(), ConfigurationError::NoCredentials);
        assert!(rotator.ensure_configured().is_err());
    }

    #[test]
    fn test_rotate_from_same_failed_key_advances_once() {
        let rotator = pool(3);

        assert_eq!(rotator.rotate_from(0).unwrap().expose(), "key-2");
        // A second caller that also failed on key #1 finds it already rotated away.
        assert_eq!(rotator.rotate_from(0).unwrap().expose(), "key-2");
        assert_eq!(rotator.current_index(), 1);

        assert_eq!(rotator.rotate_from(1).unwrap().expose(), "key-3");
        assert_eq!(rotator.rotate_from(2).unwrap().expose(), "key-1");
        assert_eq!(rotator.current_index(), 0);
    }

    #[test]
    fn test_rotate_from_on_small_pools() {
        assert_eq!(
            CredentialRotator::new(vec![]).rotate_from(0).unwrap_err(),
            ConfigurationError::NoCredentials
        );
        let single = pool(1);
        assert_eq!(single.rotate_from(0).unwrap().expose(), "key-1");
        assert_eq!(single.current_index(), 0);
        assert!(single.credential_at(1).is_none());
    }

    #[test]
    fn test_debug_output_redacts_secret() {
        let credential = Credential::new(2, "gsk_live_secret".to_string());
        let printed = format!("{credential:?}");
        assert!(!printed.contains("gsk_live_secret"));
        assert!(printed.contains("#2"));
    }

    #[test]
    fn test_concurrent_rotation_never_loses_an_advance() {
        let rotator = Arc::new(pool(5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rotator = rotator.clone();
                std::thread::spawn(move || {
                    for _ in 0..125 {
                        rotator.rotate().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 1000 advances over a pool of 5 lands back on index 0.
        assert_eq!(rotator.current_index(), 0);
    }
}
