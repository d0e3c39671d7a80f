//! # Application State
//!
//! Shared state passed to all route handlers via the `State` extractor:
//! the escrow registry, the verifier's signing key, the metadata object
//! store and the loaded configuration.
//!
//! Escrows live in an in-memory [`Store`]. Each record pairs the state
//! machine with the custodial account that backs its payouts; both are
//! mutated together under one write lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fairlens_core::AppId;
use fairlens_crypto::{AttestationSigner, CryptoError};
use fairlens_state::{ConfigError, CustodialAccount, Escrow, EscrowConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::object_store::{InMemoryObjectStore, ObjectStore};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across an `.await`.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash + Clone, T: Clone> Store<K, T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert unless the key is taken. Returns `false` on a duplicate.
    pub fn insert_new(&self, key: K, value: T) -> bool {
        let mut guard = self.data.write();
        if guard.contains_key(&key) {
            return false;
        }
        guard.insert(key, value);
        true
    }

    pub fn get(&self, key: &K) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    /// All records, in no particular order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Read-validate-update a record under a single write lock.
    ///
    /// Returns `None` if the key is absent, otherwise the closure's result.
    pub fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(key).map(f)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Escrow Records -----------------------------------------------------------

/// One deployed escrow and the funds held for it.
#[derive(Debug, Clone)]
pub struct EscrowRecord {
    pub escrow: Escrow,
    pub custody: CustodialAccount,
}

impl EscrowRecord {
    pub fn new(escrow: Escrow) -> Self {
        Self {
            escrow,
            custody: CustodialAccount::new(),
        }
    }
}

// -- Configuration ------------------------------------------------------------

/// Error building [`AppConfig`] or [`AppState`] from the environment.
#[derive(Error, Debug)]
pub enum ApiConfigError {
    #[error("invalid PORT {value:?}: {reason}")]
    Port { value: String, reason: String },

    #[error("escrow config: {0}")]
    Escrow(#[from] ConfigError),

    #[error("VERIFIER_PRIVATE_KEY: {0}")]
    VerifierKey(CryptoError),
}

/// Process configuration read from the environment.
///
/// `Debug` redacts the bearer token and the verifier seed.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub auth_token: Option<String>,
    pub verifier_seed: Option<Zeroizing<String>>,
    pub escrow_config: EscrowConfig,
    pub log_json: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("verifier_seed", &self.verifier_seed.as_ref().map(|_| "[REDACTED]"))
            .field("escrow_config", &self.escrow_config)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            verifier_seed: None,
            escrow_config: EscrowConfig::default(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, `VERIFIER_PRIVATE_KEY`,
    /// `FAIRLENS_ESCROW_CONFIG` and `LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ApiConfigError::Port {
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => 8080,
        };

        let escrow_config = match var("FAIRLENS_ESCROW_CONFIG") {
            Some(path) => EscrowConfig::load(&PathBuf::from(path))?,
            None => EscrowConfig::default(),
        };

        Ok(Self {
            port,
            auth_token: var("AUTH_TOKEN"),
            verifier_seed: var("VERIFIER_PRIVATE_KEY").map(Zeroizing::new),
            escrow_config,
            log_json: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub escrows: Store<AppId, EscrowRecord>,
    pub signer: Arc<AttestationSigner>,
    pub object_store: Arc<dyn ObjectStore>,
    pub config: Arc<AppConfig>,
    /// Render handle of the installed Prometheus recorder, if any.
    pub metrics: Option<PrometheusHandle>,
    next_app_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("escrows", &self.escrows.len())
            .field("verifier", &self.signer.public_key())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State with default config, a generated verifier key and an
    /// in-memory object store.
    pub fn new() -> Self {
        Self::from_parts(
            AppConfig::default(),
            AttestationSigner::generate(),
            Arc::new(InMemoryObjectStore::new()),
        )
    }

    /// State from a loaded config. Without a verifier seed a fresh key is
    /// generated and only its public half is logged.
    pub fn with_config(config: AppConfig) -> Result<Self, ApiConfigError> {
        let signer = match &config.verifier_seed {
            Some(seed) => {
                AttestationSigner::from_seed_hex(seed).map_err(ApiConfigError::VerifierKey)?
            }
            None => {
                let signer = AttestationSigner::generate();
                tracing::warn!(
                    public_key = %signer.public_key(),
                    "VERIFIER_PRIVATE_KEY not set; generated an ephemeral verifier key"
                );
                signer
            }
        };
        Ok(Self::from_parts(
            config,
            signer,
            Arc::new(InMemoryObjectStore::new()),
        ))
    }

    fn from_parts(
        config: AppConfig,
        signer: AttestationSigner,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            escrows: Store::new(),
            signer: Arc::new(signer),
            object_store,
            config: Arc::new(config),
            metrics: None,
            next_app_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replace the metadata object store.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = store;
        self
    }

    /// Replace the verifier signing key.
    pub fn with_signer(mut self, signer: AttestationSigner) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    /// Attach the Prometheus render handle served at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Next unused application id. Ids chosen by clients are skipped.
    pub fn allocate_app_id(&self) -> AppId {
        loop {
            let id = AppId::new(self.next_app_id.fetch_add(1, Ordering::Relaxed));
            if !self.escrows.contains(&id) {
                return id;
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
