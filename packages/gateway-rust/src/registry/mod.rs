//! Generic registry of pluggable backends.
//!
//! One implementation serves every pluggable subsystem: inventory adapters,
//! deployment backends, and orchestration plugins are all held in a
//! `Registry<dyn Trait>` where the trait extends [`Backend`].
//!
//! Readers load an immutable snapshot through `ArcSwap` and never block.
//! Writers (registration, removal, health updates) are serialized by a
//! single mutex and publish a new snapshot when done.

mod health;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use ocloud_core::{Backend, Capability};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use health::HealthChecker;

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Errors returned by registry lookups and mutations.
///
/// `kind` names the subsystem ("adapter", "deployment backend", ...) so
/// messages stay meaningful across registries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} '{name}' is already registered")]
    Conflict { kind: &'static str, name: String },
    #[error("{kind} '{name}' is not registered")]
    NotFound { kind: &'static str, name: String },
    /// `get_default` on a registry with no members.
    #[error("no {kind} is registered")]
    Empty { kind: &'static str },
    /// `get_default` on a registry whose members are all non-default.
    #[error("no default {kind} is configured")]
    NoDefault { kind: &'static str },
    #[error("{kind} '{name}' does not support {capability}")]
    Unsupported {
        kind: &'static str,
        name: String,
        capability: Capability,
    },
    #[error("{kind} registry is shut down")]
    Closed { kind: &'static str },
}

// ---------------------------------------------------------------------------
// RegistryEntry
// ---------------------------------------------------------------------------

/// A registered backend plus its selection and health metadata.
pub struct RegistryEntry<B: ?Sized> {
    pub name: String,
    pub backend: Arc<B>,
    pub capabilities: BTreeSet<Capability>,
    /// At most one entry per registry has this set.
    pub is_default: bool,
    /// Advisory: an unhealthy entry is still returned by lookups.
    pub healthy: bool,
    pub last_health_at: Option<DateTime<Utc>>,
}

impl<B: ?Sized> Clone for RegistryEntry<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: Arc::clone(&self.backend),
            capabilities: self.capabilities.clone(),
            is_default: self.is_default,
            healthy: self.healthy,
            last_health_at: self.last_health_at,
        }
    }
}

impl<B: ?Sized> RegistryEntry<B> {
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Serializable view of the entry, without the backend handle.
    #[must_use]
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            name: self.name.clone(),
            capabilities: self.capabilities.iter().copied().collect(),
            is_default: self.is_default,
            healthy: self.healthy,
            last_health_at: self.last_health_at,
        }
    }
}

/// JSON view of a registry entry, used by listing and health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub is_default: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_health_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name-keyed registry of backends with default selection and health tracking.
pub struct Registry<B: ?Sized> {
    kind: &'static str,
    /// Registration-ordered snapshot read by every lookup.
    entries: ArcSwap<Vec<RegistryEntry<B>>>,
    /// Serializes all writers.
    writer: Mutex<()>,
    /// Set by `seal()`: lookups fail with `Closed`.
    sealed: AtomicBool,
    /// Set by `close()`: backends have been released.
    closed: AtomicBool,
    health: Mutex<Option<HealthChecker>>,
}

impl<B: ?Sized + Backend> Registry<B> {
    /// Creates an empty registry. `kind` is used in log lines and errors.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            sealed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            health: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Registers `backend` under `name`.
    ///
    /// A new default demotes any previous default. Entries start healthy
    /// until the first probe says otherwise.
    ///
    /// # Errors
    ///
    /// `Conflict` if `name` is taken, `Closed` after `seal()`/`close()`.
    pub fn register(
        &self,
        name: impl Into<String>,
        backend: Arc<B>,
        capabilities: BTreeSet<Capability>,
        is_default: bool,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let _guard = self.writer.lock();
        self.ensure_open()?;

        let current = self.entries.load();
        if current.iter().any(|e| e.name == name) {
            return Err(RegistryError::Conflict {
                kind: self.kind,
                name,
            });
        }

        let mut next: Vec<RegistryEntry<B>> = current.iter().cloned().collect();
        if is_default {
            for entry in next.iter_mut().filter(|e| e.is_default) {
                entry.is_default = false;
                info!(kind = self.kind, name = %entry.name, "demoted previous default");
            }
        }
        next.push(RegistryEntry {
            name: name.clone(),
            backend,
            capabilities,
            is_default,
            healthy: true,
            last_health_at: None,
        });
        self.entries.store(Arc::new(next));

        info!(kind = self.kind, name = %name, is_default, "registered backend");
        Ok(())
    }

    /// Registers `backend` with the capability set it declares itself.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::register`].
    pub fn register_backend(
        &self,
        name: impl Into<String>,
        backend: Arc<B>,
        is_default: bool,
    ) -> Result<(), RegistryError> {
        let capabilities = backend.capabilities();
        self.register(name, backend, capabilities, is_default)
    }

    /// Looks up a backend by name.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown names, `Closed` once sealed.
    pub fn get(&self, name: &str) -> Result<Arc<B>, RegistryError> {
        self.entry(name).map(|e| e.backend)
    }

    /// Looks up a full entry by name.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown names, `Closed` once sealed.
    pub fn entry(&self, name: &str) -> Result<RegistryEntry<B>, RegistryError> {
        self.ensure_open()?;
        self.entries
            .load()
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    /// Returns the default backend.
    ///
    /// # Errors
    ///
    /// `Empty` with no members, `NoDefault` when none is marked default,
    /// `Closed` once sealed.
    pub fn get_default(&self) -> Result<Arc<B>, RegistryError> {
        self.default_entry().map(|e| e.backend)
    }

    /// Returns the default entry.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::get_default`].
    pub fn default_entry(&self) -> Result<RegistryEntry<B>, RegistryError> {
        self.ensure_open()?;
        let entries = self.entries.load();
        if entries.is_empty() {
            return Err(RegistryError::Empty { kind: self.kind });
        }
        entries
            .iter()
            .find(|e| e.is_default)
            .cloned()
            .ok_or(RegistryError::NoDefault { kind: self.kind })
    }

    /// Picks the named entry (or the default) and checks it supports `capability`.
    ///
    /// # Errors
    ///
    /// Any lookup error, or `Unsupported` when the capability is missing.
    pub fn select(
        &self,
        name: Option<&str>,
        capability: Capability,
    ) -> Result<RegistryEntry<B>, RegistryError> {
        let entry = match name {
            Some(name) => self.entry(name)?,
            None => self.default_entry()?,
        };
        if entry.supports(capability) {
            Ok(entry)
        } else {
            Err(RegistryError::Unsupported {
                kind: self.kind,
                name: entry.name,
                capability,
            })
        }
    }

    /// Point-in-time snapshot of all entries in registration order.
    ///
    /// Safe to iterate while writers run; later writes are not observed.
    #[must_use]
    pub fn list(&self) -> Arc<Vec<RegistryEntry<B>>> {
        self.entries.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Removes an entry and closes its backend. Removing the default leaves
    /// the registry without one.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown names, `Closed` after `seal()`/`close()`.
    pub async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let removed = {
            let _guard = self.writer.lock();
            self.ensure_open()?;
            let current = self.entries.load();
            let Some(pos) = current.iter().position(|e| e.name == name) else {
                return Err(RegistryError::NotFound {
                    kind: self.kind,
                    name: name.to_string(),
                });
            };
            let mut next: Vec<RegistryEntry<B>> = current.iter().cloned().collect();
            let removed = next.remove(pos);
            self.entries.store(Arc::new(next));
            removed
        };

        info!(kind = self.kind, name, "unregistered backend");
        if let Err(e) = removed.backend.close().await {
            warn!(kind = self.kind, name, error = %e, "backend close failed");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Health
    // -----------------------------------------------------------------------

    /// Runs one health pass over every entry.
    ///
    /// Probes run concurrently against a snapshot with no lock held; results
    /// are applied afterwards under the writer lock. A probe that errors or
    /// exceeds `probe_timeout` marks its entry unhealthy. Entries are never
    /// removed for being unhealthy.
    pub async fn probe_now(&self, probe_timeout: Duration) {
        let snapshot = self.entries.load_full();
        if snapshot.is_empty() {
            return;
        }

        let mut probes = JoinSet::new();
        for entry in snapshot.iter() {
            let name = entry.name.clone();
            let backend = Arc::clone(&entry.backend);
            probes.spawn(async move {
                let outcome = match tokio::time::timeout(probe_timeout, backend.health()).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("probe timed out after {probe_timeout:?}")),
                };
                (name, backend, outcome)
            });
        }

        let mut results = Vec::with_capacity(snapshot.len());
        while let Some(joined) = probes.join_next().await {
            if let Ok(result) = joined {
                results.push(result);
            }
        }

        let checked_at = Utc::now();
        let _guard = self.writer.lock();
        let mut next: Vec<RegistryEntry<B>> = self.entries.load().iter().cloned().collect();
        for (name, backend, outcome) in results {
            // Skip entries replaced or removed while the probe ran.
            let Some(entry) = next
                .iter_mut()
                .find(|e| e.name == name && Arc::ptr_eq(&e.backend, &backend))
            else {
                continue;
            };
            let healthy = outcome.is_ok();
            match (&outcome, entry.healthy) {
                (Err(reason), true) => {
                    warn!(kind = self.kind, name = %name, reason = %reason, "backend became unhealthy");
                }
                (Ok(()), false) => info!(kind = self.kind, name = %name, "backend recovered"),
                _ => {}
            }
            entry.healthy = healthy;
            entry.last_health_at = Some(checked_at);
        }
        self.entries.store(Arc::new(next));
    }

    /// Starts the periodic background health check.
    ///
    /// Returns `false` if a check loop is already running, the registry
    /// is sealed, or `interval` is zero.
    pub fn start_health_checks(
        self: &Arc<Self>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> bool {
        if interval.is_zero() {
            warn!(kind = self.kind, "health check interval must be positive; checks not started");
            return false;
        }
        if self.sealed.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = self.health.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(HealthChecker::start(
            Arc::downgrade(self),
            interval,
            probe_timeout,
        ));
        true
    }

    /// Stops the background health check, cancelling an in-progress pass.
    pub async fn stop_health_checks(&self) {
        let checker = self.health.lock().take();
        if let Some(checker) = checker {
            checker.stop().await;
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Refuses all further lookups and registrations.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            info!(kind = self.kind, "registry sealed");
        }
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Stops health checks, seals the registry, and closes every backend.
    ///
    /// Idempotent: only the first call releases backends.
    pub async fn close(&self) {
        self.stop_health_checks().await;
        self.seal();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for entry in self.entries.load().iter() {
            if let Err(e) = entry.backend.close().await {
                warn!(kind = self.kind, name = %entry.name, error = %e, "backend close failed");
            }
        }
        info!(kind = self.kind, count = self.len(), "registry closed");
    }

    fn ensure_open(&self) -> Result<(), RegistryError> {
        if self.sealed.load(Ordering::Acquire) {
            Err(RegistryError::Closed { kind: self.kind })
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
