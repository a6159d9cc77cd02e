//! The ad/tracker blocker client.
//!
//! The client composes the ruleset catalog, the local storage provider, the
//! exception store, and the blocking provider. It owns the filter engine
//! status, serializes rebuilds, and re-derives the compiled matcher set
//! whenever the active rulesets or the exception set change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::blocking::{to_exception_rules, BlockingProvider, ExceptionStore};
use crate::catalog::{RulesetCatalog, FILTER_LISTS_PATH};
use crate::error::{Error, Result};
use crate::exception::BlockingException;
use crate::storage::StorageProvider;
use crate::store::ObjectStore;
use crate::types::{all_rulesets, CheckUrlResult, FilterEngineStatus, Ruleset, RulesetType};

/// Preference value marking a category as active.
const ACTIVE_VALUE: &str = "true";

/// Configuration for [`AdTrackerBlockerClient`].
///
/// The object store and storage provider are required;
/// [`AdTrackerBlockerClient::new`] fails fast with
/// [`Error::Configuration`] when either is absent.
pub struct ClientConfig {
    /// Remote store the filter lists are published in (required)
    pub object_store: Option<Arc<dyn ObjectStore>>,
    /// Local storage for cached rules, ETags, and preferences (required)
    pub storage: Option<Arc<dyn StorageProvider>>,
    /// Top path of the filter lists within the store
    pub list_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            object_store: None,
            storage: None,
            list_path: FILTER_LISTS_PATH.to_string(),
        }
    }
}

/// Status and failure cause of the filter engine, shared with the rebuild
/// task.
struct EngineState {
    status: RwLock<FilterEngineStatus>,
    last_error: RwLock<Option<Arc<Error>>>,
}

struct ClientInner {
    catalog: RulesetCatalog,
    storage: Arc<dyn StorageProvider>,
    exceptions: ExceptionStore,
    provider: BlockingProvider,
    state: EngineState,
    /// Serializes rebuilds so no two run concurrently for this client
    rebuild_lock: Mutex<()>,
}

/// Client for managing content-blocking rule sets and checking whether a
/// network request should be blocked.
///
/// Construction triggers an asynchronous first rebuild; await a READY (or
/// ERROR) [`status`](Self::status) before calling
/// [`check_url`](Self::check_url).
pub struct AdTrackerBlockerClient {
    inner: Arc<ClientInner>,
    /// Initial setup task, retained so `close` can cancel it
    setup: Mutex<Option<JoinHandle<()>>>,
}

impl AdTrackerBlockerClient {
    /// Create a client and start its first rebuild in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let object_store = config
            .object_store
            .ok_or_else(|| Error::Configuration("an object store must be provided".to_string()))?;
        let storage = config
            .storage
            .ok_or_else(|| Error::Configuration("a storage provider must be provided".to_string()))?;

        let inner = Arc::new(ClientInner {
            catalog: RulesetCatalog::new(object_store, storage.clone(), config.list_path),
            storage: storage.clone(),
            exceptions: ExceptionStore::new(storage),
            provider: BlockingProvider::new(),
            state: EngineState {
                status: RwLock::new(FilterEngineStatus::Preparing),
                last_error: RwLock::new(None),
            },
            rebuild_lock: Mutex::new(()),
        });

        let setup = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                inner.rebuild();
            }
        });

        Ok(Self {
            inner,
            setup: Mutex::new(Some(setup)),
        })
    }

    /// The current status of the filter engine.
    pub fn status(&self) -> FilterEngineStatus {
        *self.inner.state.status.read()
    }

    /// The cause of the most recent rebuild failure, if any.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.inner.state.last_error.read().clone()
    }

    /// List the rule sets available from the remote service.
    pub async fn list_rulesets(&self) -> Result<Vec<Ruleset>> {
        self.inner.catalog.list_rulesets().await
    }

    /// The currently active ruleset types.
    pub async fn get_active_rulesets(&self) -> Result<Vec<RulesetType>> {
        self.inner.active_rulesets()
    }

    /// Set which rulesets are active and rebuild the filter engine.
    ///
    /// [`update_rulesets`](Self::update_rulesets) must have cached the
    /// rules of every requested category before it is made active for the
    /// first time. Passing an empty slice deactivates everything.
    /// [`RulesetType::Unknown`] entries are ignored.
    pub async fn set_active_rulesets(&self, kinds: &[RulesetType]) -> Result<()> {
        let mut preferences = HashMap::new();
        for kind in kinds {
            if *kind == RulesetType::Unknown {
                continue;
            }
            preferences.insert(kind.name().to_string(), ACTIVE_VALUE.to_string());
        }
        self.inner.storage.write_preferences(&preferences)?;

        self.inner.rebuild();
        Ok(())
    }

    /// Refresh the local rule cache for the given categories.
    ///
    /// Pass [`all_rulesets()`] to refresh everything. Downloading never
    /// changes live blocking behavior: activation via
    /// [`set_active_rulesets`](Self::set_active_rulesets) is a separate,
    /// explicit step.
    pub async fn update_rulesets(&self, kinds: &[RulesetType]) -> Result<()> {
        self.inner.catalog.update_rulesets(kinds).await
    }

    /// The exceptions that prevent URLs from being blocked.
    pub async fn get_exceptions(&self) -> Result<HashSet<BlockingException>> {
        Ok(self.inner.exceptions.read_exceptions()?)
    }

    /// Add entries to the exception set and rebuild the filter engine.
    ///
    /// Duplicates are absorbed silently. A call with no exceptions is a
    /// no-op and does not rebuild.
    pub async fn add_exceptions(&self, exceptions: &[BlockingException]) -> Result<()> {
        if exceptions.is_empty() {
            return Ok(());
        }
        let mut stored = self.inner.exceptions.read_exceptions()?;
        stored.extend(exceptions.iter().cloned());
        self.inner.exceptions.write_exceptions(&stored)?;

        self.inner.rebuild();
        Ok(())
    }

    /// Remove entries from the exception set and rebuild the filter engine.
    ///
    /// A call with no exceptions is a no-op and does not rebuild.
    pub async fn remove_exceptions(&self, exceptions: &[BlockingException]) -> Result<()> {
        if exceptions.is_empty() {
            return Ok(());
        }
        let mut stored = self.inner.exceptions.read_exceptions()?;
        for exception in exceptions {
            stored.remove(exception);
        }
        self.inner.exceptions.write_exceptions(&stored)?;

        self.inner.rebuild();
        Ok(())
    }

    /// Remove every exception and rebuild the filter engine.
    pub async fn remove_all_exceptions(&self) -> Result<()> {
        self.inner.exceptions.delete_exceptions()?;

        self.inner.rebuild();
        Ok(())
    }

    /// Check a URL against the active rulesets and the exception list.
    ///
    /// `source_url` is the page that requested `url`; exceptions only apply
    /// when it is present and non-blank. `resource_type` is the kind of
    /// resource the URL refers to (`"script"`, `"image"`, ...) when known.
    ///
    /// With no active rulesets the engine holds no matchers and every URL
    /// is ALLOWED.
    ///
    /// Fails with [`Error::FilterEngineNotReady`] unless
    /// [`status`](Self::status) is READY.
    pub async fn check_url(
        &self,
        url: &str,
        source_url: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<CheckUrlResult> {
        let status = self.status();
        if status != FilterEngineStatus::Ready {
            return Err(Error::FilterEngineNotReady(status));
        }
        if self
            .inner
            .provider
            .check_is_url_blocked(url, source_url, resource_type)
        {
            Ok(CheckUrlResult::Blocked)
        } else {
            Ok(CheckUrlResult::Allowed)
        }
    }

    /// Delete all cached rules, ETags, and preferences.
    ///
    /// Closes the client first; construct a new client to resume blocking.
    pub async fn clear_storage(&self) -> Result<()> {
        self.close();
        self.inner.storage.delete_files()?;
        self.inner.storage.delete_file_etags()?;
        self.inner.storage.delete_preferences()?;
        Ok(())
    }

    /// Cancel any in-flight setup and release the compiled matchers.
    ///
    /// Cancellation is a plain task abort: it is never recorded as
    /// [`last_error`](Self::last_error) and never surfaces as an [`Error`].
    pub fn close(&self) {
        if let Some(setup) = self.setup.lock().take() {
            setup.abort();
        }
        self.inner.provider.close();
    }
}

impl Drop for AdTrackerBlockerClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl ClientInner {
    /// Tear down and rebuild the compiled matcher set from local state.
    ///
    /// Failures are captured in the shared state (status ERROR, cause
    /// retained) rather than propagated; the next `check_url` surfaces the
    /// readiness failure.
    fn rebuild(&self) {
        let _guard = self.rebuild_lock.lock();

        log::info!("Starting blocking initialization.");
        *self.state.status.write() = FilterEngineStatus::Preparing;

        match self.load_and_compile() {
            Ok(()) => {
                *self.state.last_error.write() = None;
                *self.state.status.write() = FilterEngineStatus::Ready;
                log::info!("Blocking initialization completed successfully.");
            }
            Err(e) => {
                log::error!("Blocking initialization failed: {e}");
                *self.state.last_error.write() = Some(Arc::new(e));
                *self.state.status.write() = FilterEngineStatus::Error;
            }
        }
    }

    fn load_and_compile(&self) -> Result<()> {
        self.provider.close();

        let active = self.active_rulesets()?;
        if active.is_empty() {
            log::info!("Initialization skipped, there are no active rulesets.");
            return Ok(());
        }

        let names: Vec<&str> = active.iter().map(|kind| kind.name()).collect();
        log::info!("Initializing blocking for {names:?}.");

        let mut rule_blobs = Vec::new();
        for kind in &active {
            if let Some(bytes) = self.rules_for(*kind)? {
                rule_blobs.push(bytes);
            }
        }

        let exceptions = self.exceptions.read_exceptions()?;
        log::info!("Loaded exception list with {} entries.", exceptions.len());
        let exception_rules = to_exception_rules(&exceptions);

        self.provider.set_rules(&rule_blobs, exception_rules)
    }

    /// Cached rule bytes for a category, `None` for categories without a
    /// cache mapping.
    fn rules_for(&self, kind: RulesetType) -> Result<Option<Vec<u8>>> {
        let Some(file_name) = kind.file_name() else {
            log::debug!("Unsupported ruleset {kind} requested");
            return Ok(None);
        };
        match self.storage.read(file_name)? {
            Some(bytes) => Ok(Some(bytes)),
            None => Err(Error::NoSuchRuleset(kind)),
        }
    }

    fn active_rulesets(&self) -> Result<Vec<RulesetType>> {
        let preferences = self.storage.read_preferences()?;
        Ok(all_rulesets()
            .into_iter()
            .filter(|kind| preferences.get(kind.name()).map(String::as_str) == Some(ACTIVE_VALUE))
            .collect())
    }
}
