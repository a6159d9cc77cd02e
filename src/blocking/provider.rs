//! Compiled matcher ownership and blocking decisions.

use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

use crate::blocking::engine::{AdblockFilterEngine, FilterEngine};
use crate::error::Result;

/// Creates an empty [`FilterEngine`] ready to receive rules.
pub type EngineFactory = Arc<dyn Fn() -> Result<Box<dyn FilterEngine>> + Send + Sync>;

/// The compiled matcher set. Replaced wholesale by `set_rules`, never
/// patched incrementally.
#[derive(Default)]
struct EngineSet {
    /// One matcher per active rule blob; a URL is blocked if any blocks it
    blockers: Vec<Box<dyn FilterEngine>>,
    /// Matcher over the synthesized exception rules, if any exist
    exception: Option<Box<dyn FilterEngine>>,
}

impl EngineSet {
    fn close(&mut self) {
        for engine in &mut self.blockers {
            engine.close();
        }
        self.blockers.clear();
        if let Some(mut engine) = self.exception.take() {
            engine.close();
        }
    }
}

/// Compiles active rule bytes into matching engines and answers block/allow
/// queries.
///
/// The engine set lives behind a single lock: `set_rules` and `close` take
/// the write side, queries the read side, so a query never observes a
/// partially built or partially closed matcher set.
pub struct BlockingProvider {
    engines: RwLock<EngineSet>,
    factory: EngineFactory,
}

impl BlockingProvider {
    /// Create a provider that compiles rules with the bundled adblock
    /// engine. The provider starts empty: every query is allowed until
    /// rules are set.
    pub fn new() -> Self {
        Self::with_engine_factory(Arc::new(|| Ok(Box::new(AdblockFilterEngine::new()))))
    }

    /// Create a provider with a custom engine factory.
    pub fn with_engine_factory(factory: EngineFactory) -> Self {
        Self {
            engines: RwLock::new(EngineSet::default()),
            factory,
        }
    }

    /// Replace the compiled matcher set.
    ///
    /// The current set is torn down first, then one engine per rule blob is
    /// compiled (plus one for the exception rules when supplied) and the
    /// result is swapped in. Compilation happens outside the lock so
    /// queries keep draining against the empty set in the meantime.
    pub fn set_rules(
        &self,
        rule_blobs: &[Vec<u8>],
        exception_rules: Option<Vec<u8>>,
    ) -> Result<()> {
        self.close();

        let mut blockers = Vec::with_capacity(rule_blobs.len());
        for blob in rule_blobs {
            let text = String::from_utf8_lossy(blob);
            let mut engine = (self.factory)()?;
            engine.load_rules(&text)?;
            blockers.push(engine);
        }

        let exception = match exception_rules {
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let mut engine = (self.factory)()?;
                engine.load_rules(&text)?;
                Some(engine)
            }
            None => None,
        };

        let active = blockers.len();
        {
            let mut guard = self.engines.write();
            guard.blockers = blockers;
            guard.exception = exception;
        }
        log::info!("Blocking provider initialized, {active} blocker(s) are active.");
        Ok(())
    }

    /// Evaluate a URL against the active rules and exceptions.
    ///
    /// The exception matcher is consulted first, against the source URL,
    /// and wins unconditionally. A blank or absent source URL skips the
    /// exception check entirely: exceptions are scoped to a requesting page
    /// and an unknown page cannot be excepted, so previously excepted pages
    /// read as blocked again when queried without a source.
    pub fn check_is_url_blocked(
        &self,
        url: &str,
        source_url: Option<&str>,
        resource_type: Option<&str>,
    ) -> bool {
        let request_host = host_of(url);
        let source_host = source_url.map(host_of).unwrap_or_default();

        let guard = self.engines.read();

        if let Some(source) = source_url.filter(|s| !s.trim().is_empty()) {
            if let Some(exception_engine) = guard.exception.as_deref() {
                // The exception engine holds rules that MATCH excepted
                // URLs; a refusal to load the source page means the page is
                // in the exception list.
                let in_exception_list = !exception_engine.should_load(
                    source,
                    "",
                    resource_type,
                    &request_host,
                    &source_host,
                );
                if in_exception_list {
                    return false;
                }
            }
        }

        for engine in &guard.blockers {
            let allowed = engine.should_load(
                url,
                source_url.unwrap_or(""),
                resource_type,
                &request_host,
                &source_host,
            );
            if !allowed {
                return true;
            }
        }
        false
    }

    /// Release all compiled matchers. Safe to call when already empty.
    pub fn close(&self) {
        self.engines.write().close();
    }
}

impl Default for BlockingProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
