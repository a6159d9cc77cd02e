//! Filter-list matching engine abstraction.

use adblock::lists::{FilterSet, ParseOptions};
use adblock::request::Request;
use adblock::Engine;
use parking_lot::Mutex;

use crate::error::Result;

/// A compiled structure that answers "should this request be loaded?" in
/// bounded time.
///
/// Any implementation satisfying this contract is substitutable; the rest of
/// the crate never touches the underlying matching library directly.
pub trait FilterEngine: Send + Sync {
    /// Compile a filter list, replacing any previously loaded rules.
    fn load_rules(&mut self, rules: &str) -> Result<()>;

    /// Whether the request for `url` should be loaded (`false` means the
    /// rules block it).
    fn should_load(
        &self,
        url: &str,
        source_url: &str,
        resource_type: Option<&str>,
        request_host: &str,
        source_host: &str,
    ) -> bool;

    /// Release the compiled rules. Safe to call when nothing is loaded.
    fn close(&mut self);
}

/// [`FilterEngine`] backed by the `adblock` crate.
pub struct AdblockFilterEngine {
    // The engine sits behind a mutex so the wrapper stays Sync independent
    // of the adblock crate's internal caching.
    engine: Mutex<Option<Engine>>,
}

impl AdblockFilterEngine {
    /// Create an engine with no rules loaded. Until rules are loaded every
    /// request is allowed.
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(None),
        }
    }
}

impl Default for AdblockFilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterEngine for AdblockFilterEngine {
    fn load_rules(&mut self, rules: &str) -> Result<()> {
        let mut filter_set = FilterSet::new(true);
        let _ = filter_set.add_filter_list(rules, ParseOptions::default());
        let engine = Engine::from_filter_set(filter_set, false);
        *self.engine.lock() = Some(engine);
        Ok(())
    }

    fn should_load(
        &self,
        url: &str,
        source_url: &str,
        resource_type: Option<&str>,
        _request_host: &str,
        _source_host: &str,
    ) -> bool {
        let guard = self.engine.lock();
        let Some(engine) = guard.as_ref() else {
            return true;
        };
        match Request::new(url, source_url, resource_type.unwrap_or("")) {
            Ok(request) => !engine.check_network_request(&request).matched,
            // A request the engine cannot parse cannot be blocked by it
            Err(_) => true,
        }
    }

    fn close(&mut self) {
        *self.engine.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_match() {
        let mut engine = AdblockFilterEngine::new();
        engine.load_rules("/button_facebook.").unwrap();

        assert!(!engine.should_load(
            "https://example.com/button_facebook.",
            "",
            Some("script"),
            "example.com",
            "",
        ));
        assert!(engine.should_load(
            "https://example.com/foo.html",
            "",
            Some("script"),
            "example.com",
            "",
        ));
    }

    #[test]
    fn test_unloaded_engine_allows_everything() {
        let engine = AdblockFilterEngine::new();
        assert!(engine.should_load(
            "https://ads.example.com/banner.js",
            "",
            None,
            "ads.example.com",
            "",
        ));
    }

    #[test]
    fn test_close_releases_rules() {
        let mut engine = AdblockFilterEngine::new();
        engine.load_rules("||ads.example.com^").unwrap();
        assert!(!engine.should_load(
            "https://ads.example.com/banner.js",
            "https://news.example.org/",
            None,
            "ads.example.com",
            "news.example.org",
        ));

        engine.close();
        assert!(engine.should_load(
            "https://ads.example.com/banner.js",
            "https://news.example.org/",
            None,
            "ads.example.com",
            "news.example.org",
        ));
        // Closing twice is harmless
        engine.close();
    }
}
