//! Ruleset categories and client-facing value types.

use std::fmt;
use std::time::SystemTime;

/// Classification of a blocking rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RulesetType {
    /// Advertising filter rules
    AdBlocking,
    /// Privacy and tracker filter rules
    Privacy,
    /// Social media widget filter rules
    Social,
    /// Unrecognized category, never active and never downloadable
    Unknown,
}

/// Category codes embedded in remote object metadata. Matching is
/// case-sensitive after trimming.
pub(crate) const CATEGORY_CODE_AD: &str = "AD";
pub(crate) const CATEGORY_CODE_PRIVACY: &str = "PRIVACY";
pub(crate) const CATEGORY_CODE_SOCIAL: &str = "SOCIAL";

impl RulesetType {
    /// Get the name of this ruleset type, used as the preference key.
    pub fn name(&self) -> &'static str {
        match self {
            RulesetType::AdBlocking => "AD_BLOCKING",
            RulesetType::Privacy => "PRIVACY",
            RulesetType::Social => "SOCIAL",
            RulesetType::Unknown => "UNKNOWN",
        }
    }

    /// Fixed local filename under which this category's rules are cached.
    ///
    /// Returns `None` for categories with no local cache mapping.
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            RulesetType::AdBlocking => Some("easylist.txt"),
            RulesetType::Privacy => Some("easyprivacy.txt"),
            RulesetType::Social => Some("fanboy-social.txt"),
            RulesetType::Unknown => None,
        }
    }

    /// Fixed sub-path of this category's rules below the service top path.
    pub fn sub_path(&self) -> Option<&'static str> {
        match self {
            RulesetType::AdBlocking => Some("adblock-plus/AD"),
            RulesetType::Privacy => Some("adblock-plus/PRIVACY"),
            RulesetType::Social => Some("adblock-plus/SOCIAL"),
            RulesetType::Unknown => None,
        }
    }

    /// Parse a category code from remote object metadata.
    pub fn from_category_code(code: &str) -> Self {
        match code.trim() {
            CATEGORY_CODE_AD => RulesetType::AdBlocking,
            CATEGORY_CODE_PRIVACY => RulesetType::Privacy,
            CATEGORY_CODE_SOCIAL => RulesetType::Social,
            _ => RulesetType::Unknown,
        }
    }
}

impl fmt::Display for RulesetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All ruleset types that can be activated and updated.
pub fn all_rulesets() -> [RulesetType; 3] {
    [
        RulesetType::AdBlocking,
        RulesetType::Privacy,
        RulesetType::Social,
    ]
}

/// A rule set available from the remote service.
///
/// Created from catalog listings; `id` is the remote object key and `e_tag`
/// changes whenever the remote content changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruleset {
    /// Remote object key identifying this ruleset
    pub id: String,
    /// Category of the rules
    pub kind: RulesetType,
    /// Opaque version marker of the remote content
    pub e_tag: String,
    /// When the remote content was last modified
    pub updated_at: SystemTime,
}

/// Status of the filtering engine owned by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEngineStatus {
    /// The client has been constructed but no rebuild has started
    Unknown,
    /// The filter engine is (re)initializing
    Preparing,
    /// The filter engine is ready to be used
    Ready,
    /// The filter engine failed to update or initialize correctly
    Error,
}

impl fmt::Display for FilterEngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterEngineStatus::Unknown => "UNKNOWN",
            FilterEngineStatus::Preparing => "PREPARING",
            FilterEngineStatus::Ready => "READY",
            FilterEngineStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Verdict of evaluating a URL against the active rules and exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckUrlResult {
    /// The URL is blocked by the active rulesets and no exception applies
    Blocked,
    /// The URL is not blocked and should be loaded
    Allowed,
}
