//! Rulegate - content-blocking ruleset management and URL blocking decisions.
//!
//! This crate manages the lifecycle of content-blocking rule sets
//! (advertising, privacy-tracking, social-widget lists), caches their rule
//! data locally, and evaluates network requests against the active rules
//! and user-defined exceptions.
//!
//! # Features
//!
//! - **Ruleset catalog**: list the rule sets a remote service publishes
//! - **ETag-gated updates**: download rule data only when it changed
//! - **Activation separate from download**: refreshing the cache never
//!   silently changes live blocking behavior
//! - **Blocking exceptions**: host- and page-level allow rules that
//!   override blocking decisions
//! - **Bounded-latency verdicts**: compiled matchers answer
//!   BLOCKED/ALLOWED queries without touching storage or network
//! - **Thread-safe**: queries may run concurrently with rebuilds
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use rulegate::{
//!     all_rulesets, AdTrackerBlockerClient, BlockingException, CheckUrlResult,
//!     ClientConfig, FileStorageProvider, RulesetType,
//! };
//!
//! let config = ClientConfig {
//!     object_store: Some(my_object_store),
//!     storage: Some(Arc::new(FileStorageProvider::new("/var/cache/rulegate"))),
//!     ..ClientConfig::default()
//! };
//! let client = AdTrackerBlockerClient::new(config)?;
//!
//! // Cache the published rules, then activate the categories to enforce
//! client.update_rulesets(&all_rulesets()).await?;
//! client.set_active_rulesets(&[RulesetType::AdBlocking, RulesetType::Privacy]).await?;
//!
//! let verdict = client
//!     .check_url("http://ad.doubleclick.net", Some("http://somehost.eu/contact"), None)
//!     .await?;
//! assert_eq!(verdict, CheckUrlResult::Blocked);
//!
//! // Let one page through
//! client.add_exceptions(&[BlockingException::for_host("somehost.eu")?]).await?;
//! ```
//!
//! # Readiness
//!
//! Construction kicks off an asynchronous rebuild of the filter engine;
//! `check_url` rejects queries until `status()` is READY. Callers that need
//! a ready client should poll the status (around every 100ms with a bounded
//! timeout works well), treating PREPARING as "keep waiting".

mod catalog;
mod client;
mod error;
mod exception;
mod types;

pub mod blocking;
pub mod storage;
pub mod store;

// Re-export core types
pub use error::{Error, Result, StoreError};
pub use types::{all_rulesets, CheckUrlResult, FilterEngineStatus, Ruleset, RulesetType};

// Re-export the exception types
pub use exception::{BlockingException, ExceptionKind};

// Re-export the client
pub use client::{AdTrackerBlockerClient, ClientConfig};

// Re-export collaborator interfaces and defaults
pub use catalog::FILTER_LISTS_PATH;
pub use storage::{FileStorageProvider, StorageProvider};
pub use store::{ObjectInfo, ObjectStore};
