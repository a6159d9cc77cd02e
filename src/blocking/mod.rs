//! Rule compilation and blocking decisions.

mod engine;
mod exceptions;
mod provider;

pub use engine::{AdblockFilterEngine, FilterEngine};
pub use provider::{BlockingProvider, EngineFactory};

pub(crate) use exceptions::{to_exception_rules, ExceptionStore};
