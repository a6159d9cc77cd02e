//! Persistence of the blocking-exception set and synthesis of the match
//! rules that represent it.
//!
//! Exceptions are kept in a newline-delimited file, one record per line. A
//! trailing `/` marks a PAGE exception; its absence marks a HOST exception.
//! The stored set is turned into anchored filter rules that MATCH excepted
//! URLs; the provider inverts the engine's answer, so a match means "do not
//! block".

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use crate::exception::{parse_host_and_path, BlockingException, ExceptionKind};
use crate::storage::StorageProvider;

/// Fixed filename of the serialized exception record.
pub(crate) const EXCEPTIONS_FILE: &str = "exceptions.txt";

/// Suffix marking a PAGE exception line.
const PAGE_EXCEPTION_SUFFIX: &str = "/";

/// Reads and writes the exception set through a [`StorageProvider`].
pub(crate) struct ExceptionStore {
    storage: Arc<dyn StorageProvider>,
}

impl ExceptionStore {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Load the stored exception set. A missing record yields an empty set.
    pub fn read_exceptions(&self) -> io::Result<HashSet<BlockingException>> {
        let Some(bytes) = self.storage.read(EXCEPTIONS_FILE)? else {
            return Ok(HashSet::new());
        };
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_exception_line)
            .collect())
    }

    /// Replace the stored exception set. Lines are sorted so the serialized
    /// record is deterministic for a given set.
    pub fn write_exceptions(&self, exceptions: &HashSet<BlockingException>) -> io::Result<()> {
        let mut lines: Vec<String> = exceptions.iter().map(serialize_exception_line).collect();
        lines.sort();

        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        self.storage.write(EXCEPTIONS_FILE, out.as_bytes())
    }

    /// Delete the stored exception set. Idempotent.
    pub fn delete_exceptions(&self) -> io::Result<()> {
        self.storage.delete(EXCEPTIONS_FILE)?;
        Ok(())
    }
}

fn parse_exception_line(line: &str) -> BlockingException {
    let trimmed = line.trim();
    match trimmed.strip_suffix(PAGE_EXCEPTION_SUFFIX) {
        Some(source) => BlockingException::new(source, ExceptionKind::Page),
        None => BlockingException::new(trimmed, ExceptionKind::Host),
    }
}

fn serialize_exception_line(exception: &BlockingException) -> String {
    match exception.kind {
        ExceptionKind::Page => format!("{}{}", exception.source, PAGE_EXCEPTION_SUFFIX),
        ExceptionKind::Host => exception.source.clone(),
    }
}

/// Synthesize anchored match rules covering the excepted URLs.
///
/// Each exception yields one `http://` and one `https://` pattern, anchored
/// at the scheme boundary and terminated with a separator so the pattern
/// covers neither super-domains nor deeper sub-paths. Returns `None` for an
/// empty set.
pub(crate) fn to_exception_rules(exceptions: &HashSet<BlockingException>) -> Option<Vec<u8>> {
    if exceptions.is_empty() {
        return None;
    }
    let mut rules = String::new();
    for exception in exceptions {
        let (host, path) = match parse_host_and_path(&exception.source) {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!("Skipping unusable exception {:?}: {e}", exception.source);
                continue;
            }
        };
        match exception.kind {
            ExceptionKind::Host => {
                rules.push_str(&format!("|http://{host}^\n"));
                rules.push_str(&format!("|https://{host}^\n"));
            }
            ExceptionKind::Page => {
                rules.push_str(&format!("|http://{host}{path}^\n"));
                rules.push_str(&format!("|https://{host}{path}^\n"));
            }
        }
    }
    Some(rules.into_bytes())
}
