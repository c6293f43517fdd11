pub mod cli;
pub mod editor;
pub mod exec;
pub mod git;
pub mod review;
pub mod rewrite;
pub mod session;

use std::fmt;

/// Opaque commit identifier (a full content hash in git).
///
/// Identifiers are only ever passed back to git verbatim; nothing in this
/// crate inspects their contents beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
