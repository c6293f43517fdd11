use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::CommitId;
use crate::exec::{self, ExecError, Output};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("the spec {0} is not in the current branch's history")]
    NotInHistory(String),
    #[error("failed to check the current branch:\n{0}")]
    BranchCheckFailed(String),
    #[error("failed to list the commits:\n{0}")]
    RangeQueryFailed(String),
    #[error("invalid git ref: {0}")]
    InvalidRef(String),
    #[error(transparent)]
    Command(#[from] ExecError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;

/// The git operations the review loop and the rewrite protocol need.
///
/// A trait seam so the navigator and the applier can be driven with a
/// recording fake in tests; [`GitCli`] is the real implementation.
pub trait Repo {
    /// Whether `spec` is an ancestor of the current branch tip.
    fn branch_contains(&mut self, spec: &str) -> Result<bool>;
    /// Commit ids in `start..HEAD`, newest first.
    fn list_range(&mut self, start: &str) -> Result<Vec<CommitId>>;
    fn read_message(&mut self, id: &CommitId) -> Result<String>;
    /// The commit's own diff, with color when git supports it.
    fn read_diff(&mut self, id: &CommitId) -> Result<String>;
    /// Rendered line diff between two message texts.
    fn message_diff(&mut self, original: &str, edited: &str) -> Result<String>;
    /// Create a named recovery point for the whole branch; returns its name.
    fn backup(&mut self) -> Result<String>;
    fn reset_hard(&mut self, id: &CommitId) -> Result<()>;
    /// Amend the tip commit's message.
    fn amend_message(&mut self, message: &str) -> Result<()>;
    fn cherry_pick(&mut self, id: &CommitId) -> Result<()>;
}

/// Shells out to the git command line.
///
/// Commands run in `dir` when set, otherwise in the process working
/// directory. Destructive operations (reset, amend, cherry-pick) run with
/// inherited streams so the user sees git's own progress and errors live.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    dir: Option<PathBuf>,
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn args(&self, rest: &[&str]) -> Vec<OsString> {
        let mut full = Vec::with_capacity(rest.len() + 2);
        if let Some(dir) = &self.dir {
            full.push(OsString::from("-C"));
            full.push(dir.clone().into_os_string());
        }
        full.extend(rest.iter().map(OsString::from));
        full
    }

    fn run(&self, rest: &[&str], capture: bool) -> exec::Result<Output> {
        exec::run("git", self.args(rest), capture)
    }

    fn run_checked(&self, rest: &[&str], capture: bool) -> exec::Result<Output> {
        exec::run_checked("git", self.args(rest), capture)
    }
}

impl Repo for GitCli {
    fn branch_contains(&mut self, spec: &str) -> Result<bool> {
        let out = self.run(&["branch", "--contains", spec], true)?;
        if !out.success() {
            return Err(GitError::BranchCheckFailed(out.text));
        }
        Ok(!out.text.trim().is_empty())
    }

    fn list_range(&mut self, start: &str) -> Result<Vec<CommitId>> {
        let range = format!("{start}..HEAD");
        let out = self.run(&["log", &range, "--pretty=%H"], true)?;
        if !out.success() {
            return Err(GitError::RangeQueryFailed(out.text));
        }
        Ok(out
            .text
            .lines()
            .filter(|line| !line.is_empty())
            .map(CommitId::new)
            .collect())
    }

    fn read_message(&mut self, id: &CommitId) -> Result<String> {
        let out = self.run_checked(&["log", "-1", "--pretty=%B", id.as_str()], true)?;
        Ok(out.text)
    }

    fn read_diff(&mut self, id: &CommitId) -> Result<String> {
        let range = format!("{id}^..{id}");
        let out = self.run_checked(&["diff", "--color=always", &range], true)?;
        Ok(out.text)
    }

    fn message_diff(&mut self, original: &str, edited: &str) -> Result<String> {
        let a = write_temp(original)?;
        let b = write_temp(edited)?;
        let mut args = self.args(&["diff", "--color=always", "--no-index"]);
        args.push(a.path().into());
        args.push(b.path().into());
        // Exit status 1 here means "differences found", which is the point;
        // the temp files are removed on drop whatever happens.
        let out = exec::run("git", args, true)?;
        Ok(out.text)
    }

    fn backup(&mut self) -> Result<String> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let name = format!("reword-backup-{stamp}");
        self.run_checked(&["branch", &name], false)?;
        Ok(name)
    }

    fn reset_hard(&mut self, id: &CommitId) -> Result<()> {
        self.run_checked(&["reset", "--hard", id.as_str()], false)?;
        Ok(())
    }

    fn amend_message(&mut self, message: &str) -> Result<()> {
        let file = write_temp(message)?;
        let mut args = self.args(&["commit", "--amend", "-F"]);
        args.push(file.path().into());
        exec::run_checked("git", args, false)?;
        Ok(())
    }

    fn cherry_pick(&mut self, id: &CommitId) -> Result<()> {
        self.run_checked(&["cherry-pick", id.as_str()], false)?;
        Ok(())
    }
}

fn write_temp(text: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Reject shell metacharacters in a user-supplied ref before it reaches any
/// command line.
pub fn validate_git_ref(ref_str: &str) -> Result<()> {
    if ref_str.is_empty() {
        return Err(GitError::InvalidRef("empty git ref".to_string()));
    }

    for ch in ref_str.chars() {
        if !ch.is_alphanumeric()
            && !matches!(
                ch,
                '-' | '_' | '/' | '.' | '~' | '^' | '@' | ':' | '{' | '}'
            )
        {
            return Err(GitError::InvalidRef(format!(
                "invalid character in git ref: '{ch}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_git_ref_accepts_plain_refs() {
        assert!(validate_git_ref("main").is_ok());
        assert!(validate_git_ref("feature/foo").is_ok());
        assert!(validate_git_ref("HEAD~3").is_ok());
        assert!(validate_git_ref("v1.2.3").is_ok());
        assert!(validate_git_ref("@{-1}").is_ok());
    }

    #[test]
    fn validate_git_ref_rejects_shell_metacharacters() {
        assert!(validate_git_ref(";rm -rf").is_err());
        assert!(validate_git_ref("$(cmd)").is_err());
        assert!(validate_git_ref("foo bar").is_err());
        assert!(validate_git_ref("foo\nbar").is_err());
        assert!(validate_git_ref("").is_err());
    }

    #[test]
    fn message_diff_reports_changed_lines() {
        let mut repo = GitCli::new();
        let diff = repo
            .message_diff("old subject\n", "new subject\n")
            .unwrap();
        assert!(diff.contains("old subject"));
        assert!(diff.contains("new subject"));
    }

    #[test]
    fn message_diff_of_identical_texts_is_empty() {
        let mut repo = GitCli::new();
        let diff = repo.message_diff("same\n", "same\n").unwrap();
        assert!(diff.trim().is_empty());
    }
}
