use std::env;
use std::ffi::OsString;
use std::io::Write;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::exec::{self, ExecError};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("editor exited with status {0}")]
    Failed(i32),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// External message editor, injected so the review loop can be tested with a
/// scripted fake.
pub trait Editor {
    /// Open `initial` in the editor, block until it closes, and return the
    /// text the user saved.
    fn edit(&mut self, initial: &str) -> Result<String>;
}

/// Editor resolved from `$VISUAL`, then `$EDITOR`, falling back to `vi`.
///
/// Extra whitespace-separated tokens in the variable become leading arguments,
/// so configurations like `EDITOR="subl -n -w"` work as expected. The commit
/// message travels through a temp file that is removed on every exit path.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    program: String,
    args: Vec<String>,
}

impl ExternalEditor {
    pub fn from_env() -> Self {
        let raw = env::var("VISUAL")
            .or_else(|_| env::var("EDITOR"))
            .unwrap_or_else(|_| "vi".to_string());
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "vi".to_string());
        Self {
            program,
            args: parts.collect(),
        }
    }
}

impl Editor for ExternalEditor {
    fn edit(&mut self, initial: &str) -> Result<String> {
        let mut file = NamedTempFile::new()?;
        file.write_all(initial.as_bytes())?;
        file.flush()?;

        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(file.path().into());

        let out = exec::run(&self.program, args, false)?;
        if !out.success() {
            return Err(EditorError::Failed(out.status));
        }

        Ok(std::fs::read_to_string(file.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_what_the_editor_wrote() {
        // "Editor" that appends a line to the file it is given.
        let mut editor = ExternalEditor {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo edited >> \"$0\"".to_string()],
        };
        let result = editor.edit("original\n").unwrap();
        assert_eq!(result, "original\nedited\n");
    }

    #[test]
    fn failing_editor_is_an_error() {
        let mut editor = ExternalEditor {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 5".to_string()],
        };
        let err = editor.edit("text\n").unwrap_err();
        assert!(matches!(err, EditorError::Failed(5)));
    }
}
