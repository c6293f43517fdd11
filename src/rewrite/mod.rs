use thiserror::Error;

use crate::CommitId;
use crate::git::{GitError, Repo};
use crate::session::Session;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("no edited message at position {0}")]
    NothingToSave(usize),
    #[error("backup failed, nothing was changed: {0}")]
    Backup(#[source] GitError),
    #[error("rewrite failed after backup {backup}; restore from it manually: {source}")]
    Step {
        backup: String,
        #[source]
        source: GitError,
    },
}

pub type Result<T> = std::result::Result<T, RewriteError>;

/// Apply the pending edit at position `k` as a durable history rewrite.
///
/// Protocol: backup the branch, hard-reset to the commit at `k`, amend its
/// message, then cherry-pick positions `k-1` down to `0` (oldest first). The
/// replay ids are captured before the reset; the reset only moves the branch
/// pointer, the commit objects stay reachable.
///
/// There is no automatic rollback. A failure after the backup leaves the
/// branch partially rewritten and the returned error names the backup branch
/// to restore from. On success the session is stale — every position above
/// `k` now has a new identifier — and the caller must rebuild it from a fresh
/// range listing.
pub fn apply<R: Repo>(repo: &mut R, session: &Session, k: usize) -> Result<String> {
    let slot = session
        .get(k)
        .filter(|slot| slot.edited.is_some())
        .ok_or(RewriteError::NothingToSave(k))?;
    let target = slot.id.clone();
    let edited = slot.edited.clone().unwrap_or_default();

    let replay: Vec<CommitId> = (0..k)
        .rev()
        .filter_map(|i| session.get(i).map(|slot| slot.id.clone()))
        .collect();

    let backup = repo.backup().map_err(RewriteError::Backup)?;
    let step = |source: GitError| RewriteError::Step {
        backup: backup.clone(),
        source,
    };

    repo.reset_hard(&target).map_err(step)?;
    repo.amend_message(&edited).map_err(step)?;
    for id in &replay {
        repo.cherry_pick(id).map_err(step)?;
    }

    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Result as GitResult;

    /// Records every mutating call in order; reads are canned.
    #[derive(Default)]
    struct RecordingRepo {
        ops: Vec<String>,
        fail_backup: bool,
        fail_pick: Option<String>,
    }

    impl Repo for RecordingRepo {
        fn branch_contains(&mut self, _spec: &str) -> GitResult<bool> {
            Ok(true)
        }
        fn list_range(&mut self, _start: &str) -> GitResult<Vec<CommitId>> {
            Ok(vec![])
        }
        fn read_message(&mut self, _id: &CommitId) -> GitResult<String> {
            Ok(String::new())
        }
        fn read_diff(&mut self, _id: &CommitId) -> GitResult<String> {
            Ok(String::new())
        }
        fn message_diff(&mut self, _original: &str, _edited: &str) -> GitResult<String> {
            Ok(String::new())
        }
        fn backup(&mut self) -> GitResult<String> {
            if self.fail_backup {
                return Err(GitError::InvalidRef("backup refused".to_string()));
            }
            self.ops.push("backup".to_string());
            Ok("reword-backup-test".to_string())
        }
        fn reset_hard(&mut self, id: &CommitId) -> GitResult<()> {
            self.ops.push(format!("reset {id}"));
            Ok(())
        }
        fn amend_message(&mut self, message: &str) -> GitResult<()> {
            self.ops.push(format!("amend {}", message.trim_end()));
            Ok(())
        }
        fn cherry_pick(&mut self, id: &CommitId) -> GitResult<()> {
            if self.fail_pick.as_deref() == Some(id.as_str()) {
                return Err(GitError::InvalidRef(format!("conflict on {id}")));
            }
            self.ops.push(format!("pick {id}"));
            Ok(())
        }
    }

    fn session_with_edit(n: usize, k: usize) -> Session {
        let mut session =
            Session::new((0..n).map(|i| CommitId::new(format!("c{i}"))).collect());
        session.set_edit(k, Some("reworded\n".to_string()));
        session
    }

    #[test]
    fn replays_newer_commits_oldest_first() {
        let mut repo = RecordingRepo::default();
        let session = session_with_edit(5, 2);

        apply(&mut repo, &session, 2).unwrap();

        assert_eq!(
            repo.ops,
            vec!["backup", "reset c2", "amend reworded", "pick c1", "pick c0"]
        );
    }

    #[test]
    fn saving_the_tip_needs_no_replays() {
        let mut repo = RecordingRepo::default();
        let session = session_with_edit(3, 0);

        apply(&mut repo, &session, 0).unwrap();

        assert_eq!(repo.ops, vec!["backup", "reset c0", "amend reworded"]);
    }

    #[test]
    fn failed_backup_aborts_before_any_destructive_step() {
        let mut repo = RecordingRepo {
            fail_backup: true,
            ..Default::default()
        };
        let session = session_with_edit(3, 1);

        let err = apply(&mut repo, &session, 1).unwrap_err();

        assert!(matches!(err, RewriteError::Backup(_)));
        assert!(repo.ops.is_empty(), "no command may run after a failed backup");
    }

    #[test]
    fn failed_replay_stops_and_names_the_backup() {
        let mut repo = RecordingRepo {
            fail_pick: Some("c1".to_string()),
            ..Default::default()
        };
        let session = session_with_edit(4, 2);

        let err = apply(&mut repo, &session, 2).unwrap_err();

        match err {
            RewriteError::Step { backup, .. } => assert_eq!(backup, "reword-backup-test"),
            other => panic!("expected Step, got {other:?}"),
        }
        // c0 must not be picked after c1 failed.
        assert_eq!(repo.ops, vec!["backup", "reset c2", "amend reworded"]);
    }

    #[test]
    fn position_without_edit_is_rejected() {
        let mut repo = RecordingRepo::default();
        let session = Session::new(vec![CommitId::new("c0")]);

        let err = apply(&mut repo, &session, 0).unwrap_err();
        assert!(matches!(err, RewriteError::NothingToSave(0)));
        assert!(repo.ops.is_empty());
    }
}
