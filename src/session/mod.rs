use crate::CommitId;

/// A per-commit cached field: not fetched yet, or loaded for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lazy<T> {
    Pending,
    Loaded(T),
}

impl<T> Lazy<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Lazy::Loaded(value) => Some(value),
            Lazy::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Lazy::Pending)
    }
}

/// One commit in the review session.
///
/// `message` and `diff` are fetched on first visit and never mutated after.
/// `edited` present means the user produced a message that differs from the
/// original after trailing-newline normalization; `message_diff` caches the
/// rendered diff between the two and is invalidated whenever `edited` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSlot {
    pub id: CommitId,
    pub message: Lazy<String>,
    pub diff: Lazy<String>,
    pub edited: Option<String>,
    pub message_diff: Option<String>,
}

impl CommitSlot {
    fn new(id: CommitId) -> Self {
        Self {
            id,
            message: Lazy::Pending,
            diff: Lazy::Pending,
            edited: None,
            message_diff: None,
        }
    }
}

/// The in-memory review session: commits newest-first, with a wrapping cursor.
///
/// Pure state, no I/O. Rebuilt from scratch after every successful rewrite
/// because amending a commit changes the identifiers of everything after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    commits: Vec<CommitSlot>,
    cursor: usize,
}

impl Session {
    pub fn new(ids: Vec<CommitId>) -> Self {
        Self {
            commits: ids.into_iter().map(CommitSlot::new).collect(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamping to the valid range.
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.commits.len().saturating_sub(1));
    }

    /// The commit under the cursor. Panics on an empty session; the loop is
    /// never entered without at least one commit.
    pub fn current(&self) -> &CommitSlot {
        &self.commits[self.cursor]
    }

    pub fn current_mut(&mut self) -> &mut CommitSlot {
        &mut self.commits[self.cursor]
    }

    pub fn get(&self, index: usize) -> Option<&CommitSlot> {
        self.commits.get(index)
    }

    /// Cursor += 1, wrapping to 0 past the last index.
    pub fn move_up(&mut self) {
        if self.commits.is_empty() {
            return;
        }
        self.cursor = if self.cursor + 1 >= self.commits.len() {
            0
        } else {
            self.cursor + 1
        };
    }

    /// Cursor -= 1, wrapping to the last index before 0.
    pub fn move_down(&mut self) {
        if self.commits.is_empty() {
            return;
        }
        self.cursor = if self.cursor == 0 {
            self.commits.len() - 1
        } else {
            self.cursor - 1
        };
    }

    /// Store or clear the pending edit at `index`. The cached message diff is
    /// invalidated either way. Out-of-range indexes are ignored.
    pub fn set_edit(&mut self, index: usize, edit: Option<String>) {
        if let Some(slot) = self.commits.get_mut(index) {
            slot.edited = edit;
            slot.message_diff = None;
        }
    }

    /// Number of commits with a pending edit.
    pub fn pending_count(&self) -> usize {
        self.commits.iter().filter(|c| c.edited.is_some()).count()
    }
}

/// Collapse a run of trailing newlines down to a single one.
pub fn normalize_trailing(text: &str) -> String {
    let mut text = text.to_string();
    while text.len() > 2 && text.ends_with("\n\n") {
        text.pop();
    }
    text
}
