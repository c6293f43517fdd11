use anyhow::{Context, Result};
use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};

use crate::editor::Editor;
use crate::git::Repo;
use crate::rewrite;
use crate::session::{self, Lazy, Session};

/// One decoded keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Enter,
    Char(char),
}

/// The single-character command set. One printable keystroke per command;
/// arrow keys are aliases for `u`/`d`, Enter is swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    Refresh,
    Edit,
    Clear,
    Save,
    Quit,
    Other(char),
}

pub fn command_for(key: Key) -> Option<Command> {
    match key {
        Key::Up => Some(Command::Up),
        Key::Down => Some(Command::Down),
        Key::Enter => None,
        Key::Char('u') => Some(Command::Up),
        Key::Char('d') => Some(Command::Down),
        Key::Char('r') => Some(Command::Refresh),
        Key::Char('e') => Some(Command::Edit),
        Key::Char('c') => Some(Command::Clear),
        Key::Char('s') => Some(Command::Save),
        Key::Char('q') => Some(Command::Quit),
        Key::Char(other) => Some(Command::Other(other)),
    }
}

/// A command that needs a `y` before it runs. Any other key cancels with the
/// session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirm {
    ClearEdit,
    Quit,
}

/// One run of styled text in the render buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub color: Option<Color>,
}

impl Span {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }

    fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }
}

/// The review state machine. Owns the session exclusively; all transitions
/// happen one keypress at a time on a single thread.
pub struct App<R: Repo, E: Editor> {
    repo: R,
    editor: E,
    start_spec: String,
    session: Session,
    confirm: Option<Confirm>,
    notice: Option<String>,
    should_quit: bool,
}

impl<R: Repo, E: Editor> App<R, E> {
    pub fn new(repo: R, editor: E, start_spec: String, session: Session) -> Self {
        Self {
            repo,
            editor,
            start_spec,
            session,
            confirm: None,
            notice: None,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fill the lazy fields needed to render the current commit. Failures
    /// become notices; browsing continues.
    pub fn load_current(&mut self) {
        let id = self.session.current().id.clone();

        if self.session.current().message.is_pending() {
            match self.repo.read_message(&id) {
                Ok(message) => self.session.current_mut().message = Lazy::Loaded(message),
                Err(e) => self.notice = Some(format!("Failed to read the commit message: {e}")),
            }
        }

        if self.session.current().diff.is_pending() {
            match self.repo.read_diff(&id) {
                Ok(diff) => self.session.current_mut().diff = Lazy::Loaded(diff),
                Err(e) => self.notice = Some(format!("Failed to read the commit diff: {e}")),
            }
        }

        let slot = self.session.current();
        if slot.edited.is_some() && slot.message_diff.is_none() {
            let original = slot.message.get().cloned();
            let edited = slot.edited.clone();
            if let (Some(original), Some(edited)) = (original, edited) {
                match self.repo.message_diff(&original, &edited) {
                    Ok(diff) => self.session.current_mut().message_diff = Some(diff),
                    Err(e) => {
                        self.notice = Some(format!("Failed to render the message diff: {e}"))
                    }
                }
            }
        }
    }

    /// Process one keypress. Only a fatal error (the range re-listing after a
    /// successful rewrite failing) propagates; everything else is a notice.
    pub fn handle_key(&mut self, key: Key) -> Result<()> {
        self.notice = None;

        if let Some(confirm) = self.confirm.take() {
            let confirmed = matches!(key, Key::Char('y') | Key::Char('Y'));
            match confirm {
                Confirm::ClearEdit if confirmed => {
                    let cursor = self.session.cursor();
                    self.session.set_edit(cursor, None);
                    self.notice = Some("The edited message was cleared.".to_string());
                }
                Confirm::ClearEdit => {
                    self.notice = Some("The edited message was not cleared.".to_string());
                }
                Confirm::Quit if confirmed => self.should_quit = true,
                Confirm::Quit => {}
            }
            return Ok(());
        }

        let Some(command) = command_for(key) else {
            return Ok(());
        };

        match command {
            Command::Up => self.session.move_up(),
            Command::Down => self.session.move_down(),
            Command::Refresh => {}
            Command::Edit => self.edit_current(),
            Command::Clear => {
                if self.session.current().edited.is_some() {
                    self.confirm = Some(Confirm::ClearEdit);
                } else {
                    self.notice = Some("No edited message for this commit.".to_string());
                }
            }
            Command::Save => self.save_current()?,
            Command::Quit => {
                if self.session.pending_count() > 0 {
                    self.confirm = Some(Confirm::Quit);
                } else {
                    self.should_quit = true;
                }
            }
            Command::Other(c) => self.notice = Some(format!("Unknown command: {c}")),
        }

        Ok(())
    }

    /// Open the editor on the edited message (or the original), then compare
    /// the result against the original: different means a pending edit,
    /// identical means any pending edit is reverted. Both sides are compared
    /// after trailing-newline normalization.
    fn edit_current(&mut self) {
        if self.session.current().message.is_pending() {
            let id = self.session.current().id.clone();
            match self.repo.read_message(&id) {
                Ok(message) => self.session.current_mut().message = Lazy::Loaded(message),
                Err(e) => {
                    self.notice = Some(format!("Failed to read the commit message: {e}"));
                    return;
                }
            }
        }

        let Some(original) = self.session.current().message.get().cloned() else {
            return;
        };
        let seed = self
            .session
            .current()
            .edited
            .clone()
            .unwrap_or_else(|| original.clone());

        let result = match self.editor.edit(&session::normalize_trailing(&seed)) {
            Ok(text) => session::normalize_trailing(&text),
            Err(e) => {
                self.notice = Some(format!("Editor failed: {e}"));
                return;
            }
        };

        let cursor = self.session.cursor();
        if result == session::normalize_trailing(&original) {
            self.session.set_edit(cursor, None);
        } else {
            self.session.set_edit(cursor, Some(result));
        }
    }

    /// Run the rewrite protocol for the cursor position, then rebuild the
    /// whole session: every position above the amend point has a new
    /// identifier, so all caches and edits are discarded.
    fn save_current(&mut self) -> Result<()> {
        let k = self.session.cursor();
        if self.session.current().edited.is_none() {
            self.notice = Some("No edited message for this commit.".to_string());
            return Ok(());
        }

        match rewrite::apply(&mut self.repo, &self.session, k) {
            Ok(backup) => {
                let ids = self
                    .repo
                    .list_range(&self.start_spec)
                    .with_context(|| {
                        format!(
                            "failed to re-list {}..HEAD after the rewrite",
                            self.start_spec
                        )
                    })?;
                if ids.is_empty() {
                    self.should_quit = true;
                    return Ok(());
                }
                self.session = Session::new(ids);
                self.session.set_cursor(k);
                self.notice = Some(format!(
                    "The commit message was successfully edited. Backup branch: {backup}."
                ));
            }
            Err(e) => self.notice = Some(format!("Failed to save the edited message: {e}")),
        }

        Ok(())
    }

    /// Build the screen as a styled text buffer. The terminal owner paints
    /// it; the commit diff already carries git's own ANSI colors and is
    /// emitted verbatim.
    pub fn screen(&self, width: usize) -> Vec<Span> {
        let mut spans = Vec::new();
        let slot = self.session.current();

        spans.push(Span::plain(format!(
            "Reviewing commit #{}/{} ({}). There are {} edited commits.\n\n",
            self.session.cursor() + 1,
            self.session.len(),
            slot.id,
            self.session.pending_count()
        )));

        if let Some(notice) = &self.notice {
            spans.push(Span::colored(format!("{notice}\n\n"), Color::White));
        }

        if let Some(edited) = &slot.edited {
            spans.push(Span::colored(
                "This commit message has been modified.\n\n",
                Color::White,
            ));
            spans.push(Span::colored(separator(width), Color::White));
            spans.push(Span::colored(format!("{edited}\n"), Color::DarkGreen));
            spans.push(Span::colored(separator(width), Color::White));
            if let Some(diff) = &slot.message_diff {
                spans.push(Span::plain(diff.clone()));
            }
        } else if let Some(message) = slot.message.get() {
            spans.push(Span::plain(message.clone()));
        }

        spans.push(Span::colored(separator(width), Color::White));
        spans.push(Span::plain("\n"));
        if let Some(diff) = slot.diff.get() {
            spans.push(Span::plain(diff.clone()));
        }

        if let Some(confirm) = &self.confirm {
            let prompt = match confirm {
                Confirm::ClearEdit => {
                    "Clear the edited message for this commit? Press 'y' to confirm."
                }
                Confirm::Quit => {
                    "There are unsaved edits. Are you sure you want to quit? Press 'y' to exit."
                }
            };
            spans.push(Span::colored(format!("\n{prompt}\n"), Color::White));
        }

        spans
    }
}

fn separator(width: usize) -> String {
    let mut line = "-".repeat(width.max(1));
    line.push('\n');
    line
}

/// Drive the state machine against the real terminal until the user quits.
pub fn run<R: Repo, E: Editor>(mut app: App<R, E>) -> Result<()> {
    // Restore the terminal even if a render or handler panics.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        original_hook(panic_info);
    }));

    loop {
        app.load_current();
        let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
        paint(&app.screen(width))?;

        let key = read_key()?;
        app.handle_key(key)?;

        if app.should_quit() {
            return Ok(());
        }
    }
}

fn paint(spans: &[Span]) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        Clear(ClearType::All),
        Clear(ClearType::Purge),
        MoveTo(0, 0)
    )
    .context("failed to clear the screen")?;

    for span in spans {
        match span.color {
            Some(color) => execute!(
                stdout,
                SetForegroundColor(color),
                Print(&span.text),
                ResetColor
            )?,
            None => execute!(stdout, Print(&span.text))?,
        }
    }

    stdout.flush()?;
    Ok(())
}

/// Block for exactly one keypress. Raw mode is held only while waiting so
/// ordinary line-buffered printing stays intact between reads.
fn read_key() -> Result<Key> {
    struct RawGuard;
    impl Drop for RawGuard {
        fn drop(&mut self) {
            let _ = disable_raw_mode();
        }
    }

    enable_raw_mode().context("failed to enable raw mode")?;
    let _guard = RawGuard;

    loop {
        if let Event::Key(key) = event::read().context("failed to read a key")? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            // Ctrl+C arrives as a key event in raw mode; treat it as quit.
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(Key::Char('q'));
            }
            match key.code {
                KeyCode::Up => return Ok(Key::Up),
                KeyCode::Down => return Ok(Key::Down),
                KeyCode::Enter => return Ok(Key::Enter),
                KeyCode::Char(c) => return Ok(Key::Char(c)),
                _ => continue,
            }
        }
    }
}
