use clap::Parser;

/// Walk the commits in `<START>..HEAD`, rewrite their messages in your
/// editor, and apply one rewrite at a time via reset, amend and replay.
#[derive(Parser, Debug)]
#[command(name = "git-reword", about = "Interactively rewrite commit messages in start..HEAD")]
pub struct Cli {
    /// Start of the commit range; the commits strictly after this ref up to
    /// HEAD are reviewed, newest first.
    pub start: String,
}
