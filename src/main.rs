use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use std::process::ExitCode;

use git_reword::cli::Cli;
use git_reword::editor::ExternalEditor;
use git_reword::git::{self, GitCli, GitError, Repo};
use git_reword::review::{self, App};
use git_reword::session::Session;

fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            // Usage problems (missing or extra arguments) go to stdout.
            println!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> Result<ExitCode> {
    git::validate_git_ref(&args.start)?;

    let mut repo = GitCli::new();
    if !repo.branch_contains(&args.start)? {
        return Err(GitError::NotInHistory(args.start).into());
    }

    let ids = repo
        .list_range(&args.start)
        .with_context(|| format!("failed to list the commits for {}..HEAD", args.start))?;
    if ids.is_empty() {
        println!("No commits in {}..HEAD.", args.start);
        return Ok(ExitCode::SUCCESS);
    }

    let app = App::new(
        repo,
        ExternalEditor::from_env(),
        args.start,
        Session::new(ids),
    );
    review::run(app)?;

    Ok(ExitCode::SUCCESS)
}
