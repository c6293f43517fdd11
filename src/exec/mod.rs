use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("command failed ({status}):\n{output}")]
    Failed { status: i32, output: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Combined output and exit status of a finished child process.
#[derive(Debug, Clone)]
pub struct Output {
    pub text: String,
    pub status: i32,
}

impl Output {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Run a command to completion.
///
/// With `capture` set, stdout and stderr are collected line-by-line into one
/// buffer in the order the lines arrive, and the child's own console output
/// is suppressed. Without it the child inherits the terminal and the returned
/// text is empty; used for commands whose live output the user should see.
pub fn run<I, S>(program: &str, args: I, capture: bool) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);

    if !capture {
        let status = cmd.status().map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;
        return Ok(Output {
            text: String::new(),
            status: status.code().unwrap_or(-1),
        });
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let buffer = Arc::new(Mutex::new(String::new()));
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
    }

    let status = child.wait()?;

    // Join both reader threads after the child exits. Waiting only on the
    // process would drop lines still sitting in the pipes.
    for handle in readers {
        let _ = handle.join();
    }

    let text = buffer.lock().map(|buf| buf.clone()).unwrap_or_default();
    Ok(Output {
        text,
        status: status.code().unwrap_or(-1),
    })
}

/// Like [`run`], but a non-zero exit becomes [`ExecError::Failed`] carrying
/// the combined output.
pub fn run_checked<I, S>(program: &str, args: I, capture: bool) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run(program, args, capture)?;
    if !output.success() {
        return Err(ExecError::Failed {
            status: output.status,
            output: output.text,
        });
    }
    Ok(output)
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    buffer: Arc<Mutex<String>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if let Ok(mut buf) = buffer.lock() {
                buf.push_str(&line);
                buf.push('\n');
            }
        }
    })
}
