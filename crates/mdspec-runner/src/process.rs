use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use mdspec_core::ProcessOutput;
use tokio::process::Command;

/// Run `program` with `args` in `cwd` and capture its output.
///
/// The child is killed if the returned future is dropped, so a timeout
/// around this call also stops the process.
///
/// # Errors
/// Returns an error when the process cannot be spawned.
pub async fn run_process(
    program: &str,
    args: &[String],
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> io::Result<ProcessOutput> {
    let command_line = command_line(program, args);
    tracing::debug!(command = %command_line, cwd = %cwd.display(), "spawning process");

    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    let exit_code = output.status.code().unwrap_or(-1);
    tracing::debug!(command = %command_line, exit_code, "process finished");

    Ok(ProcessOutput {
        command: command_line,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
        duration: start.elapsed(),
        temp_files: Vec::new(),
    })
}

/// Run a shell snippet with `bash -c`.
///
/// # Errors
/// Returns an error when bash cannot be spawned.
pub async fn run_shell(
    script: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> io::Result<ProcessOutput> {
    run_process("bash", &["-c".to_owned(), script.to_owned()], cwd, env).await
}

fn command_line(program: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.to_owned());
    for arg in args {
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            parts.push(format!("{arg:?}"));
        } else {
            parts.push(arg.clone());
        }
    }
    parts.join(" ")
}
