use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

const TRUNCATION_MARKER: &str = "\n[...truncated...]\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs `program` in `cwd` with stdin closed and both output streams
/// captured, waiting for it to exit. Each stream keeps at most `limit` bytes.
///
/// A child terminated by a signal reports exit code `-1`.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or its output streams
/// cannot be read.
pub async fn run_captured(program: &Path, cwd: &Path, limit: usize) -> io::Result<RunOutput> {
    let mut child = Command::new(program)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout missing"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr missing"))?;

    let (status, (mut stdout, stdout_truncated), (mut stderr, stderr_truncated)) = tokio::try_join!(
        child.wait(),
        read_to_string_limited(stdout, limit),
        read_to_string_limited(stderr, limit),
    )?;
    if stdout_truncated {
        stdout.push_str(TRUNCATION_MARKER);
    }
    if stderr_truncated {
        stderr.push_str(TRUNCATION_MARKER);
    }
    Ok(RunOutput {
        code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

async fn read_to_string_limited(
    mut reader: impl AsyncRead + Unpin,
    limit: usize,
) -> io::Result<(String, bool)> {
    let mut buffer = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        append_limited(&mut buffer, &chunk[..read], limit, &mut truncated);
    }
    Ok((String::from_utf8_lossy(&buffer).into_owned(), truncated))
}

// Keeps draining past the limit so the child never blocks on a full pipe.
fn append_limited(buffer: &mut Vec<u8>, chunk: &[u8], limit: usize, truncated: &mut bool) {
    let remaining = limit.saturating_sub(buffer.len());
    if chunk.len() > remaining {
        *truncated = true;
    }
    buffer.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
}
