//! gopass secret backend
//!
//! Drives the `gopass` executable: `show -n` to read, `insert -f` with the
//! secret on stdin to write, `ls --flat` to list and `rm -f` to delete.
//! Every call checks the cancel token before spawning.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

use super::SecretBackend;
use crate::cancel::CancelToken;
use crate::error::{StoreError, StoreResult};

/// stderr fragments gopass prints for a missing secret
const NOT_FOUND_MARKERS: &[&str] = &["not in the password store", "not found"];

/// [`SecretBackend`] over the gopass command-line tool
#[derive(Debug, Clone)]
pub struct GopassCliBackend {
    binary: PathBuf,
    cancel: CancelToken,
}

impl GopassCliBackend {
    pub fn new<P: AsRef<Path>>(binary: P, cancel: CancelToken) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            cancel,
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary.display(), args.join(" "))
    }

    /// Run gopass with `args`, feeding `stdin` when given
    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> StoreResult<Output> {
        self.cancel.check()?;

        let command = self.describe(args);
        debug!("Running {}", command);

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|e| StoreError::Command {
            command: command.clone(),
            reason: format!("failed to start: {}", e),
        })?;

        if let Some(data) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(data).map_err(|e| StoreError::Command {
                    command: command.clone(),
                    reason: format!("failed to write stdin: {}", e),
                })?;
            }
        }

        child.wait_with_output().map_err(|e| StoreError::Command {
            command,
            reason: e.to_string(),
        })
    }

    fn failure(&self, args: &[&str], output: &Output) -> StoreError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        StoreError::Command {
            command: self.describe(args),
            reason: format!("{}: {}", output.status, stderr.trim()),
        }
    }

    fn is_not_found(output: &Output) -> bool {
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m))
    }
}

impl SecretBackend for GopassCliBackend {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let args = ["show", "-n", key];
        let output = self.run(&args, None)?;

        if output.status.success() {
            Ok(Some(output.stdout))
        } else if Self::is_not_found(&output) {
            Ok(None)
        } else {
            Err(self.failure(&args, &output))
        }
    }

    fn set(&mut self, key: &str, data: &[u8]) -> StoreResult<()> {
        let args = ["insert", "-f", key];
        let output = self.run(&args, Some(data))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(self.failure(&args, &output))
        }
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let args = ["ls", "--flat"];
        let output = self.run(&args, None)?;

        if !output.status.success() {
            return Err(self.failure(&args, &output));
        }

        let mut keys: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|k| !k.is_empty() && k.starts_with(prefix))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let args = ["rm", "-f", key];
        let output = self.run(&args, None)?;

        if output.status.success() {
            Ok(())
        } else if Self::is_not_found(&output) {
            Err(StoreError::NotFound {
                key: key.to_string(),
            })
        } else {
            Err(self.failure(&args, &output))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_cancelled_token_stops_before_spawn() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut backend = GopassCliBackend::new("gopass", cancel);

        assert_matches!(backend.get("enpass/a/data"), Err(StoreError::Cancelled));
        assert_matches!(backend.set("enpass/a/data", b"x"), Err(StoreError::Cancelled));
        assert_matches!(backend.list("enpass/"), Err(StoreError::Cancelled));
    }

    #[test]
    fn test_missing_binary_is_command_error() {
        let backend = GopassCliBackend::new(
            "/nonexistent/passferry-test/gopass",
            CancelToken::new(),
        );

        assert_matches!(
            backend.list("enpass/"),
            Err(StoreError::Command { command, .. }) if command.contains("ls --flat")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_stdout_of_fake_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gopass");
        std::fs::write(
            &script,
            "#!/bin/sh\ncase \"$1\" in\n  ls) printf 'enpass/b/data\\nother/x\\nenpass/a/data\\n' ;;\n  show) echo 'Error: entry is not in the password store' >&2; exit 1 ;;\nesac\n",
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let backend = GopassCliBackend::new(&script, CancelToken::new());
        assert_eq!(
            backend.list("enpass/").unwrap(),
            vec!["enpass/a/data".to_string(), "enpass/b/data".to_string()]
        );
        assert_eq!(backend.get("enpass/a/data").unwrap(), None);
    }
}
