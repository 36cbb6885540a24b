use crate::backend::PackageManager;
use crate::RuntimeError;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Backend driving a conda-compatible executable (`conda`, `mamba`).
pub struct CondaBackend {
    executable: String,
}

impl CondaBackend {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.stdin(Stdio::null());
        cmd
    }

    fn run(&self, what: &str, cmd: &mut Command) -> Result<Output, RuntimeError> {
        debug!("running {cmd:?}");
        let output = cmd
            .output()
            .map_err(|e| RuntimeError::ExecFailed(format!("{} {what}: {e}", self.executable)))?;
        if !output.stderr.is_empty() {
            debug!(
                "{} {what} stderr:\n{}",
                self.executable,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(output)
    }

    fn failure(&self, what: &str, output: &Output) -> RuntimeError {
        RuntimeError::Resolution(format!(
            "'{} {what}' exited with {} (rerun with --verbose to see its output)",
            self.executable, output.status
        ))
    }
}

impl PackageManager for CondaBackend {
    fn name(&self) -> &str {
        &self.executable
    }

    fn available(&self) -> bool {
        self.command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn create_env(&self, env_name: &str, manifest_path: &Path) -> Result<(), RuntimeError> {
        let output = self.run(
            "env create",
            self.command()
                .args(["env", "create", "-f"])
                .arg(manifest_path)
                .args(["-n", env_name]),
        )?;
        if !output.status.success() {
            return Err(self.failure("env create", &output));
        }
        Ok(())
    }

    fn export_env(&self, env_name: &str) -> Result<String, RuntimeError> {
        let output = self.run(
            "env export",
            self.command()
                .args(["env", "export", "-n", env_name, "--no-builds"]),
        )?;
        if !output.status.success() {
            return Err(self.failure("env export", &output));
        }
        String::from_utf8(output.stdout).map_err(|e| {
            RuntimeError::Resolution(format!("env export produced non UTF-8 output: {e}"))
        })
    }

    fn remove_env(&self, env_name: &str) -> Result<(), RuntimeError> {
        let output = self.run(
            "remove",
            self.command()
                .args(["remove", "--all", "--yes", "-n", env_name]),
        )?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "'{} remove --all -n {env_name}' exited with {}",
                self.executable, output.status
            )));
        }
        Ok(())
    }

    fn search(&self, query: &str, platform: &str, channels: &[String]) -> bool {
        let mut cmd = self.command();
        cmd.args(["search", "--platform", platform]);
        for channel in channels {
            cmd.args(["-c", channel]);
        }
        cmd.arg(query).stdout(Stdio::null()).stderr(Stdio::null());

        let found = cmd.status().is_ok_and(|s| s.success());
        debug!("search {query} on {platform}: {found}");
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_unavailable() {
        let backend = CondaBackend::new("envlock-test-no-such-conda");
        assert!(!backend.available());
        assert!(!backend.search("numpy", "noarch", &["defaults".to_owned()]));
    }

    #[test]
    fn missing_executable_fails_to_export() {
        let backend = CondaBackend::new("envlock-test-no-such-conda");
        assert!(matches!(
            backend.export_env("scratch"),
            Err(RuntimeError::ExecFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_resolution_error() {
        // `false` ignores its arguments and exits 1
        let backend = CondaBackend::new("false");
        let dir = tempfile::tempdir().unwrap();
        let err = backend
            .create_env("scratch", &dir.path().join("env.yml"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Resolution(_)));
        assert!(err.to_string().starts_with("resolution error:"));
    }
}
