use crate::spotsync_core::config::GitConfig;
use crate::spotsync_core::error::{Result, SpotsyncError};
use crate::spotsync_core::tagging::TaskRunner;
use crate::spotsync_core::upload::UploadRequest;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Runs upload and gallery steps as subprocesses of this executable, and
/// publishes with git.
pub struct ProcessTasks {
    exe: PathBuf,
    config_path: PathBuf,
    git: GitConfig,
}

impl ProcessTasks {
    pub fn new(exe: PathBuf, config_path: &Path, git: GitConfig) -> Self {
        ProcessTasks {
            exe,
            config_path: config_path.to_path_buf(),
            git,
        }
    }

    /// Use the currently running binary for the subprocess steps.
    pub fn current(config_path: &Path, git: GitConfig) -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config_path, git))
    }

    fn spotsync(&self) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }

    fn run_git(&self, step: &str, args: &[&str]) -> Result<()> {
        log::info!("Running git {}", args.join(" "));
        let status = Command::new("git")
            .args(args)
            .current_dir(&self.git.repo_dir)
            .status()
            .map_err(|e| task_error(step, e.to_string()))?;
        check_status(step, status)
    }
}

impl TaskRunner for ProcessTasks {
    fn upload(&mut self, request: &UploadRequest) -> Result<()> {
        let status = self
            .spotsync()
            .arg("upload")
            .arg(&request.photo)
            .arg(&request.sidecar)
            .arg(&request.date)
            .arg(&request.location)
            .status()
            .map_err(|e| task_error("upload", e.to_string()))?;
        check_status("upload", status)
    }

    fn build_gallery(&mut self) -> Result<()> {
        let status = self
            .spotsync()
            .arg("gallery")
            .status()
            .map_err(|e| task_error("gallery generation", e.to_string()))?;
        check_status("gallery generation", status)
    }

    fn publish(&mut self) -> Result<()> {
        self.run_git("git add", &["add", "."])?;
        self.run_git("git commit", &["commit", "-m", self.git.message.as_str()])?;
        self.run_git("git push", &["push", self.git.remote.as_str(), self.git.branch.as_str()])
    }
}

fn task_error(step: &str, detail: String) -> SpotsyncError {
    SpotsyncError::Task {
        step: step.to_string(),
        detail,
    }
}

fn check_status(step: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(task_error(step, format!("exited with {}", status)))
    }
}
