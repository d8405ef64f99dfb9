//! Mirroring encrypted artifacts to a remote git repository.
//!
//! The encryption core never sees this module: only already-encrypted
//! artifact bytes travel here. Mirroring is plain `git` plumbing — clone,
//! commit, push — so any git host works and no API credentials beyond the
//! user's existing git setup are needed.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use getrandom::fill;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where encrypted backups get mirrored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Git URL of the backup repository.
    pub url: String,
    /// Branch artifacts are committed to.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the repository artifacts land in.
    #[serde(default = "default_folder")]
    pub folder: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_folder() -> String {
    "ssh-keys".to_string()
}

impl RemoteConfig {
    pub fn new(url: String, branch: Option<String>, folder: Option<String>) -> Self {
        Self {
            url,
            branch: branch.unwrap_or_else(default_branch),
            folder: folder.unwrap_or_else(default_folder),
        }
    }

    /// Load a config from the given path. `Ok(None)` when none is saved yet.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_slice(&data).context("failed to parse config file")?;
        Ok(Some(config))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write config file {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Default location of the remote configuration file.
pub fn config_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "sshvault")
        .context("could not determine platform directories")?;

    Ok(project_dirs.config_dir().join("remote.json"))
}

/// Remove the saved remote configuration. Returns whether one existed.
pub fn clear_config(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)
        .with_context(|| format!("failed to remove config file {}", path.display()))?;
    Ok(true)
}

/// Probe that the configured repository answers at all.
pub fn check_reachable(config: &RemoteConfig) -> Result<()> {
    run_git(None, &["ls-remote", &config.url])
        .with_context(|| format!("remote repository {} is not reachable", config.url))?;
    Ok(())
}

/// Mirror already-encrypted artifact bytes into the backup repository.
///
/// Clones into a scratch directory, writes `<folder>/<file_name>`, commits
/// with `message`, and pushes the configured branch. The scratch clone is
/// removed afterwards, pass or fail.
pub fn push(config: &RemoteConfig, data: &[u8], file_name: &str, message: &str) -> Result<()> {
    let workdir = random_workdir()?;

    let outcome = push_inner(config, data, file_name, message, &workdir);
    let _ = fs::remove_dir_all(&workdir);
    outcome
}

fn push_inner(
    config: &RemoteConfig,
    data: &[u8],
    file_name: &str,
    message: &str,
    workdir: &Path,
) -> Result<()> {
    // A fresh repository may not have the branch yet; fall back to a plain
    // clone and create the branch locally.
    let cloned = run_git(
        None,
        &[
            "clone",
            "--depth",
            "1",
            "--branch",
            &config.branch,
            &config.url,
            &workdir.to_string_lossy(),
        ],
    );
    if cloned.is_err() {
        let _ = fs::remove_dir_all(workdir);
        run_git(None, &["clone", &config.url, &workdir.to_string_lossy()])
            .with_context(|| format!("failed to clone {}", config.url))?;
        run_git(Some(workdir), &["checkout", "-B", &config.branch])?;
    }

    let dest_dir = workdir.join(&config.folder);
    fs::create_dir_all(&dest_dir)?;
    fs::write(dest_dir.join(file_name), data)?;

    let rel_path = format!("{}/{}", config.folder, file_name);
    run_git(Some(workdir), &["add", &rel_path])?;
    run_git(
        Some(workdir),
        &[
            // Backup commits carry a fixed identity so mirroring works on
            // machines with no global git config.
            "-c",
            "user.name=sshvault",
            "-c",
            "user.email=sshvault@localhost",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-m",
            message,
        ],
    )?;
    run_git(Some(workdir), &["push", "origin", &config.branch])?;

    Ok(())
}

/// Scratch clone directory with a random suffix, under the system temp dir.
fn random_workdir() -> Result<PathBuf> {
    let mut buf = [0u8; 8];
    fill(&mut buf)?;

    let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    Ok(std::env::temp_dir().join(format!("sshvault-push-{rand_string}")))
}

fn run_git(cwd: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd
        .args(args)
        .output()
        .context("failed to run git (is it installed?)")?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.json");

        let config = RemoteConfig::new(
            "git@example.com:me/backups.git".to_string(),
            None,
            Some("keys".to_string()),
        );
        config.save_to(&path).unwrap();

        let loaded = RemoteConfig::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.url, "git@example.com:me/backups.git");
        assert_eq!(loaded.branch, "main");
        assert_eq!(loaded.folder, "keys");
    }

    #[test]
    fn missing_config_loads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.json");

        assert!(RemoteConfig::load_from(&path).unwrap().is_none());
        assert!(!clear_config(&path).unwrap());
    }

    #[test]
    fn clear_removes_saved_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.json");

        RemoteConfig::new("url".to_string(), None, None)
            .save_to(&path)
            .unwrap();

        assert!(clear_config(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn push_mirrors_artifact_into_bare_repo() {
        let dir = tempdir().unwrap();
        let bare = dir.path().join("backups.git");

        run_git(
            None,
            &[
                "init",
                "--bare",
                "--initial-branch=main",
                &bare.to_string_lossy(),
            ],
        )
        .unwrap();

        let config = RemoteConfig::new(bare.to_string_lossy().into_owned(), None, None);
        push(&config, b"{\"header\":{}}", "id_test.enc", "Backup SSH key: id_test.enc").unwrap();

        let listing = run_git(
            None,
            &[
                "--git-dir",
                &bare.to_string_lossy(),
                "ls-tree",
                "-r",
                "--name-only",
                "main",
            ],
        )
        .unwrap();
        assert!(listing.contains("ssh-keys/id_test.enc"));
    }
}
