use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use log::{debug, info, warn};

use crate::cache::ReadThroughCache;
use crate::error::{CitreeError, Result};

const INDEX_FILE: &str = "index.json";
const MAX_SLUG_LEN: usize = 48;

/// A local clone of a remote configuration repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    path: PathBuf,
    remote: String,
}

impl Repository {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Path of `subdirectory` inside the clone, or the clone root.
    pub fn join(&self, subdirectory: Option<&str>) -> PathBuf {
        match subdirectory {
            Some(sub) if !sub.is_empty() => self.path.join(sub),
            _ => self.path.clone(),
        }
    }
}

/// Maps repository URLs to local clones.
///
/// Clones live under a root directory (by default
/// `~/.cache/citree/workspaces` on Linux) and an `index.json` next to them
/// records which URL each directory belongs to, so clones are reused across
/// runs.
pub struct WorkspaceCache {
    root: PathBuf,
    index_file: PathBuf,
    clones: ReadThroughCache<String, PathBuf>,
}

impl WorkspaceCache {
    /// Opens the workspace rooted at `root`, creating it if needed and
    /// loading the clone index. Index entries whose directory no longer
    /// exists are dropped.
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        let index_file = root.join(INDEX_FILE);

        let mut clones = ReadThroughCache::new();
        if index_file.exists() {
            let index: HashMap<String, PathBuf> = fs::read_to_string(&index_file)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .unwrap_or_else(|| {
                    warn!("Failed to load workspace index, starting with empty index");
                    HashMap::new()
                });

            for (url, path) in index.into_iter().filter(|(_, path)| path.is_dir()) {
                clones.put(url, path);
            }
            if clones.is_empty() {
                debug!("Workspace index at {} lists no usable clones", index_file.display());
            }
            debug!("Loaded {} workspaces from {}", clones.len(), index_file.display());
        }

        Ok(Self {
            root,
            index_file,
            clones,
        })
    }

    /// Platform cache directory used when no root is configured.
    pub fn default_root() -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join("citree").join("workspaces"))
            .ok_or_else(|| CitreeError::Config("No cache directory found".into()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has(&self, url: &str) -> bool {
        self.clones.has(&url.to_string())
    }

    /// Returns a repository handle for `url`.
    ///
    /// An empty workspace directory is cloned into; an existing one is opened.
    /// If opening fails the entry is evicted and a fresh clone is attempted
    /// once; a second failure is returned to the caller.
    pub fn resolve(&mut self, url: &str) -> Result<Repository> {
        self.resolve_attempt(url, true)
    }

    fn resolve_attempt(&mut self, url: &str, retry: bool) -> Result<Repository> {
        let root = self.root.clone();
        let path = self
            .clones
            .get(&url.to_string(), |url| create_workspace_dir(&root, url).map(Some))?;

        let outcome = if is_empty_dir(&path) {
            info!("Cloning {url} into {}", path.display());
            clone_repository(url, &path)
        } else {
            debug!("Reusing workspace {} for {url}", path.display());
            open_repository(url, &path)
        };

        match outcome {
            Ok(()) => {
                self.save_index()?;
                Ok(Repository {
                    path,
                    remote: url.to_string(),
                })
            }
            Err(err) => {
                self.evict(url, &path);
                self.save_index()?;
                if retry {
                    warn!("Workspace for {url} is unusable ({err}), cloning again");
                    self.resolve_attempt(url, false)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn evict(&mut self, url: &str, path: &Path) {
        self.clones.delete(&url.to_string());
        if path.starts_with(&self.root) && path.exists() {
            if let Err(err) = fs::remove_dir_all(path) {
                warn!("Failed to remove workspace {}: {err}", path.display());
            }
        }
    }

    /// Removes every clone and the index.
    pub fn clear(&mut self) -> Result<()> {
        let urls: Vec<(String, PathBuf)> = self
            .clones
            .iter()
            .map(|(url, path)| (url.clone(), path.clone()))
            .collect();

        for (url, path) in urls {
            self.evict(&url, &path);
        }

        if self.index_file.exists() {
            fs::remove_file(&self.index_file)?;
        }
        info!("Workspace cleared: {}", self.root.display());

        Ok(())
    }

    fn save_index(&self) -> Result<()> {
        let index: HashMap<&String, &PathBuf> = self.clones.iter().collect();
        let content = serde_json::to_string(&index)?;
        fs::write(&self.index_file, content)?;
        Ok(())
    }
}

/// Creates a new, uniquely named, empty directory for `url` under `root`.
fn create_workspace_dir(root: &Path, url: &str) -> Result<PathBuf> {
    let slug = slugify(url);
    let stamp = Utc::now().format("%Y%m%d%H%M%S%f");

    let mut path = root.join(format!("{slug}-{stamp}"));
    let mut suffix = 1;
    while path.exists() {
        path = root.join(format!("{slug}-{stamp}-{suffix}"));
        suffix += 1;
    }

    fs::create_dir_all(&path)?;
    Ok(path)
}

/// Directory-safe name for `url`: scheme dropped, separator runs collapsed
/// to one `-`, and at most `MAX_SLUG_LEN` characters kept from the end.
fn slugify(url: &str) -> String {
    let location = url.split_once("://").map_or(url, |(_, rest)| rest);

    let mut slug = String::with_capacity(location.len());
    for c in location.trim_end_matches(".git").chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    let start = slug.len().saturating_sub(MAX_SLUG_LEN);
    slug[start..].trim_start_matches('-').to_string()
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let mut command = Command::new("git");
    if let Some(cwd) = cwd {
        command.arg("-C").arg(cwd);
    }

    let output = command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|err| CitreeError::Git {
            command: args.join(" "),
            detail: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(CitreeError::Git {
            command: args.join(" "),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn clone_repository(url: &str, path: &Path) -> Result<()> {
    let target = path.to_string_lossy();
    run_git(&["clone", "--quiet", url, target.as_ref()], None)?;
    Ok(())
}

/// Checks that `path` is the top level of a clone of `url`.
fn open_repository(url: &str, path: &Path) -> Result<()> {
    let toplevel = PathBuf::from(run_git(&["rev-parse", "--show-toplevel"], Some(path))?);
    if fs::canonicalize(&toplevel)? != fs::canonicalize(path)? {
        return Err(CitreeError::Git {
            command: "rev-parse --show-toplevel".to_string(),
            detail: format!("{} is not a repository root", path.display()),
        });
    }

    let origin = run_git(&["remote", "get-url", "origin"], Some(path))?;
    if origin != url {
        return Err(CitreeError::Git {
            command: "remote get-url origin".to_string(),
            detail: format!("{} tracks {origin}, expected {url}", path.display()),
        });
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .expect("run git");
        assert!(status.success(), "git {args:?} failed in {}", dir.display());
    }

    /// Creates a committed repository containing `files` and returns its URL.
    pub(crate) fn create_source_repo(dir: &Path, files: &[(&str, &str)]) -> String {
        fs::create_dir_all(dir).unwrap();
        git(dir, &["init", "--quiet"]);
        git(dir, &["config", "user.email", "ci@example.com"]);
        git(dir, &["config", "user.name", "CI"]);
        for (name, content) in files {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        git(dir, &["add", "."]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
        dir.to_string_lossy().to_string()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("https://opendev.org/openstack/project-config.git"),
            "opendev-org-openstack-project-config"
        );
        assert!(slugify(&"x".repeat(200)).len() <= MAX_SLUG_LEN);
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("git@example.com:org//repo.git"), "git-example-com-org-repo");
        assert_eq!(slugify("/tmp/src"), "tmp-src");
    }

    #[test]
    fn test_resolve_twice_reuses_directory() {
        if !git_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let url = create_source_repo(&temp_dir.path().join("src"), &[("zuul.yaml", "[]")]);
        let mut workspace = WorkspaceCache::new(temp_dir.path().join("ws")).unwrap();

        let first = workspace.resolve(&url).unwrap();
        let second = workspace.resolve(&url).unwrap();

        assert_eq!(first.path(), second.path());
        assert!(first.path().join("zuul.yaml").exists());
    }

    #[test]
    fn test_removed_directory_is_recloned_elsewhere() {
        if !git_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let url = create_source_repo(&temp_dir.path().join("src"), &[("zuul.yaml", "[]")]);
        let mut workspace = WorkspaceCache::new(temp_dir.path().join("ws")).unwrap();

        let first = workspace.resolve(&url).unwrap();
        fs::remove_dir_all(first.path()).unwrap();
        let second = workspace.resolve(&url).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(second.path().join("zuul.yaml").exists());
    }

    #[test]
    fn test_corrupted_directory_is_recloned() {
        if !git_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let url = create_source_repo(&temp_dir.path().join("src"), &[("zuul.yaml", "[]")]);
        let root = temp_dir.path().join("ws");
        let mut workspace = WorkspaceCache::new(root.clone()).unwrap();

        let junk = root.join("junk");
        fs::create_dir_all(&junk).unwrap();
        fs::write(junk.join("garbage.txt"), "not a repository").unwrap();
        workspace.clones.put(url.clone(), junk.clone());

        let repo = workspace.resolve(&url).unwrap();
        assert_ne!(repo.path(), junk.as_path());
        assert!(repo.path().join("zuul.yaml").exists());
        assert!(!junk.exists());
    }

    #[test]
    fn test_unreachable_remote_fails_after_one_retry() {
        if !git_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let mut workspace = WorkspaceCache::new(temp_dir.path().join("ws")).unwrap();
        let url = temp_dir.path().join("missing").to_string_lossy().to_string();

        let result = workspace.resolve(&url);
        assert!(matches!(result, Err(CitreeError::Git { .. })));
        assert!(!workspace.has(&url));

        let leftovers: Vec<_> = fs::read_dir(workspace.root())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_index_persists_across_instances() {
        if !git_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let url = create_source_repo(&temp_dir.path().join("src"), &[("zuul.yaml", "[]")]);
        let root = temp_dir.path().join("ws");

        let first = WorkspaceCache::new(root.clone()).unwrap().resolve(&url).unwrap();

        let reopened = WorkspaceCache::new(root).unwrap();
        assert!(reopened.has(&url));
        let mut reopened = reopened;
        let second = reopened.resolve(&url).unwrap();
        assert_eq!(first.path(), second.path());
    }

    #[test]
    fn test_clear_removes_clones() {
        if !git_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let url = create_source_repo(&temp_dir.path().join("src"), &[("zuul.yaml", "[]")]);
        let mut workspace = WorkspaceCache::new(temp_dir.path().join("ws")).unwrap();

        let repo = workspace.resolve(&url).unwrap();
        workspace.clear().unwrap();

        assert!(!repo.path().exists());
        assert!(!workspace.has(&url));
    }
}
