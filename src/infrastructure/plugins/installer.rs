//! Plugin installer - fetches a GitHub repository as a plugin folder
//!
//! `owner/repo` tries the `main` branch, then `master`; `owner/repo@branch`
//! only tries that branch. The repository must carry `plugin.toml` at its
//! root and becomes `plugins/<repo>/`. An existing folder is never touched.

use reqwest::Client;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::manifest::{self, MANIFEST_FILE};
use crate::application::errors::{PluginError, PluginResult};

const DEFAULT_BRANCHES: [&str; 2] = ["main", "master"];

/// A GitHub repository to install, `owner/repo[@branch]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSource {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
}

impl FromStr for PluginSource {
    type Err = PluginError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || PluginError::InvalidSource(text.to_string());
        let text = text.trim();

        let (repo_part, branch) = match text.split_once('@') {
            Some((repo_part, branch)) => (repo_part, Some(branch)),
            None => (text, None),
        };
        let (owner, repo) = repo_part.split_once('/').ok_or_else(invalid)?;

        let branch = match branch {
            Some(b) if b.is_empty() || b.contains(char::is_whitespace) => return Err(invalid()),
            Some(b) => Some(b.to_string()),
            None => None,
        };
        if owner.is_empty() || owner.contains(char::is_whitespace) || !manifest::is_valid_name(repo) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch,
        })
    }
}

impl fmt::Display for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)?;
        if let Some(branch) = &self.branch {
            write!(f, "@{}", branch)?;
        }
        Ok(())
    }
}

impl PluginSource {
    /// Archive URLs to try, in order
    pub fn archive_urls(&self) -> Vec<String> {
        let branches: Vec<&str> = match &self.branch {
            Some(branch) => vec![branch.as_str()],
            None => DEFAULT_BRANCHES.to_vec(),
        };
        branches
            .into_iter()
            .map(|branch| {
                format!(
                    "https://codeload.github.com/{}/{}/zip/refs/heads/{}",
                    self.owner, self.repo, branch
                )
            })
            .collect()
    }
}

/// Downloads plugins into the plugins root
pub struct PluginInstaller {
    client: Client,
    plugin_dir: PathBuf,
}

impl PluginInstaller {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> PluginResult<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PluginError::Download(e.to_string()))?;

        Ok(Self {
            client,
            plugin_dir: plugin_dir.into(),
        })
    }

    /// Install `source` as `plugins/<repo>/`, returning the new folder
    pub async fn install(&self, source: &PluginSource) -> PluginResult<PathBuf> {
        let target = self.plugin_dir.join(&source.repo);
        if target.exists() {
            return Err(PluginError::AlreadyInstalled(target));
        }

        let mut last_error = None;
        for url in source.archive_urls() {
            match self.download(&url).await {
                Ok(archive) => {
                    tracing::info!("Downloaded {} from {}", source, url);
                    return unpack(&archive, &self.plugin_dir, &source.repo);
                }
                Err(e) => {
                    tracing::debug!("{}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PluginError::Download(format!("nothing to download for {}", source))))
    }

    async fn download(&self, url: &str) -> PluginResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PluginError::Download(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PluginError::Download(format!("{} returned {}", url, response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PluginError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Unpack a repository archive into `plugin_dir/<name>`.
///
/// GitHub archives hold everything under one top-level folder, which is
/// stripped. Files are staged in a hidden folder first, so discovery never
/// sees a half-written plugin.
pub fn unpack(archive: &[u8], plugin_dir: &Path, name: &str) -> PluginResult<PathBuf> {
    if !manifest::is_valid_name(name) {
        return Err(PluginError::InvalidSource(name.to_string()));
    }
    let target = plugin_dir.join(name);
    if target.exists() {
        return Err(PluginError::AlreadyInstalled(target));
    }

    let staging = plugin_dir.join(format!(".{}.partial", name));
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|source| PluginError::Io {
            path: staging.clone(),
            source,
        })?;
    }

    let result = extract(archive, &staging).and_then(|()| {
        if !staging.join(MANIFEST_FILE).is_file() {
            return Err(PluginError::Archive(format!(
                "repository has no {} at its root",
                MANIFEST_FILE
            )));
        }
        std::fs::rename(&staging, &target).map_err(|source| PluginError::Io {
            path: target.clone(),
            source,
        })
    });

    if let Err(e) = result {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }
    Ok(target)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PluginError {
    let path = path.to_path_buf();
    move |source| PluginError::Io { path, source }
}

fn extract(archive: &[u8], staging: &Path) -> PluginResult<()> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| PluginError::Archive(e.to_string()))?;

    let mut root: Option<PathBuf> = None;
    for index in 0..zip.len() {
        let mut file = zip
            .by_index(index)
            .map_err(|e| PluginError::Archive(e.to_string()))?;

        // Entries with absolute paths or `..` are refused by the zip crate
        let Some(entry) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(PluginError::Archive(format!("unsafe path `{}`", file.name())));
        };

        let mut components = entry.components();
        let Some(top) = components.next() else {
            continue;
        };
        let top = PathBuf::from(top.as_os_str());
        if root.is_none() {
            root = Some(top.clone());
        }
        if root.as_ref() != Some(&top) {
            return Err(PluginError::Archive("more than one top-level folder".to_string()));
        }

        let relative = components.as_path();
        let dest = staging.join(relative);
        if file.is_dir() || relative.as_os_str().is_empty() {
            std::fs::create_dir_all(&dest).map_err(io_error(&dest))?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut out = std::fs::File::create(&dest).map_err(io_error(&dest))?;
        std::io::copy(&mut file, &mut out).map_err(io_error(&dest))?;
    }

    if root.is_none() {
        return Err(PluginError::Archive("archive is empty".to_string()));
    }
    Ok(())
}
