//! Plugin manifest definition
//!
//! Every plugin folder carries a `plugin.toml`:
//!
//! ```toml
//! [plugin]
//! name = "weather"     # defaults to the folder name
//! main = "main.rhai"   # required, relative to the folder
//! enabled = true       # defaults to true
//!
//! [about]
//! description = "..."
//! version = "0.1.0"
//! author = "..."
//! ```

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::application::errors::{PluginError, PluginResult};

pub const MANIFEST_FILE: &str = "plugin.toml";

/// Plugin metadata, read-only once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    pub name: String,
    /// Entry file, relative to the plugin folder
    pub main: PathBuf,
    pub enabled: bool,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    plugin: PluginTable,
    #[serde(default)]
    about: AboutTable,
}

#[derive(Debug, Deserialize)]
struct PluginTable {
    name: Option<String>,
    main: Option<PathBuf>,
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for PluginTable {
    fn default() -> Self {
        Self {
            name: None,
            main: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AboutTable {
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PluginManifest {
    /// Read `plugin.toml` from a plugin folder. `Ok(None)` when the folder
    /// has no manifest, which means it is not a plugin.
    pub fn read(folder: impl AsRef<Path>) -> PluginResult<Option<Self>> {
        let folder = folder.as_ref();
        let path = folder.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| PluginError::Manifest {
            path: path.clone(),
            message: format!("failed to read: {}", e),
        })?;

        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::parse(&content, &folder_name, &path).map(Some)
    }

    /// Parse manifest text. `folder_name` is the fallback plugin name and
    /// `path` is only used in error messages.
    pub fn parse(content: &str, folder_name: &str, path: &Path) -> PluginResult<Self> {
        let file: ManifestFile = toml::from_str(content).map_err(|e| PluginError::Manifest {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

        let main = file
            .plugin
            .main
            .filter(|m| !m.as_os_str().is_empty())
            .ok_or_else(|| PluginError::MissingMain(path.to_path_buf()))?;

        let name = file
            .plugin
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| folder_name.to_string());

        if !is_inside_folder(&main) {
            return Err(PluginError::Manifest {
                path: path.to_path_buf(),
                message: format!("`main` must stay inside the plugin folder, got `{}`", main.display()),
            });
        }

        if !is_valid_name(&name) {
            return Err(PluginError::Manifest {
                path: path.to_path_buf(),
                message: format!("`{}` cannot be used as a plugin name", name),
            });
        }

        Ok(Self {
            name,
            main,
            enabled: file.plugin.enabled,
            description: file.about.description,
            version: file.about.version,
            author: file.about.author,
        })
    }

    /// Absolute path of the entry file inside `folder`
    pub fn entry_path(&self, folder: &Path) -> PluginResult<PathBuf> {
        if !is_inside_folder(&self.main) {
            return Err(PluginError::Manifest {
                path: folder.join(MANIFEST_FILE),
                message: format!("`main` must stay inside the plugin folder, got `{}`", self.main.display()),
            });
        }
        Ok(folder.join(&self.main))
    }
}

/// The name doubles as the storage folder name, so it must be a single
/// normal path component.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Relative, without `..`, and naming at least one file component
fn is_inside_folder(path: &Path) -> bool {
    let mut normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(content: &str) -> PluginResult<PluginManifest> {
        PluginManifest::parse(content, "folder", Path::new("folder/plugin.toml"))
    }

    #[test]
    fn full_manifest() {
        let manifest = parse(
            r#"
            [plugin]
            name = "weather"
            main = "src/main.rhai"
            enabled = false

            [about]
            description = "Forecasts"
            version = "1.2.0"
            author = "someone"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.name, "weather");
        assert_eq!(manifest.main, PathBuf::from("src/main.rhai"));
        assert!(!manifest.enabled);
        assert_eq!(manifest.version.as_deref(), Some("1.2.0"));
        assert_eq!(manifest.author.as_deref(), Some("someone"));
    }

    #[test]
    fn defaults() {
        let manifest = parse("[plugin]\nmain = \"main.rhai\"\n").unwrap();
        assert_eq!(manifest.name, "folder");
        assert!(manifest.enabled);
        assert!(manifest.description.is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let manifest = parse(
            r#"
            [plugin]
            main = "main.rhai"
            requires = ["other"]

            [permissions]
            network = true
            "#,
        )
        .unwrap();
        assert_eq!(manifest.main, PathBuf::from("main.rhai"));
    }

    #[test]
    fn main_is_required() {
        assert!(matches!(parse("[plugin]\nname = \"x\"\n"), Err(PluginError::MissingMain(_))));
        assert!(matches!(parse("[about]\nauthor = \"x\"\n"), Err(PluginError::MissingMain(_))));
        assert!(matches!(parse("[plugin]\nmain = \"\"\n"), Err(PluginError::MissingMain(_))));
    }

    #[test]
    fn malformed_manifest() {
        assert!(matches!(parse("[plugin\nmain ="), Err(PluginError::Manifest { .. })));
        assert!(matches!(
            parse("[plugin]\nmain = \"m.rhai\"\nenabled = \"yes\"\n"),
            Err(PluginError::Manifest { .. })
        ));
    }

    #[test]
    fn name_must_be_a_single_folder_name() {
        for name in ["../escape", "a/b", ".", ".."] {
            let text = format!("[plugin]\nname = \"{}\"\nmain = \"m.rhai\"\n", name);
            assert!(parse(&text).is_err(), "{name} accepted");
        }
    }

    #[test]
    fn main_must_stay_inside_the_folder() {
        for main in ["../other/main.rhai", "/etc/passwd", "lib/../../main.rhai", "."] {
            let text = format!("[plugin]\nmain = \"{}\"\n", main);
            assert!(
                matches!(parse(&text), Err(PluginError::Manifest { .. })),
                "{main} accepted"
            );
        }
        let manifest = parse("[plugin]\nmain = \"./src/main.rhai\"\n").unwrap();
        assert_eq!(
            manifest.entry_path(Path::new("plugins/x")).unwrap(),
            Path::new("plugins/x/src/main.rhai")
        );
    }

    #[test]
    fn entry_path_rejects_escaping_main() {
        let mut manifest = parse("[plugin]\nmain = \"main.rhai\"\n").unwrap();
        manifest.main = PathBuf::from("../main.rhai");
        assert!(manifest.entry_path(Path::new("plugins/x")).is_err());
    }

    #[test]
    fn read_from_folder() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("greeter");
        std::fs::create_dir(&folder).unwrap();
        assert!(PluginManifest::read(&folder).unwrap().is_none());

        std::fs::write(folder.join(MANIFEST_FILE), "[plugin]\nmain = \"main.rhai\"\n").unwrap();
        let manifest = PluginManifest::read(&folder).unwrap().unwrap();
        assert_eq!(manifest.name, "greeter");
    }
}
