//! Plugin loader - Discovers plugin folders and loads their entry files
//!
//! Startup runs one pass over the immediate subfolders of the plugins root,
//! in lexical order. Folders without a `plugin.toml` are not plugins. Every
//! other problem (bad manifest, missing entry, failing hook) is reported
//! against its folder and loading carries on with the next one.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::library::{self, LibraryModule};
use super::manifest::PluginManifest;
use super::module::{PluginHost, PluginModule};
use super::registry::{PluginRecord, PluginRegistry};
use super::script::{ScriptModule, SCRIPT_EXTENSION};
use crate::application::errors::{PluginError, PluginResult};
use crate::application::services::CommandService;
use crate::infrastructure::config::PluginPaths;

/// What discovery found in one plugin folder
#[derive(Debug)]
pub enum Discovery {
    /// Valid and enabled, will be loaded
    Ready(PluginManifest),
    /// Valid but `enabled = false`
    Disabled(PluginManifest),
    /// No `plugin.toml`
    NotAPlugin,
    /// Manifest present but unusable
    Invalid(PluginError),
}

#[derive(Debug)]
pub struct DiscoveredFolder {
    pub folder: PathBuf,
    pub folder_name: String,
    pub status: Discovery,
}

/// Outcome of a loading pass
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of the loaded plugins, in load order
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
    /// Folder name and reason for every plugin that was skipped
    pub failed: Vec<(String, PluginError)>,
}

/// Plugin loader
pub struct PluginLoader {
    plugin_dir: PathBuf,
    storage_dir: PathBuf,
}

impl PluginLoader {
    pub fn new(plugin_dir: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            storage_dir: storage_dir.into(),
        }
    }

    pub fn from_paths(paths: &PluginPaths) -> Self {
        Self::new(&paths.directory, &paths.storage)
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Storage folder of a plugin
    pub fn config_dir(&self, name: &str) -> PathBuf {
        self.storage_dir.join(name)
    }

    /// Scan the plugins root, creating it if missing
    pub fn discover(&self) -> PluginResult<Vec<DiscoveredFolder>> {
        std::fs::create_dir_all(&self.plugin_dir).map_err(|source| PluginError::Io {
            path: self.plugin_dir.clone(),
            source,
        })?;

        let entries = std::fs::read_dir(&self.plugin_dir).map_err(|source| PluginError::Io {
            path: self.plugin_dir.clone(),
            source,
        })?;

        let mut folders = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let folder_name = entry.file_name().to_string_lossy().into_owned();
            // Skip hidden directories
            if folder_name.starts_with('.') {
                continue;
            }

            folders.push((folder_name, path));
        }
        folders.sort();

        Ok(folders
            .into_iter()
            .map(|(folder_name, folder)| {
                let status = match PluginManifest::read(&folder) {
                    Ok(None) => Discovery::NotAPlugin,
                    Ok(Some(manifest)) if manifest.enabled => Discovery::Ready(manifest),
                    Ok(Some(manifest)) => Discovery::Disabled(manifest),
                    Err(e) => Discovery::Invalid(e),
                };
                DiscoveredFolder {
                    folder,
                    folder_name,
                    status,
                }
            })
            .collect())
    }

    /// Load every enabled plugin, registering commands into `commands`.
    ///
    /// Only failing to create or read the plugins root is an error; per-plugin
    /// failures are logged and collected in the report.
    pub fn load_all(
        &self,
        commands: &mut CommandService,
        registry: &mut PluginRegistry,
    ) -> PluginResult<LoadReport> {
        let mut report = LoadReport::default();

        for found in self.discover()? {
            let folder_name = found.folder_name;
            match found.status {
                Discovery::NotAPlugin => {
                    tracing::debug!("Skipping {}: no plugin.toml", found.folder.display());
                }
                Discovery::Disabled(manifest) => {
                    tracing::info!("Plugin {} is disabled", manifest.name);
                    report.disabled.push(manifest.name);
                }
                Discovery::Invalid(e) => {
                    tracing::warn!("Skipping plugin {}: {}", folder_name, e);
                    report.failed.push((folder_name, e));
                }
                Discovery::Ready(manifest) => {
                    match self.load_plugin(&found.folder, manifest, commands, registry) {
                        Ok(name) => report.loaded.push(name),
                        Err(e) => {
                            tracing::warn!("Failed to load plugin {}: {}", folder_name, e);
                            report.failed.push((folder_name, e));
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Loaded {} plugin(s), {} disabled, {} failed",
            report.loaded.len(),
            report.disabled.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Load a single plugin whose manifest has already been read
    pub fn load_plugin(
        &self,
        folder: &Path,
        manifest: PluginManifest,
        commands: &mut CommandService,
        registry: &mut PluginRegistry,
    ) -> PluginResult<String> {
        let name = manifest.name.clone();
        if registry.is_loaded(&name) {
            return Err(PluginError::Duplicate(name));
        }

        let entry = manifest.entry_path(folder)?;
        if !entry.is_file() {
            return Err(PluginError::EntryNotFound(entry));
        }

        let module = open_entry(&name, &entry)?;
        self.attach(folder, manifest, module, commands, registry)
    }

    /// Create the plugin's storage folder, run its hook and record it
    fn attach(
        &self,
        folder: &Path,
        manifest: PluginManifest,
        module: Box<dyn PluginModule>,
        commands: &mut CommandService,
        registry: &mut PluginRegistry,
    ) -> PluginResult<String> {
        let name = manifest.name.clone();
        let config_dir = self.config_dir(&name);
        std::fs::create_dir_all(&config_dir).map_err(|source| PluginError::Io {
            path: config_dir.clone(),
            source,
        })?;

        if module.has_setup() {
            let added = run_setup(module.as_ref(), commands, &name, &config_dir)?;
            tracing::debug!("Plugin {} registered {} command(s)", name, added);
        } else {
            tracing::debug!("Plugin {} has no setup hook", name);
        }

        tracing::info!(
            "Loaded plugin: {} v{} ({})",
            name,
            manifest.version.as_deref().unwrap_or("?"),
            module.kind()
        );

        registry.register(PluginRecord {
            manifest,
            folder: folder.to_path_buf(),
            config_dir,
            module,
        })?;
        Ok(name)
    }
}

fn open_entry(name: &str, entry: &Path) -> PluginResult<Box<dyn PluginModule>> {
    if entry.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
        return Ok(Box::new(ScriptModule::load(name, entry)?));
    }
    if library::is_library(entry) {
        return Ok(Box::new(LibraryModule::load(entry)?));
    }
    Err(PluginError::UnsupportedEntry(entry.to_path_buf()))
}

/// Run the hook once; commands reach the bot only if it succeeds.
/// A panicking hook is reported like a failing one.
fn run_setup(
    module: &dyn PluginModule,
    commands: &mut CommandService,
    name: &str,
    config_dir: &Path,
) -> PluginResult<usize> {
    let mut host = PluginHost::new(commands, name);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| module.setup(&mut host, config_dir)));

    match outcome {
        Ok(Ok(())) => Ok(host.commit()),
        Ok(Err(e)) => Err(e),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "setup panicked".to_string());
            Err(PluginError::Setup {
                plugin: name.to_string(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Command, Message};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        loader: PluginLoader,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let loader = PluginLoader::new(dir.path().join("plugins"), dir.path().join("config"));
            Self { _dir: dir, loader }
        }

        fn plugin(&self, folder: &str, manifest: &str, files: &[(&str, &str)]) -> PathBuf {
            let path = self.loader.plugin_dir().join(folder);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("plugin.toml"), manifest).unwrap();
            for (file, content) in files {
                std::fs::write(path.join(file), content).unwrap();
            }
            path
        }

        fn load(&self) -> (LoadReport, CommandService, PluginRegistry) {
            let mut commands = CommandService::new("!");
            let mut registry = PluginRegistry::new();
            let report = self.loader.load_all(&mut commands, &mut registry).unwrap();
            (report, commands, registry)
        }
    }

    const PING_SCRIPT: &str = r#"fn setup(bot, config_dir) { bot.command("ping", "Pong from plugin!"); }"#;

    fn reply(commands: &CommandService, name: &str) -> Option<String> {
        commands.handle(&Message::from_command("c", name, vec![])).ok().flatten()
    }

    #[test]
    fn creates_missing_root() {
        let fixture = Fixture::new();
        assert!(!fixture.loader.plugin_dir().exists());

        let (report, _, registry) = fixture.load();
        assert!(fixture.loader.plugin_dir().is_dir());
        assert!(registry.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn loads_enabled_plugin_and_creates_config_dir() {
        let fixture = Fixture::new();
        fixture.plugin(
            "example_plugin",
            "[plugin]\nmain = \"main.rhai\"\nenabled = true\n",
            &[("main.rhai", PING_SCRIPT)],
        );

        let (report, commands, registry) = fixture.load();
        assert_eq!(report.loaded, vec!["example_plugin".to_string()]);
        assert_eq!(reply(&commands, "ping").as_deref(), Some("Pong from plugin!"));

        let record = registry.get("example_plugin").unwrap();
        assert_eq!(record.config_dir, fixture.loader.config_dir("example_plugin"));
        assert!(record.config_dir.is_dir());
    }

    #[test]
    fn folder_without_manifest_is_silently_skipped() {
        let fixture = Fixture::new();
        std::fs::create_dir_all(fixture.loader.plugin_dir().join("assets")).unwrap();
        std::fs::write(fixture.loader.plugin_dir().join("README.md"), "notes").unwrap();

        let found = fixture.loader.discover().unwrap();
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0].status, Discovery::NotAPlugin));

        let (report, _, registry) = fixture.load();
        assert!(report.failed.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn disabled_plugin_is_not_loaded() {
        let fixture = Fixture::new();
        // The script would fail to compile if it were ever loaded
        fixture.plugin(
            "off",
            "[plugin]\nmain = \"main.rhai\"\nenabled = false\n",
            &[("main.rhai", "this is not rhai (")],
        );

        let (report, commands, registry) = fixture.load();
        assert_eq!(report.disabled, vec!["off".to_string()]);
        assert!(report.failed.is_empty());
        assert!(registry.is_empty());
        assert!(commands.is_empty());
        assert!(!fixture.loader.config_dir("off").exists());
    }

    #[test]
    fn missing_entry_does_not_stop_other_plugins() {
        let fixture = Fixture::new();
        fixture.plugin("a_broken", "[plugin]\nmain = \"gone.rhai\"\n", &[]);
        fixture.plugin("b_working", "[plugin]\nmain = \"main.rhai\"\n", &[("main.rhai", PING_SCRIPT)]);

        let (report, commands, _) = fixture.load();
        assert_eq!(report.loaded, vec!["b_working".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a_broken");
        assert!(matches!(report.failed[0].1, PluginError::EntryNotFound(_)));
        assert!(reply(&commands, "ping").is_some());
    }

    #[test]
    fn missing_main_and_bad_manifest_are_reported() {
        let fixture = Fixture::new();
        fixture.plugin("no_main", "[plugin]\nname = \"x\"\n", &[]);
        fixture.plugin("garbled", "[plugin\n", &[]);

        let (report, _, _) = fixture.load();
        let reasons: Vec<_> = report.failed.iter().map(|(f, e)| (f.as_str(), e)).collect();
        assert!(matches!(reasons[0], ("garbled", PluginError::Manifest { .. })));
        assert!(matches!(reasons[1], ("no_main", PluginError::MissingMain(_))));
    }

    #[test]
    fn unsupported_entry_is_reported() {
        let fixture = Fixture::new();
        fixture.plugin("py", "[plugin]\nmain = \"main.py\"\n", &[("main.py", "def setup(bot, d): pass")]);

        let (report, _, registry) = fixture.load();
        assert!(matches!(report.failed[0].1, PluginError::UnsupportedEntry(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_hook_is_isolated() {
        let fixture = Fixture::new();
        fixture.plugin(
            "a_throws",
            "[plugin]\nmain = \"main.rhai\"\n",
            &[("main.rhai", "fn setup(bot, d) { bot.command(\"bad\", \"x\"); throw \"nope\"; }")],
        );
        fixture.plugin("b_ok", "[plugin]\nmain = \"main.rhai\"\n", &[("main.rhai", PING_SCRIPT)]);

        let (report, commands, registry) = fixture.load();
        assert!(matches!(&report.failed[0].1, PluginError::Setup { plugin, .. } if plugin == "a_throws"));
        assert!(reply(&commands, "bad").is_none());
        assert!(reply(&commands, "ping").is_some());
        assert_eq!(registry.names(), vec!["b_ok".to_string()]);
    }

    #[test]
    fn duplicate_names_keep_the_first_folder() {
        let fixture = Fixture::new();
        let first = "[plugin]\nname = \"dice\"\nmain = \"main.rhai\"\n";
        fixture.plugin("a", first, &[("main.rhai", "fn setup(bot, d) { bot.command(\"roll\", \"a\"); }")]);
        fixture.plugin("b", first, &[("main.rhai", "fn setup(bot, d) { bot.command(\"roll\", \"b\"); }")]);

        let (report, commands, registry) = fixture.load();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dice").map(|r| r.folder.ends_with("a")), Some(true));
        assert!(matches!(&report.failed[0], (folder, PluginError::Duplicate(_)) if folder == "b"));
        assert_eq!(reply(&commands, "roll").as_deref(), Some("a"));
    }

    #[test]
    fn plugins_load_in_lexical_order() {
        let fixture = Fixture::new();
        for folder in ["zeta", "alpha", "mid"] {
            fixture.plugin(
                folder,
                "[plugin]\nmain = \"main.rhai\"\n",
                &[("main.rhai", format!("fn setup(bot, d) {{ bot.command(\"who\", \"{folder}\"); }}").as_str())],
            );
        }

        let (report, commands, _) = fixture.load();
        assert_eq!(report.loaded, vec!["alpha", "mid", "zeta"]);
        // last registration wins
        assert_eq!(reply(&commands, "who").as_deref(), Some("zeta"));
    }

    #[test]
    fn reloading_is_idempotent() {
        let fixture = Fixture::new();
        fixture.plugin("example_plugin", "[plugin]\nmain = \"main.rhai\"\n", &[("main.rhai", PING_SCRIPT)]);
        let config_dir = fixture.loader.config_dir("example_plugin");

        fixture.load();
        std::fs::write(config_dir.join("state.txt"), "kept").unwrap();
        let (report, _, _) = fixture.load();

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(std::fs::read_to_string(config_dir.join("state.txt")).unwrap(), "kept");
        let entries = std::fs::read_dir(fixture.loader.storage_dir()).unwrap().count();
        assert_eq!(entries, 1);
    }

    struct Panicking;

    impl PluginModule for Panicking {
        fn kind(&self) -> &'static str {
            "test"
        }

        fn has_setup(&self) -> bool {
            true
        }

        fn setup(&self, host: &mut PluginHost<'_>, _config_dir: &Path) -> PluginResult<()> {
            host.add_command(Command::new("never").with_reply("x"));
            panic!("hook exploded");
        }
    }

    #[test]
    fn panicking_hook_is_reported_as_setup_failure() {
        let mut commands = CommandService::new("!");
        let err = run_setup(&Panicking, &mut commands, "boom", Path::new("config/boom")).unwrap_err();
        assert!(matches!(err, PluginError::Setup { ref message, .. } if message == "hook exploded"));
        assert!(commands.get("never").is_none());
    }

    #[test]
    fn escaping_main_is_rejected() {
        let fixture = Fixture::new();
        std::fs::write(fixture.loader.plugin_dir().parent().unwrap().join("outside.rhai"), PING_SCRIPT).ok();
        fixture.plugin("sneaky", "[plugin]\nmain = \"../../outside.rhai\"\n", &[]);

        let (report, commands, registry) = fixture.load();
        assert!(matches!(report.failed[0], (ref f, PluginError::Manifest { .. }) if f == "sneaky"));
        assert!(registry.is_empty());
        assert!(commands.get("ping").is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn shared_library_without_hook_loads() {
        let Some(libc) = library::tests::system_library() else {
            return;
        };
        let fixture = Fixture::new();
        let folder = fixture.plugin("native", "[plugin]\nmain = \"libnative.so\"\n", &[]);
        std::os::unix::fs::symlink(&libc, folder.join("libnative.so")).unwrap();

        let (report, commands, registry) = fixture.load();
        assert_eq!(report.loaded, vec!["native".to_string()]);
        assert!(commands.is_empty());
        let record = registry.get("native").unwrap();
        assert_eq!(record.module.kind(), "library");
        assert!(!record.module.has_setup());
        assert!(fixture.loader.config_dir("native").is_dir());
    }

    static LIBRARY_SETUP_CALLS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn uptime_setup(host: &mut PluginHost<'_>, config_dir: &Path) -> Result<(), String> {
        LIBRARY_SETUP_CALLS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let reply = format!("storage at {}", config_dir.display());
        host.add_command(Command::new("uptime").with_reply(reply));
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn shared_library_hook_runs_once_and_commits() {
        let Some(libc) = library::tests::system_library() else {
            return;
        };
        let fixture = Fixture::new();
        let folder = fixture.plugin("uptime", "[plugin]\nmain = \"libuptime.so\"\n", &[]);
        let manifest = PluginManifest::read(&folder).unwrap().unwrap();
        let module = LibraryModule::load(&libc).unwrap().with_setup(uptime_setup);

        let mut commands = CommandService::new("!");
        let mut registry = PluginRegistry::new();
        let name = fixture
            .loader
            .attach(&folder, manifest, Box::new(module), &mut commands, &mut registry)
            .unwrap();

        assert_eq!(name, "uptime");
        assert_eq!(LIBRARY_SETUP_CALLS.load(std::sync::atomic::Ordering::SeqCst), 1);
        let expected = format!("storage at {}", fixture.loader.config_dir("uptime").display());
        assert_eq!(reply(&commands, "uptime"), Some(expected));
        assert_eq!(commands.get("uptime").and_then(|c| c.owner.as_deref()), Some("uptime"));
        assert_eq!(registry.get("uptime").map(|r| r.module.kind()), Some("library"));

        // Handlers go first, the library stays loaded until its record is dropped
        drop(commands);
        drop(registry);
    }
}
