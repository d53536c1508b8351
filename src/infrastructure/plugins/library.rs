//! Library plugins - native shared libraries loaded with `libloading`
//!
//! A library plugin may export a registration hook named `plugin_setup`
//! with the [`PluginSetupFn`] signature. Because the hook uses the Rust ABI,
//! the library must be built with the same compiler as the bot:
//!
//! ```rust,ignore
//! #[no_mangle]
//! pub fn plugin_setup(host: &mut PluginHost<'_>, config_dir: &Path) -> Result<(), String> {
//!     host.add_command(Command::new("uptime").with_reply("forever"));
//!     Ok(())
//! }
//! ```

use libloading::Library;
use std::ffi::OsStr;
use std::path::Path;

use super::module::{PluginHost, PluginModule};
use crate::application::errors::{PluginError, PluginResult};

/// Function signature of the optional registration hook
pub type PluginSetupFn = fn(&mut PluginHost<'_>, &Path) -> Result<(), String>;

pub const SETUP_SYMBOL: &[u8] = b"plugin_setup";

/// A loaded shared library.
///
/// Command handlers registered by the library point into its code, so the
/// library must outlive every command it registered.
pub struct LibraryModule {
    setup: Option<PluginSetupFn>,
    // Keeps `setup` and registered handlers valid
    _library: Library,
}

impl LibraryModule {
    pub fn load(path: &Path) -> PluginResult<Self> {
        // SAFETY: loading runs the library's initialisers; plugin folders
        // are trusted like the bot binary itself.
        let library = unsafe { Library::new(path) }.map_err(|e| PluginError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: the exported symbol must have the `PluginSetupFn` signature.
        let setup = unsafe { library.get::<PluginSetupFn>(SETUP_SYMBOL) }
            .ok()
            .map(|symbol| *symbol);

        Ok(Self {
            setup,
            _library: library,
        })
    }

    /// Use `setup` as the registration hook instead of the exported one
    #[cfg(test)]
    pub(crate) fn with_setup(mut self, setup: PluginSetupFn) -> Self {
        self.setup = Some(setup);
        self
    }
}

impl PluginModule for LibraryModule {
    fn kind(&self) -> &'static str {
        "library"
    }

    fn has_setup(&self) -> bool {
        self.setup.is_some()
    }

    fn setup(&self, host: &mut PluginHost<'_>, config_dir: &Path) -> PluginResult<()> {
        let Some(setup) = self.setup else {
            return Ok(());
        };
        setup(host, config_dir).map_err(|message| PluginError::Setup {
            plugin: host.plugin_name().to_string(),
            message,
        })
    }
}

/// Whether a path looks like a shared library on any platform
pub fn is_library(path: &Path) -> bool {
    matches!(
        path.extension().and_then(OsStr::to_str),
        Some("so" | "dylib" | "dll")
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::services::CommandService;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// The C library this test process is linked against, if any
    pub(crate) fn system_library() -> Option<PathBuf> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        maps.lines()
            .filter_map(|line| line.split_whitespace().nth(5))
            .map(PathBuf::from)
            .find(|path| {
                path.file_name()
                    .and_then(OsStr::to_str)
                    .is_some_and(|name| name.starts_with("libc.so") || name.starts_with("libc-"))
            })
    }

    #[test]
    fn recognises_library_extensions() {
        assert!(is_library(Path::new("libweather.so")));
        assert!(is_library(Path::new("weather.dylib")));
        assert!(is_library(Path::new("weather.dll")));
        assert!(!is_library(Path::new("main.rhai")));
        assert!(!is_library(Path::new("main.py")));
        assert!(!is_library(Path::new("so")));
    }

    #[test]
    fn garbage_library_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("libbroken.so");
        std::fs::write(&path, b"definitely not an object file").unwrap();

        assert!(matches!(LibraryModule::load(&path), Err(PluginError::Load { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn real_library_without_hook_registers_nothing() {
        let Some(libc) = system_library() else {
            return;
        };
        let module = LibraryModule::load(&libc).unwrap();
        assert_eq!(module.kind(), "library");
        assert!(!module.has_setup());

        let mut commands = CommandService::new("!");
        let mut host = PluginHost::new(&mut commands, "libc");
        module.setup(&mut host, Path::new("config/libc")).unwrap();
        assert_eq!(host.commit(), 0);
        assert!(commands.is_empty());
    }

    fn failing_setup(_host: &mut PluginHost<'_>, _config_dir: &Path) -> Result<(), String> {
        Err("no database".to_string())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn hook_error_names_the_plugin() {
        let Some(libc) = system_library() else {
            return;
        };
        let module = LibraryModule::load(&libc).unwrap().with_setup(failing_setup);
        assert!(module.has_setup());

        let mut commands = CommandService::new("!");
        let mut host = PluginHost::new(&mut commands, "db");
        let err = module.setup(&mut host, Path::new("config/db")).unwrap_err();
        assert!(matches!(err, PluginError::Setup { ref plugin, ref message } if plugin == "db" && message == "no database"));
    }
}
