//! Plugin registry - Records of the plugins loaded at startup

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::manifest::PluginManifest;
use super::module::PluginModule;
use crate::application::errors::{PluginError, PluginResult};

/// A successfully loaded plugin
pub struct PluginRecord {
    pub manifest: PluginManifest,
    /// Folder the plugin was discovered in
    pub folder: PathBuf,
    /// Persistent storage folder, `<storage>/<name>/`
    pub config_dir: PathBuf,
    pub module: Box<dyn PluginModule>,
}

impl PluginRecord {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }
}

impl fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRecord")
            .field("manifest", &self.manifest)
            .field("folder", &self.folder)
            .field("config_dir", &self.config_dir)
            .field("kind", &self.module.kind())
            .finish()
    }
}

/// Loaded plugins by name, at most one per name
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginRecord>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record: PluginRecord) -> PluginResult<()> {
        let name = record.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(PluginError::Duplicate(name));
        }
        self.plugins.insert(name, record);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.plugins.get(name)
    }

    /// Plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginRecord> {
        self.plugins.values()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::plugins::module::PluginHost;
    use std::path::Path;

    struct Inert;

    impl PluginModule for Inert {
        fn kind(&self) -> &'static str {
            "inert"
        }

        fn has_setup(&self) -> bool {
            false
        }

        fn setup(&self, _host: &mut PluginHost<'_>, _config_dir: &Path) -> PluginResult<()> {
            Ok(())
        }
    }

    fn record(name: &str) -> PluginRecord {
        PluginRecord {
            manifest: PluginManifest {
                name: name.to_string(),
                main: PathBuf::from("main.rhai"),
                enabled: true,
                description: None,
                version: None,
                author: None,
            },
            folder: PathBuf::from("plugins").join(name),
            config_dir: PathBuf::from("config").join(name),
            module: Box::new(Inert),
        }
    }

    #[test]
    fn one_record_per_name() {
        let mut registry = PluginRegistry::new();
        registry.register(record("weather")).unwrap();
        registry.register(record("dice")).unwrap();

        assert!(matches!(
            registry.register(record("weather")),
            Err(PluginError::Duplicate(name)) if name == "weather"
        ));
        assert_eq!(registry.names(), vec!["dice".to_string(), "weather".to_string()]);
        assert!(registry.is_loaded("dice"));
        assert_eq!(registry.get("dice").map(|r| r.module.kind()), Some("inert"));
    }
}
