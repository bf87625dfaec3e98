use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use log::{debug, info, warn};

use crate::backend_config::{load_config_from_file, write_config_to_file, BackendConfig};

/// Where the live config is persisted
pub trait ConfigStore {
    fn load(&mut self) -> Result<BackendConfig>;
    fn save(&mut self, config: &BackendConfig) -> Result<()>;
}

/// JSON file on disk; a missing file loads as the default config
pub struct JsonFileConfigStore {
    path: String,
}

impl JsonFileConfigStore {
    pub fn new(path: &str) -> Self {
        JsonFileConfigStore {
            path: String::from(path),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&mut self) -> Result<BackendConfig> {
        load_config_from_file(&self.path)
    }

    fn save(&mut self, config: &BackendConfig) -> Result<()> {
        write_config_to_file(config, &self.path)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    pub config: BackendConfig,
    pub saves: usize,
}

impl MemoryConfigStore {
    pub fn new(config: BackendConfig) -> Self {
        MemoryConfigStore { config, saves: 0 }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&mut self) -> Result<BackendConfig> {
        Ok(self.config.clone())
    }

    fn save(&mut self, config: &BackendConfig) -> Result<()> {
        self.config = config.clone();
        self.saves += 1;
        Ok(())
    }
}

/// Handle for flagging that the stored config changed. Safe to hand to a
/// file watcher or message thread; the reload itself happens on the tick thread
#[derive(Debug, Clone)]
pub struct ConfigChangeNotifier {
    dirty: Arc<AtomicBool>,
}

impl ConfigChangeNotifier {
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Owns the live config. Consumers compare `version()` against the last one
/// they derived state from
pub struct ConfigManager {
    config: BackendConfig,
    version: u64,
    dirty: Arc<AtomicBool>,
}

impl ConfigManager {
    /// Load from `store`, falling back to defaults if that fails
    pub fn new(store: &mut dyn ConfigStore) -> Self {
        let config = match store.load() {
            Ok(config) => config.sanitised(),
            Err(e) => {
                warn!("Could not load config, using defaults: {}", e);
                BackendConfig::default()
            }
        };
        ConfigManager {
            config,
            version: 0,
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn notifier(&self) -> ConfigChangeNotifier {
        ConfigChangeNotifier {
            dirty: self.dirty.clone(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// If a change was flagged, reload from `store` and return the new config.
    /// A failed reload keeps the current config
    pub fn apply_if_dirty(&mut self, store: &mut dyn ConfigStore) -> Option<&BackendConfig> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return None;
        }
        match store.load() {
            Ok(config) => {
                let config = config.sanitised();
                if config == self.config {
                    debug!("Config reload: no changes");
                    return None;
                }
                self.config = config;
                self.version += 1;
                info!("Config reloaded; now version {}", self.version);
                Some(&self.config)
            }
            Err(e) => {
                warn!("Config reload failed, keeping current config: {}", e);
                None
            }
        }
    }

    /// Replace the live config and persist it. The live config changes even if
    /// saving fails
    pub fn update(&mut self, config: BackendConfig, store: &mut dyn ConfigStore) -> Result<()> {
        self.config = config.sanitised();
        self.version += 1;
        debug!("Config updated; now version {}", self.version);
        store.save(&self.config)
    }
}
