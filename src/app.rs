//! Application
//!
//! The single owner of every long-lived component. Nothing in the crate is
//! a global; the runtime and control surface reach state through `App`.

use std::rc::Rc;

use tracing::info;

use crate::audio::AudioManager;
use crate::config::ControllerConfig;
use crate::engine::{Diagnostics, FrameReport, OutputDriver, Pipeline};
use crate::error::Result;
use crate::globals::Globals;
use crate::layers::{LayerEnv, StackManager};
use crate::logsink::{FileLogSink, LogSink};
use crate::shard::ShardRegistry;
use crate::storage::{FsStorage, SharedStorage};

/// Controller state and its collaborators
#[derive(Debug)]
pub struct App {
    config: ControllerConfig,
    storage: SharedStorage,
    shards: Rc<ShardRegistry>,
    globals: Globals,
    audio: AudioManager,
    stacks: StackManager,
    pipeline: Pipeline,
}

impl App {
    /// Open the controller on filesystem storage at `config.storage_root`
    pub fn open(config: ControllerConfig) -> Result<Self> {
        let storage: SharedStorage = Rc::new(FsStorage::new(&config.storage_root)?);
        Self::with_storage(config, storage, ShardRegistry::with_builtins())
    }

    /// Open the controller on an arbitrary storage backend and shard set
    pub fn with_storage(config: ControllerConfig, storage: SharedStorage, shards: ShardRegistry) -> Result<Self> {
        config.validate()?;

        let log: Rc<dyn LogSink> = Rc::new(FileLogSink::new(storage.clone()));
        let shards = Rc::new(shards);
        let env = LayerEnv {
            storage: storage.clone(),
            shards: Rc::clone(&shards),
            log: Rc::clone(&log),
        };

        let globals = Globals::open(storage.clone())?;
        let audio = AudioManager::open(storage.clone())?;
        let stacks = StackManager::open(env)?;
        let pipeline = Pipeline::new(&config, log);

        info!(
            width = config.width,
            height = config.height,
            active = %stacks.active_name(),
            "controller initialised"
        );
        Ok(Self {
            config,
            storage,
            shards,
            globals,
            audio,
            stacks,
            pipeline,
        })
    }

    /// Run one pipeline iteration
    pub fn render_frame(&mut self) -> FrameReport {
        self.pipeline
            .render_frame(&mut self.stacks, &self.globals, &mut self.audio)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.pipeline.diagnostics(&self.stacks)
    }

    pub fn add_driver(&mut self, driver: Box<dyn OutputDriver>) {
        self.pipeline.add_driver(driver);
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn shards(&self) -> &ShardRegistry {
        &self.shards
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut Globals {
        &mut self.globals
    }

    pub fn audio(&self) -> &AudioManager {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioManager {
        &mut self.audio
    }

    pub fn stacks(&self) -> &StackManager {
        &self.stacks
    }

    pub fn stacks_mut(&mut self) -> &mut StackManager {
        &mut self.stacks
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerInit;

    #[test]
    fn test_open_on_disk_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig {
            storage_root: dir.path().to_path_buf(),
            ..ControllerConfig::default()
        };

        {
            let mut app = App::open(config.clone()).unwrap();
            app.stacks_mut()
                .get_mut("inactive")
                .unwrap()
                .add_layer(LayerInit::shard("palette_sweep"))
                .unwrap();
            app.stacks_mut().switch().unwrap();
        }

        let app = App::open(config).unwrap();
        assert_eq!(app.stacks().active().len(), 1);
        assert!(dir.path().join("stacks/B/layers/0/info").is_file());
        assert!(dir.path().join("globals/vars").is_file());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig {
            storage_root: dir.path().to_path_buf(),
            frame_period_ms: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(App::open(config).unwrap_err().error_code(), "CONFIG_ERROR");
    }
}
