//! Controller
//!
//! The command surface behind the control channel. It owns the sequence
//! registry and talks to the runner, the storage collaborator and the
//! script engine. Every command that changes what is running goes through
//! one reconfiguration lock, so two clients cannot interleave a run and an
//! update.
//!
//! Lock order: reconfiguration lock, then registry, then the runner's
//! active set.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::OutputMode;
use crate::matrix::MatrixSize;
use crate::output::{ChannelOrderEncoder, FrameEncoder};
use crate::preview::{self, clamp_frames};
use crate::registry::SequenceRegistry;
use crate::runner::{ActiveSequence, SequenceRunner};
use crate::script::{ScriptEngine, UnavailableEngine};
use crate::sequence::{SequenceInfo, StopFlag};
use crate::store::{MemoryStore, SequenceStore, StoreError};

/// Command-level failures, reported to clients as an `error` string
#[derive(Debug, Error)]
pub enum ControlError {
    /// A sequence with that name is already registered
    #[error("Sequence with name '{0}' already exists")]
    SequenceExists(String),

    /// No sequence has that name
    #[error("Sequence '{0}' not found")]
    UnknownSequence(String),

    /// Built-in sequences cannot be changed
    #[error("Sequence '{0}' is built in and cannot be updated")]
    NotCustom(String),

    /// The request lacked fields the command needs
    #[error("Missing required fields: {0}")]
    MissingFields(&'static str),

    /// The name is empty or only whitespace
    #[error("Invalid sequence name: {0:?}")]
    InvalidName(String),

    /// The storage collaborator failed
    #[error("Failed to save sequence: {0}")]
    Store(#[from] StoreError),

    /// A preview could not be produced
    #[error("{0}")]
    Preview(String),

    /// The worker running the command panicked or was cancelled
    #[error("Command did not complete")]
    TaskFailed,
}

/// Result of resolving a run request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Names now active, in registry order
    pub activated: Vec<String>,
    /// Requested names that matched nothing
    pub unknown: Vec<String>,
}

/// Snapshot reported by `getStatus`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerStatus {
    /// Whether the runner loop is alive
    pub is_running: bool,
    /// Names in the active set
    pub active_sequences: Vec<String>,
    /// Registry size
    pub available_sequences_count: usize,
    /// Matrix dimensions
    pub size: MatrixSize,
    /// Output mode
    pub mode: OutputMode,
}

/// Script text and metadata of one sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceCode {
    /// Identifying metadata
    pub info: SequenceInfo,
    /// Script body, `None` for built-ins
    pub code: Option<String>,
    /// Whether the sequence was authored at runtime
    pub is_custom: bool,
}

/// Executes control commands
pub struct Controller {
    size: MatrixSize,
    mode: OutputMode,
    registry: RwLock<SequenceRegistry>,
    runner: Arc<SequenceRunner>,
    store: Arc<dyn SequenceStore>,
    engine: Arc<dyn ScriptEngine>,
    encoder: Arc<dyn FrameEncoder>,
    suspended: Mutex<Option<Vec<String>>>,
    reconfigure: Mutex<()>,
}

impl Controller {
    /// Controller over the built-in catalogue with in-memory storage and no
    /// script engine
    #[must_use]
    pub fn new(size: MatrixSize, mode: OutputMode, runner: Arc<SequenceRunner>) -> Self {
        Self {
            size,
            mode,
            registry: RwLock::new(SequenceRegistry::with_builtins()),
            runner,
            store: Arc::new(MemoryStore::new()),
            engine: Arc::new(UnavailableEngine),
            encoder: Arc::new(ChannelOrderEncoder::default()),
            suspended: Mutex::new(None),
            reconfigure: Mutex::new(()),
        }
    }

    /// Use `store` for persistence
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SequenceStore>) -> Self {
        self.store = store;
        self
    }

    /// Use `engine` for script sequences
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Encode preview frames with `encoder`
    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn FrameEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Matrix dimensions
    #[must_use]
    pub fn size(&self) -> MatrixSize {
        self.size
    }

    /// The runner this controller reconfigures
    #[must_use]
    pub fn runner(&self) -> &Arc<SequenceRunner> {
        &self.runner
    }

    /// Metadata for every known sequence
    #[must_use]
    pub fn sequences(&self) -> Vec<SequenceInfo> {
        self.registry.read().infos()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            is_running: self.runner.is_alive(),
            active_sequences: self.runner.active_names(),
            available_sequences_count: self.registry.read().len(),
            size: self.size,
            mode: self.mode,
        }
    }

    /// Replace the active set with the sequences named in `names`
    ///
    /// Resolution filters the registry, so unknown names are skipped and an
    /// all-unknown request leaves nothing running. The requested names are
    /// persisted for the next start.
    pub fn run_sequences(&self, names: &[String]) -> RunOutcome {
        let _guard = self.reconfigure.lock();
        let outcome = self.activate(names);
        *self.suspended.lock() = None;
        self.persist_active(names);
        outcome
    }

    /// Stop everything and blank the output, remembering what ran
    ///
    /// The empty set is persisted, so a restart stays dark.
    pub fn turn_off(&self) {
        let _guard = self.reconfigure.lock();
        let names = self.runner.active_names();
        {
            let mut suspended = self.suspended.lock();
            if suspended.is_none() {
                *suspended = Some(names);
            }
        }
        self.runner.replace_active_set(Vec::new());
        self.runner.request_blank();
        self.persist_active(&[]);
        info!("Output turned off");
    }

    /// Resume what ran before the last [`turn_off`](Self::turn_off)
    ///
    /// Returns `None` if nothing was suspended. The resumed names are
    /// persisted again.
    pub fn turn_on(&self) -> Option<RunOutcome> {
        let _guard = self.reconfigure.lock();
        let names = self.suspended.lock().take()?;
        info!(sequences = ?names, "Output turned on");
        let outcome = self.activate(&names);
        self.persist_active(&names);
        Some(outcome)
    }

    /// Register a new script sequence and persist it
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidName`] for a blank name,
    /// [`ControlError::SequenceExists`] if the name or its storage id is
    /// taken, or [`ControlError::Store`] if it cannot be saved.
    pub fn create_sequence(
        &self,
        name: &str,
        description: &str,
        code: &str,
    ) -> Result<SequenceInfo, ControlError> {
        if name.trim().is_empty() {
            return Err(ControlError::InvalidName(name.to_string()));
        }

        let _guard = self.reconfigure.lock();
        if let Some(existing) = self.registry.read().conflicting(name) {
            debug!(sequence = %name, existing = %existing.info.name, "Name collides with registered sequence");
            return Err(ControlError::SequenceExists(name.to_string()));
        }

        let id = self.store.save(name, description, code)?;
        let info = SequenceInfo::new(id, name, description);
        self.registry
            .write()
            .add_script(info.clone(), Arc::from(code))?;

        info!(sequence = %name, id = %info.id, "Created sequence");
        Ok(info)
    }

    /// Replace the body of a script sequence
    ///
    /// If the sequence is active, the active set is rebuilt from fresh
    /// instances so the new body takes effect immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownSequence`], [`ControlError::NotCustom`]
    /// for built-ins, or [`ControlError::Store`] if it cannot be saved.
    pub fn update_sequence(
        &self,
        name: &str,
        description: Option<&str>,
        code: &str,
    ) -> Result<SequenceInfo, ControlError> {
        let _guard = self.reconfigure.lock();
        match self.registry.read().find(name) {
            None => return Err(ControlError::UnknownSequence(name.to_string())),
            Some(entry) if !entry.is_custom() => {
                return Err(ControlError::NotCustom(name.to_string()))
            }
            Some(_) => {}
        }

        self.store.update(name, description, code)?;
        let info = self.registry.write().update_script(
            name,
            description.map(str::to_string),
            Arc::from(code),
        )?;
        info!(sequence = %name, "Updated sequence");

        let active = self.runner.active_names();
        if active.iter().any(|active| active == name) {
            self.activate(&active);
            info!(sequence = %name, "Refreshed active sequence");
        }
        Ok(info)
    }

    /// Script text and metadata for `name`
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownSequence`] if no sequence has that name.
    pub fn sequence_code(&self, name: &str) -> Result<SequenceCode, ControlError> {
        let registry = self.registry.read();
        let entry = registry
            .find(name)
            .ok_or_else(|| ControlError::UnknownSequence(name.to_string()))?;
        Ok(SequenceCode {
            info: entry.info.clone(),
            code: entry.code().map(str::to_string),
            is_custom: entry.is_custom(),
        })
    }

    /// Render `name` off-device and return hex-encoded wire frames
    ///
    /// Runs on the calling thread until the sequence returns, the frame
    /// limit is reached, or `stop` is raised.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownSequence`], or
    /// [`ControlError::Preview`] if the run committed no frames.
    pub fn preview(
        &self,
        name: &str,
        max_frames: Option<usize>,
        stop: StopFlag,
    ) -> Result<Vec<String>, ControlError> {
        let mut sequence = {
            let registry = self.registry.read();
            let entry = registry
                .find(name)
                .ok_or_else(|| ControlError::UnknownSequence(name.to_string()))?;
            entry.instantiate(&self.engine)
        };

        let captured = preview::capture(&mut sequence, self.size, clamp_frames(max_frames), stop);
        if captured.frames.is_empty() {
            return Err(ControlError::Preview("No frames captured".to_string()));
        }
        Ok(captured.hex_frames(self.encoder.as_ref()))
    }

    /// Register every stored script sequence
    ///
    /// Returns how many were added. Failures are logged.
    pub fn load_custom_sequences(&self) -> usize {
        let stored = match self.store.load_all() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load custom sequences");
                return 0;
            }
        };

        let mut registry = self.registry.write();
        let mut added = 0;
        for sequence in stored {
            let name = sequence.info.name.clone();
            match registry.add_script(sequence.info, Arc::from(sequence.code)) {
                Ok(()) => added += 1,
                Err(e) => warn!(sequence = %name, error = %e, "Skipping stored sequence"),
            }
        }
        info!(total = registry.len(), custom = added, "Loaded sequences");
        added
    }

    /// Resume the active set saved by the last run
    pub fn restore_active(&self) -> RunOutcome {
        let names = match self.store.load_active() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to load saved active set");
                return RunOutcome::default();
            }
        };
        if names.is_empty() {
            return RunOutcome::default();
        }
        let _guard = self.reconfigure.lock();
        let outcome = self.activate(&names);
        info!(sequences = ?outcome.activated, "Restored active set");
        outcome
    }

    /// Build fresh instances for `names` and install them
    fn activate(&self, names: &[String]) -> RunOutcome {
        let registry = self.registry.read();
        let entries = registry.resolve(names);

        let unknown: Vec<String> = names
            .iter()
            .filter(|name| registry.find(name).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            debug!(unknown = ?unknown, "Ignoring unknown sequence names");
        }

        let activated: Vec<String> = entries.iter().map(|e| e.info.name.clone()).collect();
        let set = entries
            .into_iter()
            .map(|entry| ActiveSequence::new(entry.info.name.clone(), entry.instantiate(&self.engine)))
            .collect();
        self.runner.replace_active_set(set);

        RunOutcome { activated, unknown }
    }

    fn persist_active(&self, names: &[String]) {
        if let Err(e) = self.store.save_active(names) {
            warn!(error = %e, "Failed to save active set");
        }
    }
}
