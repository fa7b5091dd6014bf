//! Julelys Core - Rendering Pipeline for an RGBW LED Matrix
//!
//! This crate drives a rectangular LED matrix (a wrapped flagpole, a
//! curtain, a tree) from a catalogue of animated sequences. It has no
//! hardware dependency of its own: frames leave through an
//! [`OutputDevice`] that the daemon supplies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Control Channel                             │
//! │   ControlClient ──JSON──► ControlServer ──► dispatch()            │
//! │                                              │                    │
//! │                                         Controller                │
//! │                          ┌───────────────────┼────────────────┐   │
//! │                          │                   │                │   │
//! │                   SequenceRegistry   SequenceStore      preview   │
//! └──────────────────────────┼───────────────────────────────────────┘
//!                            │ replace_active_set
//! ┌──────────────────────────┼───────────────────────────────────────┐
//! │  runner thread           ▼                                        │
//! │  SequenceRunner ──► Sequence::run ──► FrameWriter (back buffer)   │
//! │                                            │ commit_frame = swap  │
//! │                                     FrameCompositor (front)       │
//! │                                            │ copy_front_into      │
//! │  transmission thread                       ▼                      │
//! │  TransmissionLoop ──► FrameEncoder ──► OutputDevice               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The render side and the transmission side run on their own OS threads
//! and meet only at the compositor. The control channel runs on tokio and
//! touches the render side only through the runner's active-set handle.
//!
//! # Key Types
//!
//! - [`Controller`]: command semantics behind the control channel
//! - [`SequenceRunner`]: owns and drives the active set
//! - [`FrameCompositor`]: double-buffered handoff between threads
//! - [`TransmissionLoop`]: fixed-rate pump to the output device
//! - [`Sequence`]: the closed set of animations
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use julelys_core::{
//!     config::OutputMode, Controller, FrameCompositor, FrameWriter, MatrixSize, SequenceRunner,
//! };
//!
//! let size = MatrixSize::new(8, 55);
//! let compositor = Arc::new(FrameCompositor::new(size));
//! let runner = Arc::new(SequenceRunner::default());
//!
//! let worker = Arc::clone(&runner);
//! let mut writer = FrameWriter::simulated(Arc::clone(&compositor));
//! std::thread::spawn(move || worker.run_forever(&mut writer));
//!
//! let controller = Controller::new(size, OutputMode::Headless, runner);
//! controller.run_sequences(&["Rainbow".to_string()]);
//! ```

#![warn(missing_docs)]

pub mod color;
pub mod compositor;
pub mod config;
pub mod controller;
pub mod frame;
pub mod matrix;
pub mod output;
pub mod preview;
pub mod protocol;
pub mod registry;
pub mod runner;
pub mod script;
pub mod sequence;
pub mod store;
pub mod transmission;
pub mod transport;

// Re-exports for convenience
pub use color::Color;
pub use compositor::{FrameCompositor, FrameWriter};
pub use config::{load_config, ConfigError, ConfigOverrides, JulelysConfig, OutputMode};
pub use controller::{ControlError, Controller, ControllerStatus, RunOutcome};
pub use frame::Frame;
pub use matrix::{MatrixSize, Point};
pub use output::{
    ChannelOrder, ChannelOrderEncoder, DeviceError, FrameEncoder, NullDevice, OutputDevice,
};
pub use protocol::{CommandKind, Request, Response};
pub use registry::{BuiltinSequence, SequenceRegistry};
pub use runner::{ActiveSequence, SequenceRunner};
pub use script::{ScriptEngine, ScriptError, UnavailableEngine};
pub use sequence::{DrawSink, Sequence, SequenceContext, SequenceInfo, StopFlag};
pub use store::{DirectoryStore, MemoryStore, SequenceStore, StoreError};
pub use transmission::{TransmissionHandle, TransmissionLoop};
pub use transport::{ControlClient, ControlServer, TransportError};
