//! Control Protocol
//!
//! One JSON object per request and one per response, over one connection
//! per call. Responses are always flat objects; a failed command carries an
//! `error` string field instead of a separate envelope, and its absence
//! means success.
//!
//! ```text
//! → {"cmd":"runSequences","names":["Rainbow"]}
//! ← {"status":"running"}
//! ```

mod codec;
mod dispatch;

pub use codec::{encode_response, ProtocolError, RequestDecoder, DEFAULT_MAX_REQUEST_SIZE};
pub use dispatch::dispatch;

use serde::{Deserialize, Serialize};

use crate::controller::ControllerStatus;
use crate::sequence::SequenceInfo;

/// Command kinds accepted in the `cmd` field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    /// List every known sequence
    GetSequences,
    /// Report runner state
    GetStatus,
    /// Replace the active set
    RunSequences,
    /// Resume after `turnOff`
    TurnOn,
    /// Stop and blank the output
    TurnOff,
    /// Add a script sequence
    CreateSequence,
    /// Replace a script sequence's body
    UpdateSequence,
    /// Fetch a sequence's script text
    GetSequenceCode,
    /// Render frames off-device
    PreviewSequence,
}

/// A decoded request
///
/// Only `cmd` is required at the wire level; each command checks the
/// fields it needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Command kind
    pub cmd: CommandKind,

    /// Sequence names for `runSequences`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,

    /// Target sequence name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_name: Option<String>,

    /// Description for create/update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_description: Option<String>,

    /// Script body for create/update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js_code: Option<String>,

    /// Frame limit for previews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<usize>,
}

impl Request {
    /// Request with only `cmd` set
    #[must_use]
    pub fn new(cmd: CommandKind) -> Self {
        Self {
            cmd,
            names: None,
            sequence_name: None,
            sequence_description: None,
            js_code: None,
            max_frames: None,
        }
    }

    /// `runSequences` for `names`
    #[must_use]
    pub fn run_sequences<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            ..Self::new(CommandKind::RunSequences)
        }
    }

    /// Set the target sequence name
    #[must_use]
    pub fn with_sequence_name(mut self, name: impl Into<String>) -> Self {
        self.sequence_name = Some(name.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.sequence_description = Some(description.into());
        self
    }

    /// Set the script body
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.js_code = Some(code.into());
        self
    }

    /// Set the preview frame limit
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }
}

// =============================================================================
// Responses
// =============================================================================

/// `getSequences`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencesResponse {
    /// Every known sequence, in registry order
    pub sequences: Vec<SequenceInfo>,
}

/// `getStatus`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the runner loop is alive
    pub is_running: bool,
    /// Names in the active set
    pub active_sequences: Vec<String>,
    /// Registry size
    pub available_sequences_count: usize,
    /// Number of strings
    pub matrix_width: usize,
    /// LEDs per string
    pub matrix_height: usize,
    /// `real` or `headless`
    pub mode: String,
}

impl From<ControllerStatus> for StatusResponse {
    fn from(status: ControllerStatus) -> Self {
        Self {
            is_running: status.is_running,
            active_sequences: status.active_sequences,
            available_sequences_count: status.available_sequences_count,
            matrix_width: status.size.width,
            matrix_height: status.size.height,
            mode: status.mode.to_string(),
        }
    }
}

/// `runSequences`, `turnOn`, `turnOff`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    /// `running`, `not running`, `on` or `off`
    pub status: String,
}

impl CommandStatus {
    /// Status with the given text
    #[must_use]
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// `createSequence` and `updateSequence`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceChangeResponse {
    /// `created`, `updated` or `error`
    pub status: String,
    /// Name of the affected sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_name: Option<String>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SequenceChangeResponse {
    /// Successful change
    #[must_use]
    pub fn done(status: &str, name: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            sequence_name: Some(name.into()),
            error: None,
        }
    }

    /// Failed change
    #[must_use]
    pub fn failed(error: impl ToString) -> Self {
        Self {
            status: "error".to_string(),
            sequence_name: None,
            error: Some(error.to_string()),
        }
    }
}

/// `getSequenceCode`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceCodeResponse {
    /// Sequence name
    pub name: String,
    /// Sequence description
    pub description: String,
    /// Script body; `null` for built-ins
    pub js_code: Option<String>,
    /// Whether the sequence was authored at runtime
    pub is_custom: bool,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SequenceCodeResponse {
    /// Response for a lookup that failed
    #[must_use]
    pub fn failed(name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            js_code: None,
            is_custom: false,
            error: Some(error.to_string()),
        }
    }
}

/// `previewSequence`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// Whether frames were captured
    pub success: bool,
    /// Sequence name
    pub sequence_name: String,
    /// Number of captured frames
    pub frame_count: usize,
    /// Hex-encoded wire buffers, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<String>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewResponse {
    /// Captured frames
    #[must_use]
    pub fn captured(name: impl Into<String>, frames: Vec<String>) -> Self {
        Self {
            success: true,
            sequence_name: name.into(),
            frame_count: frames.len(),
            frames,
            error: None,
        }
    }

    /// Failed preview
    #[must_use]
    pub fn failure(name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            sequence_name: name.into(),
            frame_count: 0,
            frames: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Reply to an undecodable request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Failure message
    pub error: String,
}

/// Any response body
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// `getSequences`
    Sequences(SequencesResponse),
    /// `getStatus`
    Status(StatusResponse),
    /// `runSequences`, `turnOn`, `turnOff`
    Command(CommandStatus),
    /// `createSequence`, `updateSequence`
    Change(SequenceChangeResponse),
    /// `getSequenceCode`
    Code(SequenceCodeResponse),
    /// `previewSequence`
    Preview(PreviewResponse),
    /// Undecodable request
    Error(ErrorResponse),
}

impl Response {
    /// Reply for a request that could not be decoded
    #[must_use]
    pub fn invalid_request(error: &ProtocolError) -> Self {
        Self::Error(ErrorResponse {
            error: format!("invalid request: {error}"),
        })
    }
}
