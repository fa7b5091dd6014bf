//! Command dispatch
//!
//! Maps a decoded [`Request`] onto the [`Controller`] and shapes the reply.
//! Failures never escape: each becomes an `error` field in the response for
//! this one request.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{
    CommandKind, CommandStatus, PreviewResponse, Request, Response, SequenceChangeResponse,
    SequenceCodeResponse, SequencesResponse,
};
use crate::controller::{ControlError, Controller};
use crate::sequence::StopFlag;

/// Execute `request` against `controller`
///
/// Commands that take the reconfiguration lock or touch storage run on the
/// blocking pool. Previews are also abandoned, with their stop flag raised,
/// once `preview_timeout` elapses.
pub async fn dispatch(
    controller: &Arc<Controller>,
    request: Request,
    preview_timeout: Duration,
) -> Response {
    debug!(cmd = ?request.cmd, "Dispatching command");
    match request.cmd {
        CommandKind::GetSequences => Response::Sequences(SequencesResponse {
            sequences: controller.sequences(),
        }),

        CommandKind::GetStatus => Response::Status(controller.status().into()),

        CommandKind::RunSequences => match request.names {
            Some(names) => {
                match blocking(controller, move |c| c.run_sequences(&names)).await {
                    Ok(_) => Response::Command(CommandStatus::new("running")),
                    Err(_) => Response::Command(CommandStatus::new("not running")),
                }
            }
            None => Response::Command(CommandStatus::new("not running")),
        },

        CommandKind::TurnOn => match blocking(controller, Controller::turn_on).await {
            Ok(_) => Response::Command(CommandStatus::new("on")),
            Err(_) => Response::Command(CommandStatus::new("error")),
        },

        CommandKind::TurnOff => match blocking(controller, Controller::turn_off).await {
            Ok(()) => Response::Command(CommandStatus::new("off")),
            Err(_) => Response::Command(CommandStatus::new("error")),
        },

        CommandKind::CreateSequence => {
            let (Some(name), Some(description), Some(code)) = (
                request.sequence_name,
                request.sequence_description,
                request.js_code,
            ) else {
                return Response::Change(SequenceChangeResponse::failed(
                    ControlError::MissingFields("sequenceName, sequenceDescription, or jsCode"),
                ));
            };
            let result = {
                let name = name.clone();
                blocking(controller, move |c| c.create_sequence(&name, &description, &code)).await
            };
            match result.and_then(|created| created) {
                Ok(_) => Response::Change(SequenceChangeResponse::done("created", name)),
                Err(e) => Response::Change(SequenceChangeResponse::failed(e)),
            }
        }

        CommandKind::UpdateSequence => {
            let (Some(name), Some(code)) = (request.sequence_name, request.js_code) else {
                return Response::Change(SequenceChangeResponse::failed(
                    ControlError::MissingFields("sequenceName or jsCode"),
                ));
            };
            let description = request.sequence_description;
            let result = {
                let name = name.clone();
                blocking(controller, move |c| {
                    c.update_sequence(&name, description.as_deref(), &code)
                })
                .await
            };
            match result.and_then(|updated| updated) {
                Ok(_) => Response::Change(SequenceChangeResponse::done("updated", name)),
                Err(e) => Response::Change(SequenceChangeResponse::failed(e)),
            }
        }

        CommandKind::GetSequenceCode => {
            let Some(name) = request.sequence_name else {
                return Response::Code(SequenceCodeResponse::failed(
                    "",
                    ControlError::MissingFields("sequenceName"),
                ));
            };
            match controller.sequence_code(&name) {
                Ok(code) => Response::Code(SequenceCodeResponse {
                    name: code.info.name,
                    description: code.info.description,
                    js_code: code.code,
                    is_custom: code.is_custom,
                    error: None,
                }),
                Err(e) => Response::Code(SequenceCodeResponse::failed(name, e)),
            }
        }

        CommandKind::PreviewSequence => {
            let Some(name) = request.sequence_name else {
                return Response::Preview(PreviewResponse::failure(
                    "",
                    ControlError::MissingFields("sequenceName"),
                ));
            };
            Response::Preview(preview(controller, name, request.max_frames, preview_timeout).await)
        }
    }
}

/// Run `command` on the blocking pool
///
/// The reconfiguration lock and the store's file I/O must never stall a
/// runtime worker.
async fn blocking<T, F>(controller: &Arc<Controller>, command: F) -> Result<T, ControlError>
where
    F: FnOnce(&Controller) -> T + Send + 'static,
    T: Send + 'static,
{
    let controller = Arc::clone(controller);
    tokio::task::spawn_blocking(move || command(&controller))
        .await
        .map_err(|join_error| {
            warn!(error = %join_error, "Command task failed");
            ControlError::TaskFailed
        })
}

async fn preview(
    controller: &Arc<Controller>,
    name: String,
    max_frames: Option<usize>,
    timeout: Duration,
) -> PreviewResponse {
    let stop = StopFlag::new();
    let task = {
        let controller = Arc::clone(controller);
        let name = name.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || controller.preview(&name, max_frames, stop))
    };

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(frames))) => PreviewResponse::captured(name, frames),
        Ok(Ok(Err(e))) => PreviewResponse::failure(name, e),
        Ok(Err(join_error)) => {
            warn!(sequence = %name, error = %join_error, "Preview task failed");
            PreviewResponse::failure(name, "Preview task failed")
        }
        Err(_) => {
            stop.request();
            warn!(sequence = %name, timeout_ms = timeout.as_millis() as u64, "Preview timed out");
            PreviewResponse::failure(name, "Preview timed out")
        }
    }
}
