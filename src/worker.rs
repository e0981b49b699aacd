//! Background GIF encoding.
//!
//! The message types mirror the `{ type, data }` envelope used by the UI's
//! worker boundary. [`handle_request`] runs the encode in-process and emits
//! messages to a sink; [`GifWorker`] runs the same routine on its own thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::gif::encode_animated_with;
use crate::settings::Settings;
use crate::text::FontBook;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkerRequest {
    #[serde(rename = "generateGIF")]
    GenerateGif { settings: Box<Settings> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WorkerMessage {
    Progress {
        message: String,
        /// 0-100.
        progress: u8,
    },
    Complete {
        gif: Vec<u8>,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Error {
        message: String,
    },
}

impl WorkerMessage {
    /// True for `complete` and `error`, after which no further messages
    /// belong to the same request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Runs `request` to completion, emitting progress and exactly one terminal
/// message.
pub fn handle_request<F>(request: WorkerRequest, fonts: &FontBook, sink: &mut F)
where
    F: FnMut(WorkerMessage),
{
    match request {
        WorkerRequest::GenerateGif { settings } => {
            sink(WorkerMessage::Progress {
                message: "Generating frames".to_string(),
                progress: 0,
            });
            let result = encode_animated_with(&settings, fonts, |p| {
                sink(WorkerMessage::Progress {
                    message: format!("Encoding frame {}/{}", p.frame, p.total),
                    progress: p.percent(),
                });
            });
            let message = match result {
                Ok(gif) => WorkerMessage::Complete {
                    gif,
                    mime_type: "image/gif".to_string(),
                },
                Err(err) => {
                    tracing::warn!(error = %err, "gif generation failed");
                    WorkerMessage::Error {
                        message: err.to_string(),
                    }
                }
            };
            sink(message);
        }
    }
}

// ============================================================================
// GifWorker
// ============================================================================

/// A dedicated encoding thread fed through channels.
///
/// Requests are processed one at a time in submission order.
#[derive(Debug)]
pub struct GifWorker {
    requests: Option<Sender<WorkerRequest>>,
    messages: Receiver<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
}

impl GifWorker {
    pub fn spawn(fonts: FontBook) -> RenderResult<Self> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (message_tx, message_rx) = mpsc::channel::<WorkerMessage>();

        let thread = thread::Builder::new()
            .name("gif-worker".to_string())
            .spawn(move || {
                for request in request_rx {
                    let mut sink = |msg: WorkerMessage| {
                        let _ = message_tx.send(msg);
                    };
                    handle_request(request, &fonts, &mut sink);
                }
                tracing::debug!("gif worker exiting");
            })
            .map_err(|e| RenderError::worker(e.to_string()))?;

        Ok(Self {
            requests: Some(request_tx),
            messages: message_rx,
            thread: Some(thread),
        })
    }

    pub fn send(&self, request: WorkerRequest) -> RenderResult<()> {
        self.requests
            .as_ref()
            .ok_or_else(|| RenderError::worker("worker is shut down"))?
            .send(request)
            .map_err(|_| RenderError::worker("worker thread has exited"))
    }

    /// Blocks for the next message.
    pub fn recv(&self) -> RenderResult<WorkerMessage> {
        self.messages
            .recv()
            .map_err(|_| RenderError::worker("worker thread has exited"))
    }

    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.messages.try_recv().ok()
    }

    /// Blocks until the current request finishes, returning the GIF bytes.
    pub fn wait_for_gif(&self) -> RenderResult<Vec<u8>> {
        loop {
            match self.recv()? {
                WorkerMessage::Progress { .. } => continue,
                WorkerMessage::Complete { gif, .. } => return Ok(gif),
                WorkerMessage::Error { message } => return Err(RenderError::Worker(message)),
            }
        }
    }

    /// Stops accepting requests and joins the thread after it drains.
    pub fn shutdown(mut self) -> RenderResult<()> {
        self.join()
    }

    fn join(&mut self) -> RenderResult<()> {
        self.requests.take();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| RenderError::worker("worker thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for GifWorker {
    fn drop(&mut self) {
        if let Err(err) = self.join() {
            tracing::error!(error = %err, "gif worker did not shut down cleanly");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TextAnimation;
    use crate::settings::CanvasSize;

    fn small_animation(frames: u32) -> Settings {
        Settings {
            animation: TextAnimation::Pulse,
            canvas_size: CanvasSize::Small,
            gif_frames: frames,
            ..Settings::with_text("UP")
        }
    }

    #[test]
    fn envelope_matches_wire_shape() {
        let request: WorkerRequest = serde_json::from_str(
            r#"{ "type": "generateGIF", "data": { "settings": { "text": "UP", "animation": "pulse" } } }"#,
        )
        .unwrap();
        let WorkerRequest::GenerateGif { settings } = request;
        assert_eq!(settings.animation, TextAnimation::Pulse);

        let progress = WorkerMessage::Progress {
            message: "x".into(),
            progress: 40,
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            serde_json::json!({ "type": "progress", "data": { "message": "x", "progress": 40 } })
        );
        let complete = WorkerMessage::Complete {
            gif: vec![1, 2],
            mime_type: "image/gif".into(),
        };
        assert_eq!(
            serde_json::to_value(&complete).unwrap(),
            serde_json::json!({ "type": "complete", "data": { "gif": [1, 2], "mimeType": "image/gif" } })
        );
    }

    #[test]
    fn in_process_request_reports_progress_then_completes() {
        let mut messages = Vec::new();
        let request = WorkerRequest::GenerateGif {
            settings: Box::new(small_animation(3)),
        };
        handle_request(request, &FontBook::empty(), &mut |m| messages.push(m));

        assert_eq!(messages.len(), 5);
        let percents: Vec<u8> = messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::Progress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 33, 66, 100]);
        match messages.last() {
            Some(WorkerMessage::Complete { gif, mime_type }) => {
                assert_eq!(mime_type, "image/gif");
                assert_eq!(&gif[..6], b"GIF89a");
            }
            other => panic!("unexpected terminal message {other:?}"),
        }
        assert!(messages.iter().filter(|m| m.is_terminal()).count() == 1);
    }

    #[test]
    fn background_worker_produces_same_bytes() {
        let settings = small_animation(2);
        let expected = encode_animated_with(&settings, &FontBook::empty(), |_| {}).unwrap();

        let worker = GifWorker::spawn(FontBook::empty()).unwrap();
        worker
            .send(WorkerRequest::GenerateGif {
                settings: Box::new(settings),
            })
            .unwrap();
        assert_eq!(worker.wait_for_gif().unwrap(), expected);
        worker.shutdown().unwrap();
    }
}
