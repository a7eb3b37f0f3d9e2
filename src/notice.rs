//! Transient UI notices (toasts).
//!
//! Components push [`UiEvent`]s into an unbounded channel; the renderer owns
//! the receiver. Notices are fire-and-forget: a closed receiver just means
//! nobody is rendering anymore.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Welcome,
    Loading,
    Success,
    Error,
}

/// Where the renderer anchors a notice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticePosition {
    #[default]
    TopRight,
    TopCenter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Stable id so a later event can replace or dismiss this notice.
    pub id: Option<String>,
    pub kind: NoticeKind,
    pub position: NoticePosition,
    pub title: String,
    pub body: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl Notice {
    #[must_use]
    pub fn new(kind: NoticeKind, title: impl Into<String>, duration: Duration) -> Self {
        Self { id: None, kind, position: NoticePosition::default(), title: title.into(), body: None, duration }
    }

    #[must_use]
    pub fn with_position(mut self, position: NoticePosition) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum UiEvent {
    Show(Notice),
    Dismiss { id: String },
}

/// Sender half handed to every component that emits notices.
#[derive(Debug, Clone)]
pub struct NoticeSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl NoticeSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn show(&self, notice: Notice) {
        self.emit(UiEvent::Show(notice));
    }

    pub fn dismiss(&self, id: impl Into<String>) {
        self.emit(UiEvent::Dismiss { id: id.into() });
    }

    fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("notice receiver closed; dropping ui event");
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[path = "notice_test.rs"]
mod tests;
