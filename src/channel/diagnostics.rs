use std::{collections::VecDeque, time::Duration};

use crate::{consts::MAXIMUM_QUEUED_NOTICES, error::RelayError, peer::PeerID};

pub type ExceptionHandler = Box<dyn FnMut(&RelayError) + Send>;
pub type ReceiveExceptionHandler = Box<dyn FnMut(PeerID, Option<&str>, &[u8]) + Send>;
pub type ErrorHandler = Box<dyn FnMut(&str) + Send>;

/// A short-lived message meant for the local user's screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub duration: Duration,
}

/// Error reporting for a channel.
///
/// Every hook falls back to a log line plus a [`Notice`] when the local peer is interactive.
/// At most [`MAXIMUM_QUEUED_NOTICES`] notices are kept, the oldest go first.
pub(crate) struct Diagnostics {
    owner: String,
    interactive: bool,
    notice_duration: Duration,
    notices: VecDeque<Notice>,

    pub(crate) exception_handler: Option<ExceptionHandler>,
    pub(crate) receive_exception_handler: Option<ReceiveExceptionHandler>,
    pub(crate) error_handler: Option<ErrorHandler>,
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("owner", &self.owner)
            .field("interactive", &self.interactive)
            .field("notices", &self.notices.len())
            .finish()
    }
}

impl Diagnostics {
    pub(crate) fn new(owner: String, interactive: bool, notice_duration: Duration) -> Self {
        Self {
            owner,
            interactive,
            notice_duration,
            notices: VecDeque::with_capacity(MAXIMUM_QUEUED_NOTICES),
            exception_handler: None,
            receive_exception_handler: None,
            error_handler: None,
        }
    }

    pub(crate) fn exception(&mut self, e: &RelayError) {
        match &mut self.exception_handler {
            Some(handler) => handler(e),
            None => {
                tracing::error!("{} ERROR: {e}", self.owner);
                self.notify(&e.to_string());
            }
        }
    }

    pub(crate) fn receive_exception(&mut self, sender: PeerID, name: Option<&str>, raw: &[u8]) {
        match &mut self.receive_exception_handler {
            Some(handler) => handler(sender, name, raw),
            None => {
                let bytes = raw
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                tracing::error!(
                    "{} receive error additional info: sender={} ({sender}); bytes={bytes}",
                    self.owner,
                    name.unwrap_or("<unknown>"),
                );
            }
        }
    }

    pub(crate) fn error(&mut self, text: &str) {
        match &mut self.error_handler {
            Some(handler) => handler(text),
            None => {
                tracing::error!("{} ERROR: {text}", self.owner);
                self.notify(text);
            }
        }
    }

    fn notify(&mut self, text: &str) {
        if !self.interactive {
            return;
        }
        if self.notices.len() >= MAXIMUM_QUEUED_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            text: format!(
                "[ERROR: {}: {text} | Send the log file to the author]",
                self.owner
            ),
            duration: self.notice_duration,
        });
    }

    pub(crate) fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}
