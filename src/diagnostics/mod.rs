//! The per-context error channel.
//!
//! A context holds at most one live error. The first [`raise`] after the
//! channel was clear becomes the root cause and fixes the [`Status`] and
//! message; every later raise only extends the call path, much like an
//! exception unwinding through its callers:
//!
//! ```
//! use flow_context::{Context, Frame, Status};
//!
//! let mut context = Context::try_new().unwrap();
//! context.raise(
//!     Status::InvalidArgument,
//!     Frame::new(Some("src/scale.rs"), Some("scale"), 10),
//!     Some(format_args!("width was {}", 0)),
//! );
//! context.raise(
//!     Status::IoError,
//!     Frame::new(Some("src/job.rs"), Some("run"), 42),
//!     Some(format_args!("ignored")),
//! );
//!
//! assert_eq!(
//!     context.error_report(false).to_string(),
//!     "Invalid argument : width was 0\n\
//!      scale.rs:10: in function scale\n\
//!      job.rs:42: in function run\n"
//! );
//! ```
//!
//! [`raise`]: crate::Context::raise

mod frame;
mod report;

use alloc::{collections::TryReserveError, string::String, vec::Vec};
use core::{fmt, mem};

pub use self::{frame::Frame, report::ErrorReport};
use crate::{config::ContextConfig, format::write_limited, status::Status};

/// The state of a context's error channel.
#[derive(Debug, Default)]
pub enum ErrorState {
    /// No error is live.
    #[default]
    Clear,
    /// An error has been raised and not yet cleared.
    Raised(RaisedError),
}

impl ErrorState {
    /// Returns the live error, if any.
    #[inline]
    pub fn raised(&self) -> Option<&RaisedError> {
        match self {
            Self::Clear => None,
            Self::Raised(error) => Some(error),
        }
    }

    /// Returns the stored status, [`Status::NoError`] when clear.
    #[inline]
    pub fn status(&self) -> Status {
        self.raised().map_or(Status::NoError, |error| error.status)
    }
}

/// A live error: its root cause and the path it travelled.
#[derive(Debug)]
pub struct RaisedError {
    status: Status,
    message: Option<String>,
    frames: Vec<Frame>,
}

impl RaisedError {
    /// The status set by the root cause.
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// The message set by the root cause, if it had one.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The recorded call path, oldest frame first.
    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// Storage behind [`ErrorState`], with the limits from [`ContextConfig`].
///
/// Frame and message buffers are reserved once and recycled across
/// [`clear`](Diagnostics::clear), so raising within the limits does not touch
/// the allocator.
#[derive(Debug)]
pub(crate) struct Diagnostics {
    state: ErrorState,
    spare_frames: Vec<Frame>,
    spare_message: String,
    max_frames: usize,
    max_message_len: usize,
}

impl Diagnostics {
    pub(crate) fn try_new(config: &ContextConfig) -> Result<Self, TryReserveError> {
        let mut spare_frames = Vec::new();
        spare_frames.try_reserve_exact(config.max_frames)?;
        let mut spare_message = String::new();
        spare_message.try_reserve_exact(config.max_message_len)?;
        Ok(Self {
            state: ErrorState::Clear,
            spare_frames,
            spare_message,
            max_frames: config.max_frames,
            max_message_len: config.max_message_len,
        })
    }

    #[inline]
    pub(crate) fn state(&self) -> &ErrorState {
        &self.state
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        matches!(self.state, ErrorState::Raised(_))
    }

    pub(crate) fn raise(&mut self, status: Status, frame: Frame, message: Option<fmt::Arguments<'_>>) {
        if let ErrorState::Clear = self.state {
            // A raise must leave the channel set.
            let status = if status.is_error() {
                status
            } else {
                Status::Other
            };
            let message = message.map(|args| {
                let mut text = mem::take(&mut self.spare_message);
                if write_limited(&mut text, self.max_message_len, args) {
                    tracing::trace!(
                        max_message_len = self.max_message_len,
                        "error message truncated"
                    );
                }
                text
            });
            tracing::debug!(
                status = status.name(),
                code = status.code(),
                message = message.as_deref().unwrap_or_default(),
                "error raised"
            );
            self.state = ErrorState::Raised(RaisedError {
                status,
                message,
                frames: mem::take(&mut self.spare_frames),
            });
        }
        self.push_frame(frame);
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) -> bool {
        let ErrorState::Raised(error) = &mut self.state else {
            return false;
        };
        if error.frames.len() >= self.max_frames {
            tracing::trace!(
                line = frame.line,
                max_frames = self.max_frames,
                "call-path frame dropped"
            );
            return false;
        }
        error.frames.push(frame);
        true
    }

    pub(crate) fn clear(&mut self) {
        if let ErrorState::Raised(RaisedError {
            message, mut frames, ..
        }) = mem::take(&mut self.state)
        {
            frames.clear();
            self.spare_frames = frames;
            if let Some(mut message) = message {
                message.clear();
                self.spare_message = message;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    fn diagnostics(max_frames: usize, max_message_len: usize) -> Diagnostics {
        let config = ContextConfig::new()
            .max_frames(max_frames)
            .max_message_len(max_message_len);
        Diagnostics::try_new(&config).unwrap()
    }

    #[test]
    fn test_first_raise_wins() {
        let mut channel = diagnostics(8, 64);
        assert!(!channel.is_set());

        channel.raise(Status::OutOfMemory, Frame::unknown(1), Some(format_args!("first")));
        channel.raise(Status::IoError, Frame::unknown(2), Some(format_args!("second")));
        channel.raise(Status::InvalidArgument, Frame::unknown(3), None);

        let error = channel.state().raised().unwrap();
        assert_eq!(error.status(), Status::OutOfMemory);
        assert_eq!(error.message(), Some("first"));
        let lines: Vec<u32> = error.frames().iter().map(|frame| frame.line).collect();
        assert_eq!(lines, [1, 2, 3]);
    }

    #[test]
    fn test_frames_beyond_capacity_are_dropped() {
        let mut channel = diagnostics(2, 64);
        channel.raise(Status::Other, Frame::unknown(1), None);
        assert!(channel.push_frame(Frame::unknown(2)));
        assert!(!channel.push_frame(Frame::unknown(3)));
        channel.raise(Status::Other, Frame::unknown(4), None);
        assert_eq!(channel.state().raised().unwrap().frames().len(), 2);
    }

    #[test]
    fn test_push_frame_without_error_is_ignored() {
        let mut channel = diagnostics(2, 64);
        assert!(!channel.push_frame(Frame::unknown(1)));
        assert!(!channel.is_set());
    }

    #[test]
    fn test_message_is_bounded() {
        let mut channel = diagnostics(2, 5);
        channel.raise(
            Status::Other,
            Frame::unknown(1),
            Some(format_args!("{}", "truncate me")),
        );
        assert_eq!(channel.state().raised().unwrap().message(), Some("trunc"));
    }

    #[test]
    fn test_raising_no_error_still_sets_channel() {
        let mut channel = diagnostics(2, 8);
        channel.raise(Status::NoError, Frame::unknown(1), None);
        assert!(channel.is_set());
        assert_eq!(channel.state().status(), Status::Other);
    }

    #[test]
    fn test_clear_recycles_storage() {
        let mut channel = diagnostics(4, 32);
        channel.raise(Status::Other, Frame::unknown(1), Some(format_args!("boom")));
        channel.clear();
        assert!(!channel.is_set());
        assert_eq!(channel.state().status(), Status::NoError);
        assert!(channel.spare_frames.capacity() >= 4);
        assert!(channel.spare_message.capacity() >= 32);

        channel.raise(Status::IoError, Frame::unknown(7), Some(format_args!("again")));
        let error = channel.state().raised().unwrap();
        assert_eq!(error.status(), Status::IoError);
        assert_eq!(error.message().unwrap().to_string(), "again");
        assert_eq!(error.frames().len(), 1);
    }
}
