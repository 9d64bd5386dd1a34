use core::fmt;

use super::ErrorState;

/// A [`Display`](fmt::Display) view of a context's error channel.
///
/// The rendering is the status name, then ` : <message>` if the root cause
/// carried a message, then a newline, then one line per call-path frame:
///
/// ```text
/// Invalid argument : width was 0
/// scale.rs:10: in function scale
/// ```
///
/// A clear channel renders as `No error`. Obtain one with
/// [`Context::error_report`](crate::Context::error_report).
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport<'a> {
    state: &'a ErrorState,
    full_paths: bool,
}

impl<'a> ErrorReport<'a> {
    pub(crate) fn new(state: &'a ErrorState, full_paths: bool) -> Self {
        Self { state, full_paths }
    }

    /// The channel state being rendered.
    #[inline]
    pub fn state(&self) -> &'a ErrorState {
        self.state
    }
}

impl fmt::Display for ErrorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(error) = self.state.raised() else {
            return writeln!(f, "{}", crate::Status::NoError);
        };
        f.write_str(error.status.name())?;
        if let Some(message) = &error.message {
            write!(f, " : {message}")?;
        }
        f.write_str("\n")?;
        for frame in &error.frames {
            writeln!(f, "{}", frame.display(self.full_paths))?;
        }
        Ok(())
    }
}
