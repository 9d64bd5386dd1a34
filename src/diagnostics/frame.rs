use alloc::borrow::Cow;
use core::fmt;

use crate::location::{SourceLocation, abbreviate_path};

/// Placeholder rendered for a missing file or function name.
const UNKNOWN: &str = "(unknown)";

/// One step of the call path an error propagated through.
///
/// Frames are appended by every [`raise`](crate::Context::raise) and
/// [`add_to_callstack`](crate::Context::add_to_callstack) call. Either name
/// may be absent, in which case it renders as `(unknown)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    /// The source file, if known.
    pub file: Option<Cow<'static, str>>,
    /// The function name, if known.
    pub function: Option<Cow<'static, str>>,
    /// The line number.
    pub line: u32,
}

impl Frame {
    /// Creates a frame from static names, which is what `file!()` and
    /// [`function_name!`](crate::function_name) produce.
    #[inline]
    pub const fn new(file: Option<&'static str>, function: Option<&'static str>, line: u32) -> Self {
        Self {
            file: match file {
                Some(file) => Some(Cow::Borrowed(file)),
                None => None,
            },
            function: match function {
                Some(function) => Some(Cow::Borrowed(function)),
                None => None,
            },
            line,
        }
    }

    /// Creates a frame with neither file nor function.
    #[inline]
    pub const fn unknown(line: u32) -> Self {
        Self::new(None, None, line)
    }

    /// Creates a frame pointing at `location` inside `function`.
    pub fn at(location: &SourceLocation, function: Option<&'static str>) -> Self {
        Self {
            file: Some(location.file.clone()),
            function: function.map(Cow::Borrowed),
            line: location.line,
        }
    }

    /// Returns a [`Display`](fmt::Display) adapter rendering this frame as
    /// `<file>:<line>: in function <function>`.
    ///
    /// Unless `full_paths` is set the file is abbreviated to its last path
    /// component.
    #[inline]
    pub fn display(&self, full_paths: bool) -> impl fmt::Display + '_ {
        FrameDisplay {
            frame: self,
            full_paths,
        }
    }
}

struct FrameDisplay<'a> {
    frame: &'a Frame,
    full_paths: bool,
}

impl fmt::Display for FrameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = match &self.frame.file {
            Some(file) if self.full_paths => &**file,
            Some(file) => abbreviate_path(file),
            None => UNKNOWN,
        };
        let function = self.frame.function.as_deref().unwrap_or(UNKNOWN);
        write!(f, "{file}:{}: in function {function}", self.frame.line)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_unknown_frame() {
        assert_eq!(
            Frame::unknown(25).display(false).to_string(),
            "(unknown):25: in function (unknown)"
        );
    }

    #[test]
    fn test_path_abbreviation() {
        let frame = Frame::new(Some("src/codecs/png.rs"), Some("decode"), 9);
        assert_eq!(frame.display(false).to_string(), "png.rs:9: in function decode");
        assert_eq!(
            frame.display(true).to_string(),
            "src/codecs/png.rs:9: in function decode"
        );
    }

    #[test]
    fn test_frame_at_location() {
        let location = SourceLocation::new("a/b.rs", 4, 1);
        let frame = Frame::at(&location, None);
        assert_eq!(frame.display(true).to_string(), "a/b.rs:4: in function (unknown)");
    }
}
