//! Source code locations recorded for allocations and call-path frames.

use alloc::borrow::Cow;
use core::fmt;

/// The place in the source where an allocation was requested.
///
/// Usually captured automatically with [`SourceLocation::caller`] through a
/// `#[track_caller]` entry point, but collaborators that forward requests from
/// elsewhere (bindings, generated code) can build one by hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// The source file path.
    pub file: Cow<'static, str>,
    /// The 1-based line number.
    pub line: u32,
    /// The 1-based column number, or `0` when unknown.
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location from its parts.
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Captures the location of the caller.
    ///
    /// Inside a `#[track_caller]` function this is the location of *its*
    /// caller.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        let location = core::panic::Location::caller();
        Self {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl From<&'static core::panic::Location<'static>> for SourceLocation {
    fn from(location: &'static core::panic::Location<'static>) -> Self {
        Self {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Shortens `path` to its final component.
///
/// Both `/` and `\` are treated as separators so paths captured on any host
/// abbreviate the same way.
///
/// ```
/// use flow_context::location::abbreviate_path;
///
/// assert_eq!(abbreviate_path("src/codecs/png.rs"), "png.rs");
/// assert_eq!(abbreviate_path(r"C:\build\context.c"), "context.c");
/// assert_eq!(abbreviate_path("main.rs"), "main.rs");
/// ```
pub fn abbreviate_path(path: &str) -> &str {
    match path.rfind(|c: char| c == '/' || c == '\\') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Trims the helper suffix produced by [`function_name!`](crate::function_name).
#[doc(hidden)]
pub fn strip_function_suffix(name: &'static str) -> &'static str {
    let mut name = name.strip_suffix("::__f").unwrap_or(name);
    // Closures show up as `outer::{{closure}}`; keep the enclosing function.
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    name
}
