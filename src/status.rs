//! The status taxonomy stored by the diagnostics channel.

use core::fmt;

/// First code available to collaborators for their own conditions.
pub const FIRST_USER_DEFINED_CODE: i32 = 1025;

/// What went wrong, as recorded on a [`Context`](crate::Context).
///
/// Every status has a stable numeric [code](Status::code) and a fixed
/// [display name](Status::name) used as the first line of a rendered report.
/// [`Status::NoError`] is the default and means the channel is clear.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No error condition.
    #[default]
    NoError,
    /// An allocation could not be satisfied.
    OutOfMemory,
    /// An I/O operation failed.
    IoError,
    /// An internal assertion failed.
    InvalidInternalState,
    /// The requested feature is not implemented.
    NotImplemented,
    /// An argument was outside its valid domain.
    InvalidArgument,
    /// A required argument was absent.
    NullArgument,
    /// Image dimensions were invalid.
    InvalidDimensions,
    /// The pixel format is not supported.
    UnsupportedPixelFormat,
    /// A referenced item does not exist.
    ItemDoesNotExist,
    /// Image decoding failed.
    ImageDecodingFailed,
    /// Image encoding failed.
    ImageEncodingFailed,
    /// The operation graph is invalid.
    GraphInvalid,
    /// The operation graph contains a cycle.
    GraphIsCyclic,
    /// A graph node received invalid inputs.
    InvalidInputsToNode,
    /// Graph execution needed more passes than allowed.
    MaximumGraphPassesExceeded,
    /// A registered destructor reported failure during teardown.
    DestructorFailed,
    /// Anything not covered by a more specific status.
    Other,
    /// A collaborator-defined condition, built with
    /// [`Status::user_defined`].
    UserDefined(UserCode),
}

/// A collaborator-defined status code, always at least
/// [`FIRST_USER_DEFINED_CODE`].
///
/// Codes below that bound belong to the fixed statuses, `0` included, so
/// they cannot be wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserCode(i32);

impl UserCode {
    /// Wraps `code`, or returns `None` if it is below
    /// [`FIRST_USER_DEFINED_CODE`].
    #[inline]
    pub const fn new(code: i32) -> Option<Self> {
        if code >= FIRST_USER_DEFINED_CODE {
            Some(Self(code))
        } else {
            None
        }
    }

    /// The wrapped code.
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl Status {
    /// Builds a collaborator-defined status.
    ///
    /// Returns `None` for codes below [`FIRST_USER_DEFINED_CODE`].
    ///
    /// ```
    /// use flow_context::Status;
    ///
    /// let status = Status::user_defined(2000).unwrap();
    /// assert_eq!(status.code(), 2000);
    /// assert_eq!(Status::user_defined(0), None);
    /// ```
    #[inline]
    pub const fn user_defined(code: i32) -> Option<Self> {
        match UserCode::new(code) {
            Some(code) => Some(Self::UserDefined(code)),
            None => None,
        }
    }

    /// Returns the numeric code of this status.
    pub const fn code(self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::OutOfMemory => 10,
            Self::IoError => 20,
            Self::InvalidInternalState => 30,
            Self::NotImplemented => 40,
            Self::InvalidArgument => 50,
            Self::NullArgument => 51,
            Self::InvalidDimensions => 52,
            Self::UnsupportedPixelFormat => 53,
            Self::ItemDoesNotExist => 54,
            Self::ImageDecodingFailed => 60,
            Self::ImageEncodingFailed => 61,
            Self::GraphInvalid => 70,
            Self::GraphIsCyclic => 71,
            Self::InvalidInputsToNode => 72,
            Self::MaximumGraphPassesExceeded => 73,
            Self::DestructorFailed => 90,
            Self::Other => 1024,
            Self::UserDefined(code) => code.get(),
        }
    }

    /// Maps a numeric code back to its status.
    ///
    /// Returns `None` for codes below [`FIRST_USER_DEFINED_CODE`] that are not
    /// assigned to any status.
    ///
    /// ```
    /// use flow_context::Status;
    ///
    /// assert_eq!(Status::from_code(50), Some(Status::InvalidArgument));
    /// assert_eq!(Status::from_code(2000), Status::user_defined(2000));
    /// assert_eq!(Status::from_code(11), None);
    /// ```
    pub const fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            0 => Self::NoError,
            10 => Self::OutOfMemory,
            20 => Self::IoError,
            30 => Self::InvalidInternalState,
            40 => Self::NotImplemented,
            50 => Self::InvalidArgument,
            51 => Self::NullArgument,
            52 => Self::InvalidDimensions,
            53 => Self::UnsupportedPixelFormat,
            54 => Self::ItemDoesNotExist,
            60 => Self::ImageDecodingFailed,
            61 => Self::ImageEncodingFailed,
            70 => Self::GraphInvalid,
            71 => Self::GraphIsCyclic,
            72 => Self::InvalidInputsToNode,
            73 => Self::MaximumGraphPassesExceeded,
            90 => Self::DestructorFailed,
            1024 => Self::Other,
            FIRST_USER_DEFINED_CODE.. => Self::UserDefined(UserCode(code)),
            _ => return None,
        };
        Some(status)
    }

    /// Returns the human-readable name rendered at the top of a report.
    ///
    /// Teardown failures share the `"Other error:"` name with
    /// [`Status::Other`]; downstream log scrapers match on that text.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "No error",
            Self::OutOfMemory => "Out Of Memory",
            Self::IoError => "I/O error",
            Self::InvalidInternalState => "Invalid internal state",
            Self::NotImplemented => "Not implemented",
            Self::InvalidArgument => "Invalid argument",
            Self::NullArgument => "Null argument",
            Self::InvalidDimensions => "Invalid dimensions",
            Self::UnsupportedPixelFormat => "Unsupported pixel format",
            Self::ItemDoesNotExist => "Item does not exist",
            Self::ImageDecodingFailed => "Image decoding failed",
            Self::ImageEncodingFailed => "Image encoding failed",
            Self::GraphInvalid => "Graph invalid",
            Self::GraphIsCyclic => "Graph is cyclic",
            Self::InvalidInputsToNode => "Invalid inputs to node",
            Self::MaximumGraphPassesExceeded => "Maximum graph passes exceeded",
            Self::DestructorFailed | Self::Other => "Other error:",
            Self::UserDefined(_) => "User defined error",
        }
    }

    /// Returns `true` for every status except [`Status::NoError`].
    #[inline]
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::NoError)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
