//! Per-context limits.

/// Default number of call-path frames kept per error.
pub const DEFAULT_MAX_FRAMES: usize = 64;

/// Default maximum length in bytes of an error message.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 2048;

/// Limits applied by a [`Context`](crate::Context).
///
/// Both limits are reserved up front when the context is created, so raising
/// an error within them does not allocate.
///
/// ```
/// use flow_context::{Context, ContextConfig};
///
/// let config = ContextConfig::new().max_frames(8).max_message_len(256);
/// let context = Context::try_with_config(config).unwrap();
/// assert_eq!(context.config().max_frames, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Call-path frames kept per error. Further frames are dropped.
    pub max_frames: usize,
    /// Bytes of message kept per error. Longer messages are truncated on a
    /// character boundary.
    pub max_message_len: usize,
}

impl ContextConfig {
    /// The default limits.
    pub const DEFAULT: Self = Self {
        max_frames: DEFAULT_MAX_FRAMES,
        max_message_len: DEFAULT_MAX_MESSAGE_LEN,
    };

    /// Returns the default limits.
    #[inline]
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Sets the number of call-path frames kept per error.
    #[inline]
    #[must_use]
    pub const fn max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Sets the maximum message length in bytes.
    #[inline]
    #[must_use]
    pub const fn max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    /// Reads the limits from the environment, falling back to the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `FLOW_CONTEXT_MAX_FRAMES` - Call-path frames kept per error
    /// - `FLOW_CONTEXT_MAX_MESSAGE_LEN` - Bytes of message kept per error
    ///
    /// Values that do not parse as an unsigned integer are ignored. The
    /// environment is read once per process.
    #[cfg(feature = "std")]
    pub fn from_env() -> Self {
        use std::sync::OnceLock;

        static FROM_ENV: OnceLock<ContextConfig> = OnceLock::new();

        *FROM_ENV.get_or_init(|| {
            fn read(name: &str) -> Option<usize> {
                std::env::var(name).ok()?.trim().parse().ok()
            }

            let mut config = ContextConfig::DEFAULT;
            if let Some(max_frames) = read("FLOW_CONTEXT_MAX_FRAMES") {
                config.max_frames = max_frames;
            }
            if let Some(max_message_len) = read("FLOW_CONTEXT_MAX_MESSAGE_LEN") {
                config.max_message_len = max_message_len;
            }
            tracing::debug!(
                max_frames = config.max_frames,
                max_message_len = config.max_message_len,
                "context limits read from environment"
            );
            config
        })
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
