//! Module containing the raw heap block type.

mod raw;

use core::fmt;

pub use self::raw::RawBlock;

/// Alignment of every block, matching what C `malloc` guarantees on 64-bit
/// targets so that blocks can hold any primitive pixel or header type.
pub const BLOCK_ALIGN: usize = 16;

/// The reason a [`RawBlock`] could not be reserved or resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// The requested size cannot be described by a [`Layout`] with
    /// [`BLOCK_ALIGN`] alignment.
    ///
    /// [`Layout`]: core::alloc::Layout
    LayoutOverflow {
        /// The requested size in bytes
        size: usize,
    },
    /// The global allocator returned a null pointer.
    Exhausted {
        /// The requested size in bytes
        size: usize,
    },
}

impl BlockError {
    /// Returns the size in bytes of the failed request.
    #[inline]
    pub fn requested_size(self) -> usize {
        match self {
            Self::LayoutOverflow { size } | Self::Exhausted { size } => size,
        }
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutOverflow { size } => {
                write!(f, "a block of {size} bytes cannot be laid out")
            }
            Self::Exhausted { size } => write!(f, "the allocator could not supply {size} bytes"),
        }
    }
}

impl core::error::Error for BlockError {}
