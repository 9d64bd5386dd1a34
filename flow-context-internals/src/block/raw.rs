//! Owned heap block.
//!
//! This module encapsulates the `ptr` and `layout` fields of [`RawBlock`],
//! ensuring they are only visible within this module. This visibility
//! restriction guarantees the safety invariant: **`ptr` was returned by the
//! global allocator for exactly `layout`, and the first `len` bytes are
//! initialised**.
//!
//! # Safety Invariant
//!
//! The fields can only be set by [`RawBlock::try_new`] (from `alloc_zeroed`)
//! and by [`RawBlock::try_resize`] (from `realloc`, after which the grown tail
//! is zeroed). Neither path publishes a pointer/layout pair unless the
//! allocator call succeeded, so the [`Drop`] implementation can always hand
//! the pair back to `dealloc`.

use alloc::alloc::{alloc_zeroed, dealloc, realloc};
use core::{alloc::Layout, ptr::NonNull};

use crate::block::{BLOCK_ALIGN, BlockError};

/// A zero-initialised heap block of `len` bytes.
///
/// Zero-sized requests still reserve one byte so that every live block has a
/// distinct, stable address.
pub struct RawBlock {
    /// Pointer to the start of the block
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was returned by the global allocator for `layout`.
    /// 2. The first `len` bytes behind the pointer are initialised.
    /// 3. The pointer is not freed before the `Drop` implementation runs.
    ptr: NonNull<u8>,

    /// The layout the block is currently allocated with
    layout: Layout,

    /// The number of bytes requested by the owner, at most `layout.size()`
    len: usize,
}

impl RawBlock {
    /// Reserves a new zero-initialised block of `size` bytes.
    pub fn try_new(size: usize) -> Result<Self, BlockError> {
        let layout = layout_for(size)?;

        // SAFETY: `layout_for` never produces a zero-sized layout
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(BlockError::Exhausted { size })?;

        Ok(Self {
            ptr,
            layout,
            len: size,
        })
    }

    /// Returns the number of usable bytes in the block.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the block was requested with a size of zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the start of the block.
    #[inline]
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the block contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY:
        // 1. The pointer is valid for reads of `len` bytes, since `len <=
        //    layout.size()` and the allocation is live (invariants 1 and 3).
        // 2. Those bytes are initialised (invariant 2).
        // 3. The shared borrow of `self` prevents mutation for the returned
        //    lifetime.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the block contents mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: Same as `as_slice`, and the exclusive borrow of `self`
        // guarantees no other reference to the bytes exists.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Resizes the block to `new_size` bytes, preserving the common prefix and
    /// zeroing any newly exposed bytes.
    ///
    /// The block may move. On failure the block is left exactly as it was.
    pub fn try_resize(&mut self, new_size: usize) -> Result<(), BlockError> {
        let new_layout = layout_for(new_size)?;

        // SAFETY:
        // 1. `self.ptr` was allocated by the global allocator with `self.layout`
        //    (invariant 1).
        // 2. `new_layout.size()` is non-zero and, rounded up to `BLOCK_ALIGN`,
        //    does not overflow `isize`, which `Layout::from_size_align` checked.
        let new_ptr = unsafe { realloc(self.ptr.as_ptr(), self.layout, new_layout.size()) };
        let new_ptr = NonNull::new(new_ptr).ok_or(BlockError::Exhausted { size: new_size })?;

        if new_size > self.len {
            // SAFETY: The allocation behind `new_ptr` spans at least `new_size`
            // bytes, so offsetting by `self.len < new_size` stays in bounds.
            let tail = unsafe { new_ptr.as_ptr().add(self.len) };
            // SAFETY: `[self.len, new_size)` lies inside the live allocation
            // and nothing else references it yet.
            unsafe {
                tail.write_bytes(0, new_size - self.len);
            }
        }

        self.ptr = new_ptr;
        self.layout = new_layout;
        self.len = new_size;
        Ok(())
    }
}

impl core::ops::Drop for RawBlock {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: The pointer was returned by the global allocator for
        // `self.layout` and has not been freed (invariants 1 and 3). We are in
        // the drop function so it is never used again.
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

impl core::fmt::Debug for RawBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawBlock")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Computes the layout used to back a request of `size` bytes.
fn layout_for(size: usize) -> Result<Layout, BlockError> {
    Layout::from_size_align(size.max(1), BLOCK_ALIGN)
        .map_err(|_| BlockError::LayoutOverflow { size })
}
