#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`flow-context`].
//!
//! # Overview
//!
//! This crate contains the raw heap blocks that back every allocation issued
//! through a `flow_context::Context`. It is the only place in the workspace
//! that talks to the global allocator directly, so every `unsafe` operation
//! lives here behind a small safe API.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`flow-context`] crate, not this one.
//!
//! # Architecture
//!
//! - **[`block`]**: Owned heap storage
//!   - [`RawBlock`]: A zero-initialised, fixed-alignment block that remembers
//!     the [`Layout`] it was allocated with
//!   - [`BlockError`]: Why a block could not be reserved or resized
//!
//! # Safety Strategy
//!
//! The pointer and layout of a [`RawBlock`] are module-private and only ever
//! set together, from the result of a successful call into the global
//! allocator. That keeps the invariant "`ptr` was returned by the allocator
//! for exactly `layout`" locally verifiable inside [`block::raw`], which is
//! what deallocation and reallocation rely on.
//!
//! [`flow-context`]: https://docs.rs/flow-context/latest/flow_context/
//! [`Layout`]: core::alloc::Layout

extern crate alloc;

pub mod block;

pub use block::{BLOCK_ALIGN, BlockError, RawBlock};
