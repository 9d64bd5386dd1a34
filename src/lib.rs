#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A per-operation runtime context for native image-processing work.
//!
//! ## Overview
//!
//! A [`Context`] is created for one unit of work and threaded through every
//! call that work makes. It does two jobs:
//!
//! - **It owns memory.** Every block is allocated through the context with an
//!   [`Owner`] (the context itself or another block) and an optional
//!   [`Destructor`]. Destroying a block destroys everything it owns first,
//!   bottom-up, and [`Context::begin_terminate`] tears down whatever is
//!   left. A destructor that fails is reported, never fatal: the rest of the
//!   teardown still runs.
//! - **It records the first failure.** The first error [raised](raise) on a
//!   clear context fixes the [`Status`] and message; every later raise only
//!   adds a [`Frame`] to the call path, the way an exception collects stack
//!   frames on its way up.
//!
//! ## Quick Example
//!
//! ```
//! use flow_context::{Context, Destructor, Owner, Status, raise};
//!
//! let mut context = Context::try_new().unwrap();
//!
//! let image = context.allocate_owned_by_context(640 * 480 * 4).unwrap();
//! let _rows = context
//!     .allocate(480 * 8, Some(Destructor::new(|_, _| false)), Owner::Block(image))
//!     .unwrap();
//!
//! // The rows go first, and their failing destructor is recorded.
//! assert!(!context.destroy_block(image));
//! assert_eq!(context.status(), Status::DestructorFailed);
//!
//! raise!(context, Status::ImageEncodingFailed, "ignored: not the root cause");
//!
//! let mut buf = [0u8; 1024];
//! let written = context.render_error(&mut buf, false).unwrap();
//! let report = core::str::from_utf8(&buf[..written]).unwrap();
//! assert!(report.starts_with("Other error: : Destructor returned false, indicating failure"));
//!
//! assert!(context.begin_terminate());
//! context.destroy();
//! ```
//!
//! ## Bounded formatting
//!
//! Reports are rendered into caller-supplied buffers with
//! [`format_bounded`], an `snprintf`-style primitive that always
//! NUL-terminates and never writes past the end of the slice it is given. See
//! the [`format`] module for the exact contract.
//!
//! ## Features
//!
//! - `std`: the default [report sink](hooks::report_sink) writes to stderr,
//!   hook storage uses `std::sync::RwLock`, and
//!   [`ContextConfig::from_env`] becomes available.
//!
//! Without `std` the crate only needs `alloc`.
//!
//! ## Implementation notes
//!
//! The only unsafe code, the zero-initialised heap block behind each
//! allocation, lives in the [`flow-context-internals`] crate.
//!
//! [`flow-context-internals`]: flow_context_internals

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

pub mod diagnostics;
pub mod format;
pub mod hooks;
pub mod location;
pub mod prelude;

mod config;
mod context;
mod error;
mod registry;
mod status;

pub use self::{
    config::{ContextConfig, DEFAULT_MAX_FRAMES, DEFAULT_MAX_MESSAGE_LEN},
    context::{Context, ContextState},
    diagnostics::{ErrorReport, ErrorState, Frame, RaisedError},
    error::AllocError,
    format::{BoundedWriter, FormatError, format_bounded, result_as_sentinel},
    location::SourceLocation,
    registry::{Address, AllocationInfo, Destructor, MemoryStats, Owner},
    status::{FIRST_USER_DEFINED_CODE, Status, UserCode},
};

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use core::{any::type_name_of_val, format_args};
}
