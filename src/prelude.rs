//! Commonly used items for convenient importing.
//!
//! ```rust
//! use flow_context::prelude::*;
//!
//! fn scale(context: &mut Context, width: u32) -> Option<Address> {
//!     if width == 0 {
//!         raise!(context, Status::InvalidArgument, "width must be positive");
//!         return None;
//!     }
//!     context.allocate(width as usize * 4, None, Owner::Context).ok()
//! }
//!
//! let mut context = Context::try_new().unwrap();
//! assert!(scale(&mut context, 0).is_none());
//! assert_eq!(context.error_code(), Status::InvalidArgument.code());
//! ```
//!
//! # What's Included
//!
//! - **[`Context`]**, **[`Owner`]**, **[`Address`]** and **[`Destructor`]**
//!   for allocating and tearing down memory
//! - **[`Status`]** and **[`Frame`]** for the error channel
//! - **[`raise!`]**, **[`trace_frame!`]** and **[`format_bounded!`]**

pub use crate::{
    Address, Context, Destructor, Frame, Owner, Status, format_bounded, raise, trace_frame,
};
