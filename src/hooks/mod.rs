//! Process-global hooks.
//!
//! - **[`report_sink`]**: where [`Context::print_if_error`] sends the rendered
//!   error report (stderr by default with the `std` feature, a
//!   `tracing` event otherwise).
//!
//! [`Context::print_if_error`]: crate::Context::print_if_error

pub mod report_sink;

mod hook_lock;
