//! The destination of error reports printed by
//! [`Context::print_if_error`](crate::Context::print_if_error).
//!
//! ```
//! use core::fmt;
//!
//! use flow_context::{
//!     Context, Status,
//!     hooks::report_sink::{ReportSinkHook, register_report_sink_hook},
//! };
//!
//! struct Quiet;
//!
//! impl ReportSinkHook for Quiet {
//!     fn emit(&self, _report: &dyn fmt::Display) {}
//! }
//!
//! register_report_sink_hook(Quiet);
//!
//! let mut context = Context::try_new().unwrap();
//! flow_context::raise!(context, Status::IoError, "disk full");
//! assert!(context.print_if_error());
//! ```

use core::fmt;

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::hooks::hook_lock::HookLock;

type Hook = Arc<dyn ReportSinkHook>;

static HOOK: HookLock<Hook> = HookLock::new();

/// Receives rendered error reports.
///
/// Only one sink is active at a time. Reports arrive already rendered, one
/// line per call-path frame, each line ending in a newline.
pub trait ReportSinkHook: 'static + Send + Sync {
    /// Delivers one report.
    fn emit(&self, report: &dyn fmt::Display);
}

/// The sink used when none is registered.
///
/// With the `std` feature it writes to stderr. Without it, the report becomes
/// the message of a `tracing` event at `ERROR` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReportSink;

impl DefaultReportSink {
    /// The default sink, usable in `const` contexts.
    pub const DEFAULT: Self = Self;
}

impl ReportSinkHook for DefaultReportSink {
    fn emit(&self, report: &dyn fmt::Display) {
        #[cfg(feature = "std")]
        std::eprint!("{report}");

        #[cfg(not(feature = "std"))]
        tracing::error!("{report}");
    }
}

pub(crate) fn emit(report: &dyn fmt::Display) {
    let hook = HOOK.get();
    let hook: &dyn ReportSinkHook = match &hook {
        Some(hook) => &**hook,
        None => const { &DefaultReportSink::DEFAULT },
    };
    hook.emit(report);
}

/// Replaces the global report sink.
pub fn register_report_sink_hook(hook: impl ReportSinkHook) {
    HOOK.replace(Some(
        Arc::new(hook).unsize(unsize::Coercion!(to dyn ReportSinkHook)),
    ));
}

/// Restores the [`DefaultReportSink`].
pub fn reset_report_sink_hook() {
    HOOK.replace(None);
}
