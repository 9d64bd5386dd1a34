/// Raises an error on a context, recording the call site as a frame.
///
/// The first argument is the context (a `Context` or `&mut Context`), the
/// second the [`Status`](crate::Status). Anything after that is a format
/// string and arguments, as for [`format!()`], and becomes the message when
/// this raise is the root cause.
///
/// The frame holds `file!()`, `line!()` and the name of the enclosing
/// function.
///
/// [`format!()`]: alloc::format
///
/// # Examples
///
/// ```
/// use flow_context::{Context, Status, raise};
///
/// fn load(context: &mut Context, path: &str) -> bool {
///     raise!(context, Status::IoError, "cannot open {path}");
///     false
/// }
///
/// let mut context = Context::try_new().unwrap();
/// load(&mut context, "in.png");
/// raise!(context, Status::ImageDecodingFailed);
///
/// let report = context.error_report(false).to_string();
/// assert!(report.starts_with("I/O error : cannot open in.png\n"));
/// assert_eq!(report.lines().count(), 3);
/// assert!(report.lines().nth(1).unwrap().ends_with("::load"));
/// ```
#[macro_export]
macro_rules! raise {
    ($context:expr, $status:expr $(,)?) => {
        $context.raise(
            $status,
            $crate::Frame::new(
                ::core::option::Option::Some(::core::file!()),
                ::core::option::Option::Some($crate::function_name!()),
                ::core::line!(),
            ),
            ::core::option::Option::None,
        )
    };
    ($context:expr, $status:expr, $($arg:tt)+) => {
        $context.raise(
            $status,
            $crate::Frame::new(
                ::core::option::Option::Some(::core::file!()),
                ::core::option::Option::Some($crate::function_name!()),
                ::core::line!(),
            ),
            ::core::option::Option::Some($crate::__private::format_args!($($arg)+)),
        )
    };
}

/// Appends the call site to the live error's call path.
///
/// Evaluates to `false` if no error is live or the path is full. Use it when
/// passing an error up without raising a new one:
///
/// ```
/// use flow_context::{Context, Status, raise, trace_frame};
///
/// fn inner(context: &mut Context) -> bool {
///     raise!(context, Status::InvalidArgument, "bad width");
///     false
/// }
///
/// fn outer(context: &mut Context) -> bool {
///     if !inner(context) {
///         trace_frame!(context);
///         return false;
///     }
///     true
/// }
///
/// let mut context = Context::try_new().unwrap();
/// assert!(!outer(&mut context));
/// assert_eq!(context.error().unwrap().frames().len(), 2);
/// ```
#[macro_export]
macro_rules! trace_frame {
    ($context:expr $(,)?) => {
        $context.add_to_callstack($crate::Frame::new(
            ::core::option::Option::Some(::core::file!()),
            ::core::option::Option::Some($crate::function_name!()),
            ::core::line!(),
        ))
    };
}

/// [`format_bounded`](crate::format_bounded) with [`format!()`]-style
/// arguments.
///
/// [`format!()`]: alloc::format
///
/// ```
/// use flow_context::format_bounded;
///
/// let mut buf = [0u8; 16];
/// let written = format_bounded!(&mut buf, "{}x{}", 640, 480).unwrap();
/// assert_eq!(&buf[..written], b"640x480");
/// ```
#[macro_export]
macro_rules! format_bounded {
    ($buffer:expr, $($arg:tt)+) => {
        $crate::format_bounded($buffer, $crate::__private::format_args!($($arg)+))
    };
}

/// Expands to the path of the enclosing function as a `&'static str`.
///
/// Closures report the function they are defined in.
///
/// ```
/// fn decode() -> &'static str {
///     flow_context::function_name!()
/// }
///
/// assert!(decode().ends_with("::decode"));
/// ```
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __f() {}
        $crate::location::strip_function_suffix($crate::__private::type_name_of_val(&__f))
    }};
}
