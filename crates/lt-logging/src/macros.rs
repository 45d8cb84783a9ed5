//! ---
//! lt_section: "03-logging"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Context-enriched logging macros."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Logging macros that attach a [`LogContext`](crate::LogContext) to every event.

#[doc(hidden)]
#[macro_export]
macro_rules! __lt_event {
    ($lvl:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        $crate::__tracing::event!(
            $lvl,
            workload = ctx.workload.unwrap_or(""),
            worker = ctx.worker,
            role = ctx.role.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with load tester context.
#[macro_export]
macro_rules! lt_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with load tester context.
#[macro_export]
macro_rules! lt_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with load tester context.
#[macro_export]
macro_rules! lt_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with load tester context.
#[macro_export]
macro_rules! lt_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__lt_event!($crate::__tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
