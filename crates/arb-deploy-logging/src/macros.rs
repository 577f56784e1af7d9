//! ---
//! arb_section: "03-logging"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Structured logging adapters for bootstrap steps."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Logging macros that attach a [`LogContext`](crate::LogContext) to each event.

/// Emit an informational log enriched with bootstrap context.
#[macro_export]
macro_rules! deploy_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            component = ctx.component.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::deploy_info!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a warning log enriched with bootstrap context.
#[macro_export]
macro_rules! deploy_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            component = ctx.component.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::deploy_warn!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit an error log enriched with bootstrap context.
#[macro_export]
macro_rules! deploy_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            component = ctx.component.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            service = ctx.service.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::deploy_error!(context = $crate::LogContext::default(), $($arg)+)
    }};
}
