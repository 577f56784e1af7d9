//! ---
//! arb_section: "03-logging"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Structured logging adapters for bootstrap steps."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Structured event helpers shared by the provisioner and the launcher.
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline stderr subscriber, used when configured tracing
/// cannot be set up.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Component emitting the event (`provisioner`, `launcher`).
    pub component: Option<&'a str>,
    /// Bootstrap step being executed.
    pub step: Option<&'a str>,
    /// Supervised service name.
    pub service: Option<&'a str>,
    /// Attempt counter for retried steps.
    pub attempt: Option<u32>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a component name.
    pub fn with_component(mut self, component: &'a str) -> Self {
        self.component = Some(component);
        self
    }

    /// Attach a step name.
    pub fn with_step(mut self, step: &'a str) -> Self {
        self.step = Some(step);
        self
    }

    /// Attach a service name.
    pub fn with_service(mut self, service: &'a str) -> Self {
        self.service = Some(service);
        self
    }

    /// Attach an attempt counter.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// High-level outcome used when emitting step log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step completed and changed host state.
    Applied,
    /// The step found its target state already in place.
    Unchanged,
    /// The step failed.
    Fault,
}

impl StepOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Applied => "applied",
            StepOutcome::Unchanged => "unchanged",
            StepOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized step event with its outcome.
pub fn log_step_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: StepOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let component = ctx.component.unwrap_or("");
    let step = ctx.step.unwrap_or("");
    let service = ctx.service.unwrap_or("");
    let attempt = ctx.attempt.unwrap_or_default();
    let outcome_str = outcome.as_str();
    match outcome {
        StepOutcome::Fault => tracing::error!(
            event,
            outcome = outcome_str,
            component,
            step,
            service,
            attempt,
            message = %message
        ),
        _ => tracing::info!(
            event,
            outcome = outcome_str,
            component,
            step,
            service,
            attempt,
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(emit: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = subscriber_fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn macros_attach_context_fields() {
        let output = capture(|| {
            let ctx = LogContext::new()
                .with_component("launcher")
                .with_service("bot");
            deploy_info!(context = ctx.clone(), "service online");
            deploy_error!(context = ctx, "build exited with {}", 17);
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{output}");
        assert!(lines[0].contains("INFO"), "{output}");
        assert!(lines[0].contains("service online"));
        assert!(lines[0].contains("component=\"launcher\""), "{output}");
        assert!(lines[0].contains("service=\"bot\""), "{output}");
        assert!(lines[1].contains("ERROR"));
        assert!(lines[1].contains("build exited with 17"));
    }

    #[test]
    fn context_free_warning_uses_empty_fields() {
        let output = capture(|| deploy_warn!("placeholder created at {}", ".env"));

        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("placeholder created at .env"));
        assert!(output.contains("attempt=0"), "{output}");
    }

    #[test]
    fn step_events_carry_outcome_and_level() {
        let output = capture(|| {
            let ctx = LogContext::new()
                .with_component("provisioner")
                .with_step("fetch-key")
                .with_attempt(2);
            log_step_event(Some(&ctx), "provision.key", "key stored", StepOutcome::Applied);
            log_step_event(None, "provision.key", "key fetch failed", StepOutcome::Fault);
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{output}");
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("outcome=\"applied\""), "{output}");
        assert!(lines[0].contains("step=\"fetch-key\""), "{output}");
        assert!(lines[0].contains("attempt=2"), "{output}");
        assert!(lines[1].contains("ERROR"));
        assert!(lines[1].contains("outcome=\"fault\""), "{output}");
        assert!(lines[1].contains("key fetch failed"));
    }
}
