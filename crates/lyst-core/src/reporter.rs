//! Reporter trait for dependency injection
//!
//! This trait allows the targets to report progress and status without
//! being coupled to a specific terminal implementation. Diagnostics for
//! developers go through `tracing`; this is what the operator sees.

pub trait Reporter: Send + Sync {
    /// Indicates a new section has started (e.g. "Homebrew Tap").
    fn section(&self, title: &str);

    /// A manifest for `app` was emitted.
    fn generated(&self, target: &str, app: &str, detail: &str);

    /// `app` was left out on purpose (unsupported platform, no artifact, ...).
    fn skipped(&self, target: &str, app: &str, reason: &str);

    /// Processing `app` failed.
    fn failed(&self, target: &str, app: &str, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn generated(&self, target: &str, app: &str, detail: &str) {
        (**self).generated(target, app, detail);
    }
    fn skipped(&self, target: &str, app: &str, reason: &str) {
        (**self).skipped(target, app, reason);
    }
    fn failed(&self, target: &str, app: &str, reason: &str) {
        (**self).failed(target, app, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn generated(&self, _: &str, _: &str, _: &str) {}
    fn skipped(&self, _: &str, _: &str, _: &str) {}
    fn failed(&self, _: &str, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}
