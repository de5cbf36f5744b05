//! The editor/UI surface boundary.
//!
//! A full coding-agent host renders a rich terminal UI; that rendering
//! engine carries no weight for the handoff subsystem, so only the
//! operations handoff actually calls are modeled as a trait, backed by one
//! small `reedline`-based implementation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    HandoffToNewSession,
    CompactContext,
    ContinueWithoutEither,
}

#[async_trait]
pub trait UiSurface: Send + Sync {
    /// Replace the editor's current text.
    fn set_editor_text(&self, text: &str);

    /// Show a one-line notification.
    fn notify(&self, text: &str, severity: Severity);

    /// Present a small set of named choices and await the user's pick.
    /// `None` means the user dismissed the prompt.
    async fn select(&self, title: &str, choices: &[Choice]) -> Option<Choice>;

    /// Show a cancellable loader labeled `label`. Resolves once `abort` is
    /// cancelled, whether by the user dismissing the loader (in which case
    /// this implementation cancels `abort` itself) or by the task racing
    /// it finishing first and cancelling `abort` from the outside.
    async fn await_cancellable(&self, label: &str, abort: CancellationToken);
}

mod reedline_ui;
pub use reedline_ui::ReedlineUi;
