use super::{Choice, Severity, UiSurface};
use async_trait::async_trait;
use reedline::ExternalPrinter;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A minimal terminal UI surface built on `reedline`'s external printer,
/// grounded on the teacher's own `reedline_spike` evaluation: a background
/// thread can print lines concurrently with the user's in-progress input.
pub struct ReedlineUi {
    printer: ExternalPrinter<String>,
    editor_text: Mutex<String>,
}

impl ReedlineUi {
    #[must_use]
    pub fn new(printer: ExternalPrinter<String>) -> Self {
        Self {
            printer,
            editor_text: Mutex::new(String::new()),
        }
    }

    /// Drain and clear whatever the handoff engine staged as the next
    /// editor contents, handing ownership to the caller (the REPL loop).
    #[must_use]
    pub fn take_editor_text(&self) -> String {
        std::mem::take(&mut self.editor_text.lock().expect("editor_text lock poisoned"))
    }
}

#[async_trait]
impl UiSurface for ReedlineUi {
    fn set_editor_text(&self, text: &str) {
        *self.editor_text.lock().expect("editor_text lock poisoned") = text.to_string();
    }

    fn notify(&self, text: &str, severity: Severity) {
        let prefix = match severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let _ = self.printer.print(format!("[{prefix}] {text}"));
    }

    async fn select(&self, title: &str, choices: &[Choice]) -> Option<Choice> {
        let mut prompt = format!("{title}\n");
        for (i, choice) in choices.iter().enumerate() {
            prompt.push_str(&format!("  {}. {}\n", i + 1, describe(choice)));
        }
        prompt.push_str("> ");
        let _ = self.printer.print(prompt);

        // The line editor isn't reading input while a choice is pending, so
        // reading stdin directly here doesn't race it.
        let choices = choices.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_err() {
                return None;
            }
            let index: usize = line.trim().parse().ok()?;
            index.checked_sub(1).and_then(|i| choices.get(i).cloned())
        })
        .await
        .ok()
        .flatten()
    }

    async fn await_cancellable(&self, label: &str, abort: CancellationToken) {
        let _ = self.printer.print(format!("{label}…"));
        abort.cancelled().await;
    }
}

fn describe(choice: &Choice) -> &'static str {
    match choice {
        Choice::HandoffToNewSession => "Handoff to new session",
        Choice::CompactContext => "Compact context",
        Choice::ContinueWithoutEither => "Continue without either",
    }
}
