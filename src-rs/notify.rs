use crate::capture::CaptureResult;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// User-facing notifications raised by the host.
pub trait Notifier {
    fn notify(&self, severity: Severity, message: &str);
}

/// Default notifier: forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
    }
}

/// Reports the outcome of a capture. `saved` is the snapshot path when the
/// capture succeeded and was written to disk.
pub fn report_capture(notifier: &dyn Notifier, window: &str, result: &CaptureResult, saved: Option<&Path>) {
    if result.is_success() {
        let message = match saved {
            Some(path) => format!("Captured {window} to {}", path.display()),
            None => format!("Captured {window}"),
        };
        notifier.notify(Severity::Info, &message);
    } else {
        notifier.notify(Severity::Error, &result.error());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{capture_view, RemoteWindow};
    use crate::node::{NodeId, ViewTree};
    use crate::options::CaptureOptions;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(Severity, String)>>);

    impl Notifier for Recorder {
        fn notify(&self, severity: Severity, message: &str) {
            self.0.borrow_mut().push((severity, message.to_string()));
        }
    }

    struct SilentWindow;

    impl RemoteWindow for SilentWindow {
        fn title(&self) -> &str {
            "silent"
        }

        fn load_window_data(&self, _: &CaptureOptions, _: Duration) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn load_view_image(&self, _: &ViewTree, _: NodeId, _: Duration) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[test]
    fn failed_capture_notifies_with_the_error_text() {
        let recorder = Recorder::default();
        let result = capture_view(&SilentWindow, &CaptureOptions::for_api_level("silent", 23));
        report_capture(&recorder, "silent", &result, None);

        let events = recorder.0.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Severity::Error);
        assert_eq!(events[0].1, result.error());
    }
}
