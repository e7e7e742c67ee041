//! Capture pipeline: fetch dump, parse, fetch preview, assemble snapshot.

use crate::error::CaptureError;
use crate::node::{NodeId, ViewTree};
use crate::options::CaptureOptions;
use crate::parser;
use crate::snapshot;
use std::io::{BufWriter, Write};
use std::time::Duration;

pub const WINDOW_DATA_TIMEOUT: Duration = Duration::from_secs(20);
pub const VIEW_IMAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// A window of a debuggable process on an attached device.
///
/// `Ok(None)` means the call produced no data within `timeout`; `Err` is a
/// transport failure. Implementations must return once `timeout` has elapsed.
pub trait RemoteWindow {
    fn title(&self) -> &str;

    fn load_window_data(
        &self,
        options: &CaptureOptions,
        timeout: Duration,
    ) -> anyhow::Result<Option<Vec<u8>>>;

    fn load_view_image(
        &self,
        tree: &ViewTree,
        node: NodeId,
        timeout: Duration,
    ) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Outcome of [`capture_view`]: snapshot bytes or a user-facing error, never both.
#[derive(Debug)]
pub struct CaptureResult {
    outcome: Result<Vec<u8>, CaptureError>,
}

impl CaptureResult {
    fn success(data: Vec<u8>) -> Self {
        Self { outcome: Ok(data) }
    }

    fn failure(error: CaptureError) -> Self {
        tracing::warn!(code = error.code(), "capture failed: {error}");
        Self {
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.outcome.as_ref().ok().map(Vec::as_slice)
    }

    /// Empty on success.
    pub fn error(&self) -> String {
        match &self.outcome {
            Ok(_) => String::new(),
            Err(err) => err.to_string(),
        }
    }

    pub fn failure_kind(&self) -> Option<&CaptureError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> Result<Vec<u8>, CaptureError> {
        self.outcome
    }
}

/// Runs a full capture against `window`. Every failure is folded into the result.
pub fn capture_view(window: &dyn RemoteWindow, options: &CaptureOptions) -> CaptureResult {
    tracing::info!(window = window.title(), version = %options.version, "capturing view hierarchy");

    let hierarchy = match window.load_window_data(options, WINDOW_DATA_TIMEOUT) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return CaptureResult::failure(CaptureError::Timeout),
        Err(err) => {
            tracing::warn!("window data request failed: {err:#}");
            return CaptureResult::failure(CaptureError::Timeout);
        }
    };
    tracing::debug!(bytes = hierarchy.len(), "received hierarchy dump");

    let tree = match parser::parse(&hierarchy, options.version) {
        Ok(Some(tree)) => tree,
        Ok(None) => return CaptureResult::failure(CaptureError::EmptyHierarchy),
        Err(err) => return CaptureResult::failure(CaptureError::Parse(err)),
    };

    let preview = match window.load_view_image(&tree, tree.root(), VIEW_IMAGE_TIMEOUT) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return CaptureResult::failure(CaptureError::PreviewUnavailable),
        Err(err) => {
            tracing::warn!("preview request failed: {err:#}");
            return CaptureResult::failure(CaptureError::PreviewUnavailable);
        }
    };
    tracing::debug!(bytes = preview.len(), "received preview image");

    match assemble(Vec::with_capacity(4096), options, &hierarchy, &preview) {
        Ok(bytes) => {
            tracing::info!(
                nodes = tree.len(),
                bytes = bytes.len(),
                "captured view hierarchy snapshot"
            );
            CaptureResult::success(bytes)
        }
        Err(err) => CaptureResult::failure(err),
    }
}

/// Writes the snapshot through a buffered writer over `sink`. The writer is
/// closed on every path. A flush failure is reported as a close error, or
/// logged when a write error is already being reported.
fn assemble<W: Write>(
    sink: W,
    options: &CaptureOptions,
    hierarchy: &[u8],
    preview: &[u8],
) -> Result<W, CaptureError> {
    let mut output = BufWriter::new(sink);
    if let Err(err) = snapshot::write_snapshot(&mut output, &options.to_string(), hierarchy, preview) {
        if let Err(close_err) = output.flush() {
            tracing::warn!("failed to close hierarchy snapshot after write error: {close_err}");
        }
        // Already flushed once; skip the silent retry in Drop.
        let _ = output.into_parts();
        return Err(CaptureError::SnapshotWrite(err));
    }
    output
        .into_inner()
        .map_err(|err| CaptureError::SnapshotClose(err.into_error()))
}
