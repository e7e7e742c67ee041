use std::io;

/// Failures while decoding a hierarchy dump. A parse never yields a partial tree.
///
/// `record` is the 1-based line number for text dumps and the 1-based record
/// ordinal for length-prefixed dumps.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("dump is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("record {record}: missing '@' between view name and hash")]
    MissingHash { record: usize },
    #[error("record {record}: root must be at depth 0, found depth {depth}")]
    RootNotAtTop { record: usize, depth: usize },
    #[error("record {record}: depth {depth} skips levels below parent depth {parent}")]
    DepthJump {
        record: usize,
        depth: usize,
        parent: usize,
    },
    #[error("record {record}: second root node at depth 0")]
    MultipleRoots { record: usize },
    #[error("record {record}: malformed property token: {detail}")]
    MalformedToken { record: usize, detail: String },
    #[error("record {record}: value of {key} declares {declared} chars, only {available} remain")]
    ValueOutOfBounds {
        record: usize,
        key: String,
        declared: usize,
        available: usize,
    },
    #[error("dump truncated at byte {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("record {record}: missing required property {field}")]
    MissingField { record: usize, field: &'static str },
    #[error("record {record}: property {field} has malformed value {value:?}")]
    MalformedField {
        record: usize,
        field: &'static str,
        value: String,
    },
}

/// Failures while encoding or decoding a snapshot blob.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("options string is {0} bytes, the header limit is 65535")]
    OptionsTooLong(usize),
    #[error("{what} block of {len} bytes exceeds the i32 length field")]
    BlockTooLarge { what: &'static str, len: usize },
    #[error("{0}")]
    Write(#[source] io::Error),
    #[error("snapshot truncated: {what} declares {declared} bytes, {remaining} remain")]
    Truncated {
        what: &'static str,
        declared: usize,
        remaining: usize,
    },
    #[error("{what} length is negative: {len}")]
    NegativeLength { what: &'static str, len: i32 },
    #[error("snapshot options header is not valid UTF-8")]
    InvalidOptions,
    #[error("{0} trailing bytes after the preview block")]
    TrailingBytes(usize),
    #[error("failed to read snapshot: {0}")]
    Read(#[source] io::Error),
}

impl SnapshotError {
    pub fn is_truncated(&self) -> bool {
        matches!(self, SnapshotError::Truncated { .. })
    }
}

pub const TIMEOUT_MESSAGE: &str = "There was a timeout error capturing the layout data from the device.\n\
The device may be too slow, the captured view may be too complex, or the view may contain animations.\n\n\
Please retry with a simplified view and ensure the device is responsive.";

/// Terminal outcomes of a failed capture. The display text is what the user sees.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,
    #[error("Unexpected error: {0}")]
    Parse(#[source] ParseError),
    #[error("Unable to parse view hierarchy")]
    EmptyHierarchy,
    #[error("Unable to obtain preview image")]
    PreviewUnavailable,
    #[error("Unexpected error while saving hierarchy snapshot: {0}")]
    SnapshotWrite(#[source] SnapshotError),
    #[error("Unexpected error while closing hierarchy snapshot: {0}")]
    SnapshotClose(#[source] io::Error),
}

impl CaptureError {
    /// Stable short code for logs and JSON payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::Timeout => "timeout",
            CaptureError::Parse(_) => "parse_error",
            CaptureError::EmptyHierarchy => "empty_hierarchy",
            CaptureError::PreviewUnavailable => "preview_unavailable",
            CaptureError::SnapshotWrite(_) | CaptureError::SnapshotClose(_) => {
                "snapshot_write_error"
            }
        }
    }
}
