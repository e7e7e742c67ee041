//! Capture, parse and inspect view hierarchies of remote UI windows.

pub mod capture;
pub mod config;
pub mod error;
pub mod files;
pub mod layout;
pub mod node;
pub mod notify;
pub mod options;
pub mod overlay;
pub mod parser;
pub mod property;
pub mod remote;
pub mod snapshot;

pub use capture::{capture_view, CaptureResult, RemoteWindow};
pub use error::{CaptureError, ParseError, SnapshotError};
pub use node::{DisplayInfo, ForcedState, NodeId, Rect, ViewNode, ViewTree};
pub use options::{CaptureOptions, ProtocolVersion, V2_MIN_API};
pub use parser::{parse, DumpWriter};
pub use property::{PropertyTable, ViewProperty};
pub use snapshot::Snapshot;
