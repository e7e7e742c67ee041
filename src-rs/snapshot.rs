//! Snapshot blob layout, all integers big-endian:
//!
//! ```text
//! u16 len | options (UTF-8) | i32 len | hierarchy bytes | i32 len | preview bytes
//! ```

use crate::error::{ParseError, SnapshotError};
use crate::node::ViewTree;
use crate::options::{CaptureOptions, ProtocolVersion};
use crate::parser;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub options: String,
    pub hierarchy: Vec<u8>,
    pub preview: Vec<u8>,
}

impl Snapshot {
    pub fn capture_options(&self) -> Option<CaptureOptions> {
        self.options.parse().ok()
    }

    /// Protocol recorded in the header. Headers that do not parse are treated
    /// as the current protocol.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.capture_options()
            .map(|options| options.version)
            .unwrap_or(ProtocolVersion::V2)
    }

    pub fn parse_tree(&self) -> Result<Option<ViewTree>, ParseError> {
        parser::parse(&self.hierarchy, self.protocol_version())
    }
}

fn block_len(what: &'static str, block: &[u8]) -> Result<[u8; 4], SnapshotError> {
    let len = i32::try_from(block.len())
        .map_err(|_| SnapshotError::BlockTooLarge { what, len: block.len() })?;
    Ok(len.to_be_bytes())
}

pub fn write_snapshot<W: Write>(
    out: &mut W,
    options: &str,
    hierarchy: &[u8],
    preview: &[u8],
) -> Result<(), SnapshotError> {
    let options_len =
        u16::try_from(options.len()).map_err(|_| SnapshotError::OptionsTooLong(options.len()))?;
    let hierarchy_len = block_len("hierarchy", hierarchy)?;
    let preview_len = block_len("preview", preview)?;

    out.write_all(&options_len.to_be_bytes())
        .and_then(|_| out.write_all(options.as_bytes()))
        .and_then(|_| out.write_all(&hierarchy_len))
        .and_then(|_| out.write_all(hierarchy))
        .and_then(|_| out.write_all(&preview_len))
        .and_then(|_| out.write_all(preview))
        .map_err(SnapshotError::Write)
}

pub fn encode(options: &str, hierarchy: &[u8], preview: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::with_capacity(2 + options.len() + 8 + hierarchy.len() + preview.len());
    write_snapshot(&mut out, options, hierarchy, preview)?;
    Ok(out)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], SnapshotError> {
        let remaining = self.bytes.len() - self.pos;
        if len > remaining {
            return Err(SnapshotError::Truncated {
                what,
                declared: len,
                remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn block(&mut self, what: &'static str) -> Result<&'a [u8], SnapshotError> {
        let raw = self.take(4, what)?;
        let len = i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let len = usize::try_from(len).map_err(|_| SnapshotError::NegativeLength { what, len })?;
        self.take(len, what)
    }
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot, SnapshotError> {
    let mut reader = Reader { bytes, pos: 0 };

    let raw = reader.take(2, "options")?;
    let options_len = usize::from(u16::from_be_bytes([raw[0], raw[1]]));
    let options = std::str::from_utf8(reader.take(options_len, "options")?)
        .map_err(|_| SnapshotError::InvalidOptions)?
        .to_string();
    let hierarchy = reader.block("hierarchy")?.to_vec();
    let preview = reader.block("preview")?.to_vec();

    let trailing = bytes.len() - reader.pos;
    if trailing > 0 {
        return Err(SnapshotError::TrailingBytes(trailing));
    }

    Ok(Snapshot {
        options,
        hierarchy,
        preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn layout_is_big_endian_length_prefixed() {
        let bytes = encode("{}", b"abc", &[9, 8]).unwrap();
        assert_eq!(
            bytes,
            vec![0, 2, b'{', b'}', 0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 2, 9, 8]
        );
        let snapshot = decode(&bytes).unwrap();
        assert_eq!(snapshot.options, "{}");
        assert_eq!(snapshot.hierarchy, b"abc");
        assert_eq!(snapshot.preview, vec![9, 8]);
    }

    #[test]
    fn oversized_preview_length_is_truncation() {
        let mut bytes = encode("opts", b"dump", b"png!").unwrap();
        bytes.truncate(bytes.len() - 1);
        let err = decode(&bytes).unwrap_err();
        assert!(err.is_truncated());
        assert!(err.to_string().contains("preview declares 4 bytes, 3 remain"));
    }

    #[test]
    fn missing_block_header_is_truncation() {
        let err = decode(&[0, 1, b'x', 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Truncated {
                what: "hierarchy",
                ..
            }
        ));
    }

    #[test]
    fn rejects_negative_lengths_and_trailing_bytes() {
        let negative = [0, 0, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            decode(&negative),
            Err(SnapshotError::NegativeLength { len: -1, .. })
        ));

        let mut bytes = encode("", b"", b"").unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(SnapshotError::TrailingBytes(1))));
    }

    #[test]
    fn write_failure_surfaces_cause() {
        let err = write_snapshot(&mut FailingWriter, "opts", b"a", b"b").unwrap_err();
        assert!(matches!(err, SnapshotError::Write(_)));
        assert_eq!(err.to_string(), "pipe closed");
    }

    #[test]
    fn options_header_limit_is_enforced() {
        let long = "x".repeat(70_000);
        assert!(matches!(
            encode(&long, b"", b""),
            Err(SnapshotError::OptionsTooLong(70_000))
        ));
    }

    #[test]
    fn unreadable_header_falls_back_to_current_protocol() {
        let snapshot = Snapshot {
            options: "not json".to_string(),
            hierarchy: Vec::new(),
            preview: Vec::new(),
        };
        assert_eq!(snapshot.protocol_version(), ProtocolVersion::V2);
        assert!(snapshot.parse_tree().unwrap().is_none());
    }
}
