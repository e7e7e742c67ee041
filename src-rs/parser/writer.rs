use super::text::END_MARKER;
use crate::options::ProtocolVersion;

/// Produces dumps in either protocol, for fixtures and offline replays.
#[derive(Debug)]
pub struct DumpWriter {
    version: ProtocolVersion,
    out: Vec<u8>,
}

impl DumpWriter {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            out: Vec::new(),
        }
    }

    /// Appends one view. Records must be written in pre-order.
    ///
    /// V2 fields longer than their length prefix are cut at the prefix limit.
    pub fn record(
        &mut self,
        depth: usize,
        name: &str,
        hash: &str,
        properties: &[(&str, &str)],
    ) -> &mut Self {
        match self.version {
            ProtocolVersion::V1 => self.text_record(depth, name, hash, properties),
            ProtocolVersion::V2 => self.binary_record(depth, name, hash, properties),
        }
        self
    }

    fn text_record(&mut self, depth: usize, name: &str, hash: &str, properties: &[(&str, &str)]) {
        let mut line = " ".repeat(depth);
        line.push_str(name);
        line.push('@');
        line.push_str(hash);
        for (key, value) in properties {
            line.push_str(&format!(" {key}={},{value}", value.chars().count()));
        }
        line.push('\n');
        self.out.extend_from_slice(line.as_bytes());
    }

    fn binary_record(
        &mut self,
        depth: usize,
        name: &str,
        hash: &str,
        properties: &[(&str, &str)],
    ) {
        let depth = u16::try_from(depth).unwrap_or(u16::MAX);
        self.out.extend_from_slice(&depth.to_be_bytes());
        self.str16(name);
        self.str16(hash);
        let count = u16::try_from(properties.len()).unwrap_or(u16::MAX);
        self.out.extend_from_slice(&count.to_be_bytes());
        for (key, value) in properties.iter().take(usize::from(count)) {
            self.str16(key);
            let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
            self.out.extend_from_slice(&len.to_be_bytes());
            self.out.extend_from_slice(&value.as_bytes()[..len as usize]);
        }
    }

    fn str16(&mut self, value: &str) {
        let len = u16::try_from(value.len()).unwrap_or(u16::MAX);
        self.out.extend_from_slice(&len.to_be_bytes());
        self.out.extend_from_slice(&value.as_bytes()[..usize::from(len)]);
    }

    /// Returns the dump. V1 dumps end with the `DONE.` marker line.
    pub fn finish(mut self) -> Vec<u8> {
        if self.version == ProtocolVersion::V1 && !self.out.is_empty() {
            self.out.extend_from_slice(END_MARKER.as_bytes());
            self.out.push(b'\n');
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_records_are_indented_and_length_prefixed() {
        let mut writer = DumpWriter::new(ProtocolVersion::V1);
        writer
            .record(0, "Root", "1", &[("mID", "id/root")])
            .record(1, "Child", "2", &[("text:getText()", "héllo")]);
        let dump = String::from_utf8(writer.finish()).unwrap();
        assert_eq!(
            dump,
            "Root@1 mID=7,id/root\n Child@2 text:getText()=5,héllo\nDONE.\n"
        );
    }

    #[test]
    fn binary_records_use_big_endian_prefixes() {
        let mut writer = DumpWriter::new(ProtocolVersion::V2);
        writer.record(1, "A", "b", &[("k", "vv")]);
        assert_eq!(
            writer.finish(),
            vec![0, 1, 0, 1, b'A', 0, 1, b'b', 0, 1, 0, 1, b'k', 0, 0, 0, 2, b'v', b'v']
        );
    }

    #[test]
    fn empty_writer_produces_empty_dump() {
        assert!(DumpWriter::new(ProtocolVersion::V1).finish().is_empty());
        assert!(DumpWriter::new(ProtocolVersion::V2).finish().is_empty());
    }
}
