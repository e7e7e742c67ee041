//! Protocol V1: one line per view, indented by depth.
//!
//! ```text
//! android.widget.FrameLayout@1a2b layout:mLeft=1,0 mID=7,id/root
//!  android.widget.TextView@3c4d text:getText()=11,Hello world
//! DONE.
//! ```
//!
//! Property values are prefixed by their length in characters so they may
//! contain spaces, commas, and `=`.

use super::{RawRecord, TreeAssembler};
use crate::error::ParseError;
use crate::property::ViewProperty;

pub(crate) const END_MARKER: &str = "DONE.";

pub(super) fn decode(bytes: &[u8], assembler: &mut TreeAssembler) -> Result<(), ParseError> {
    let text = std::str::from_utf8(bytes)?;
    for (line_index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim_end() == END_MARKER {
            break;
        }
        assembler.push(parse_line(line_index + 1, line)?)?;
    }
    Ok(())
}

fn parse_line(ordinal: usize, line: &str) -> Result<RawRecord, ParseError> {
    let depth = line.len() - line.trim_start_matches(' ').len();
    let body = &line[depth..];

    let (header, mut rest) = body.split_once(' ').unwrap_or((body, ""));
    let (name, hash) = header
        .split_once('@')
        .ok_or(ParseError::MissingHash { record: ordinal })?;

    let mut properties = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        let (property, remainder) = parse_property(ordinal, rest)?;
        properties.push(property);
        rest = remainder;
    }

    Ok(RawRecord {
        ordinal,
        depth,
        name: name.to_string(),
        hash: hash.to_string(),
        properties,
    })
}

/// Parses `key=len,value` from the front of `input` and returns the remainder.
fn parse_property(ordinal: usize, input: &str) -> Result<(ViewProperty, &str), ParseError> {
    let malformed = |detail: String| ParseError::MalformedToken {
        record: ordinal,
        detail,
    };

    let (key, after_key) = input
        .split_once('=')
        .ok_or_else(|| malformed(format!("no '=' in {:?}", head(input))))?;
    if key.is_empty() || key.contains(' ') {
        return Err(malformed(format!("bad property name {key:?}")));
    }

    let (len_text, after_len) = after_key
        .split_once(',')
        .ok_or_else(|| malformed(format!("{key}: missing ',' after value length")))?;
    let declared = len_text
        .parse::<usize>()
        .map_err(|_| malformed(format!("{key}: bad value length {len_text:?}")))?;

    let (value, remainder) = split_chars(after_len, declared).ok_or_else(|| {
        ParseError::ValueOutOfBounds {
            record: ordinal,
            key: key.to_string(),
            declared,
            available: after_len.chars().count(),
        }
    })?;
    if !remainder.is_empty() && !remainder.starts_with(' ') {
        return Err(malformed(format!("{key}: value not followed by a space")));
    }

    Ok((ViewProperty::new(key, value), remainder))
}

/// Splits after the first `count` chars, or `None` when the input is shorter.
fn split_chars(input: &str, count: usize) -> Option<(&str, &str)> {
    if count == 0 {
        return Some(("", input));
    }
    match input.char_indices().nth(count) {
        Some((offset, _)) => Some(input.split_at(offset)),
        None if input.chars().count() == count => Some((input, "")),
        None => None,
    }
}

fn head(input: &str) -> &str {
    split_chars(input, 24).map_or(input, |(front, _)| front)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_indent_as_depth() {
        let record = parse_line(4, "   android.view.View@ff00 mID=5,NO_ID").unwrap();
        assert_eq!(record.depth, 3);
        assert_eq!(record.name, "android.view.View");
        assert_eq!(record.hash, "ff00");
        assert_eq!(record.properties[0].value, "NO_ID");
    }

    #[test]
    fn values_may_contain_separators() {
        let record =
            parse_line(1, "Text@1 text:getText()=8,a=b, c d mID=4,id/x").unwrap();
        assert_eq!(record.properties.len(), 2);
        assert_eq!(record.properties[0].value, "a=b, c d");
        assert_eq!(record.properties[1].full_name, "mID");
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        let record = parse_line(1, "Text@1 text:getText()=3,héé mID=1,x").unwrap();
        assert_eq!(record.properties[0].value, "héé");
        assert_eq!(record.properties[1].value, "x");
    }

    #[test]
    fn empty_values_are_allowed() {
        let record = parse_line(1, "View@1 getTag()=0, mID=1,x").unwrap();
        assert_eq!(record.properties[0].value, "");
        assert_eq!(record.properties[1].value, "x");
    }

    #[test]
    fn declared_length_past_end_is_out_of_bounds() {
        let err = parse_line(7, "View@1 mID=40,short").unwrap_err();
        assert!(matches!(
            err,
            ParseError::ValueOutOfBounds {
                record: 7,
                declared: 40,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(matches!(
            parse_line(1, "ViewWithoutHash mID=1,x"),
            Err(ParseError::MissingHash { record: 1 })
        ));
        assert!(matches!(
            parse_line(1, "View@1 mID"),
            Err(ParseError::MalformedToken { .. })
        ));
        assert!(matches!(
            parse_line(1, "View@1 mID=x,1"),
            Err(ParseError::MalformedToken { .. })
        ));
        assert!(matches!(
            parse_line(1, "View@1 mID=1,xy"),
            Err(ParseError::MalformedToken { .. })
        ));
    }

    #[test]
    fn stops_at_end_marker() {
        let mut assembler = TreeAssembler::default();
        let dump = "Root@1 layout:mLeft=1,0 layout:mTop=1,0 layout:getWidth()=1,5 \
                    layout:getHeight()=1,5 getVisibility()=7,VISIBLE drawing:willNotDraw()=5,false\r\n\
                    DONE.\r\n\
                    garbage that is never read\n";
        decode(dump.as_bytes(), &mut assembler).unwrap();
        let tree = assembler.finish().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(tree.root()).display_info.width, 5);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut assembler = TreeAssembler::default();
        assert!(matches!(
            decode(&[0x66, 0xFF, 0x0A], &mut assembler),
            Err(ParseError::InvalidUtf8(_))
        ));
    }
}
