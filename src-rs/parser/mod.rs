//! Hierarchy dump decoding.
//!
//! Both protocols describe a pre-order walk of the view tree where every
//! record carries its depth. [`TreeAssembler`] turns that walk into a
//! [`ViewTree`] with an explicit parent stack.

mod binary;
mod text;
mod writer;

pub use writer::DumpWriter;

use crate::error::ParseError;
use crate::layout;
use crate::node::{DisplayInfo, NodeId, NodeRecord, Rect, ViewTree};
use crate::options::ProtocolVersion;
use crate::property::ViewProperty;
use std::collections::HashMap;

pub const LEFT: &str = "layout:mLeft";
pub const TOP: &str = "layout:mTop";
pub const WIDTH: &str = "layout:getWidth()";
pub const HEIGHT: &str = "layout:getHeight()";
pub const VISIBILITY: &str = "getVisibility()";
pub const WILL_NOT_DRAW: &str = "drawing:willNotDraw()";
pub const SCROLL_X: &str = "scrolling:mScrollX";
pub const SCROLL_Y: &str = "scrolling:mScrollY";
pub const TRANSLATION_X: &str = "drawing:getTranslationX()";
pub const TRANSLATION_Y: &str = "drawing:getTranslationY()";
pub const SCALE_X: &str = "drawing:getScaleX()";
pub const SCALE_Y: &str = "drawing:getScaleY()";
pub const CLIP_CHILDREN: &str = "drawing:getClipChildren()";
pub const CONTENT_DESC: &str = "accessibility:getContentDescription()";
pub const ID: &str = "mID";

const NO_ID: &str = "NO_ID";

/// Decodes `bytes` into a tree. Empty input yields `Ok(None)`.
pub fn parse(bytes: &[u8], version: ProtocolVersion) -> Result<Option<ViewTree>, ParseError> {
    let mut assembler = TreeAssembler::default();
    match version {
        ProtocolVersion::V1 => text::decode(bytes, &mut assembler)?,
        ProtocolVersion::V2 => binary::decode(bytes, &mut assembler)?,
    }
    let tree = assembler.finish();
    tracing::debug!(
        version = %version,
        bytes = bytes.len(),
        nodes = tree.as_ref().map_or(0, ViewTree::len),
        "parsed view hierarchy"
    );
    Ok(tree)
}

/// One decoded record before it is placed in the tree.
#[derive(Debug)]
pub(crate) struct RawRecord {
    pub ordinal: usize,
    pub depth: usize,
    pub name: String,
    pub hash: String,
    pub properties: Vec<ViewProperty>,
}

#[derive(Debug, Default)]
pub(crate) struct TreeAssembler {
    tree: Option<ViewTree>,
    // stack[d] is the open node at depth d.
    stack: Vec<NodeId>,
}

impl TreeAssembler {
    pub fn push(&mut self, raw: RawRecord) -> Result<(), ParseError> {
        let record = raw.ordinal;
        let depth = raw.depth;

        let Some(tree) = self.tree.as_mut() else {
            if depth != 0 {
                return Err(ParseError::RootNotAtTop { record, depth });
            }
            let tree = ViewTree::with_root(node_record(raw)?);
            self.stack.push(tree.root());
            self.tree = Some(tree);
            return Ok(());
        };

        if depth == 0 {
            return Err(ParseError::MultipleRoots { record });
        }
        if depth > self.stack.len() {
            return Err(ParseError::DepthJump {
                record,
                depth,
                parent: self.stack.len() - 1,
            });
        }

        self.stack.truncate(depth);
        let parent = self.stack[depth - 1];
        let id = tree.push_child(parent, node_record(raw)?);
        self.stack.push(id);
        Ok(())
    }

    pub fn finish(self) -> Option<ViewTree> {
        let mut tree = self.tree?;
        layout::compute_preview_boxes(&mut tree, 1.0);
        tree.update_node_drawn();
        Some(tree)
    }
}

fn node_record(raw: RawRecord) -> Result<NodeRecord, ParseError> {
    let fields = Fields::new(raw.ordinal, &raw.properties);
    let display_info = fields.display_info()?;
    let id = fields
        .get(ID)
        .filter(|v| !v.is_empty() && *v != NO_ID)
        .map(ToString::to_string);

    Ok(NodeRecord {
        name: raw.name,
        hash: raw.hash,
        id,
        display_info,
        preview_box: Rect::default(),
        properties: raw.properties,
    })
}

struct Fields<'a> {
    record: usize,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Fields<'a> {
    fn new(record: usize, properties: &'a [ViewProperty]) -> Self {
        let values = properties
            .iter()
            .map(|p| (p.full_name.as_str(), p.value.as_str()))
            .collect();
        Self { record, values }
    }

    fn get(&self, field: &str) -> Option<&'a str> {
        self.values.get(field).map(|v| v.trim())
    }

    fn required(&self, field: &'static str) -> Result<&'a str, ParseError> {
        self.get(field).ok_or(ParseError::MissingField {
            record: self.record,
            field,
        })
    }

    fn malformed(&self, field: &'static str, value: &str) -> ParseError {
        ParseError::MalformedField {
            record: self.record,
            field,
            value: value.to_string(),
        }
    }

    fn int(&self, field: &'static str, value: &str) -> Result<i32, ParseError> {
        if let Ok(v) = value.parse::<i32>() {
            return Ok(v);
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v.abs() <= f64::from(i32::MAX) => Ok(v as i32),
            _ => Err(self.malformed(field, value)),
        }
    }

    fn required_int(&self, field: &'static str) -> Result<i32, ParseError> {
        let value = self.required(field)?;
        self.int(field, value)
    }

    fn optional_int(&self, field: &'static str) -> Result<i32, ParseError> {
        self.get(field).map_or(Ok(0), |value| self.int(field, value))
    }

    fn optional_float(&self, field: &'static str, default: f32) -> Result<f32, ParseError> {
        match self.get(field) {
            None => Ok(default),
            Some(value) => value
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| self.malformed(field, value)),
        }
    }

    fn boolean(&self, field: &'static str, value: &str) -> Result<bool, ParseError> {
        match value {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.malformed(field, value)),
        }
    }

    fn visibility(&self) -> Result<bool, ParseError> {
        let value = self.required(VISIBILITY)?;
        match value {
            "VISIBLE" | "0" => Ok(true),
            "INVISIBLE" | "GONE" | "4" | "8" => Ok(false),
            _ => Err(self.malformed(VISIBILITY, value)),
        }
    }

    fn display_info(&self) -> Result<DisplayInfo, ParseError> {
        let will_not_draw = self.boolean(WILL_NOT_DRAW, self.required(WILL_NOT_DRAW)?)?;
        let clip_children = match self.get(CLIP_CHILDREN) {
            Some(value) => self.boolean(CLIP_CHILDREN, value)?,
            None => true,
        };
        let content_desc = self
            .get(CONTENT_DESC)
            .filter(|v| !v.is_empty() && *v != "null")
            .map(ToString::to_string);

        Ok(DisplayInfo {
            will_not_draw,
            is_visible: self.visibility()?,
            left: self.required_int(LEFT)?,
            top: self.required_int(TOP)?,
            width: self.required_int(WIDTH)?,
            height: self.required_int(HEIGHT)?,
            scroll_x: self.optional_int(SCROLL_X)?,
            scroll_y: self.optional_int(SCROLL_Y)?,
            translate_x: self.optional_float(TRANSLATION_X, 0.0)?,
            translate_y: self.optional_float(TRANSLATION_Y, 0.0)?,
            scale_x: self.optional_float(SCALE_X, 1.0)?,
            scale_y: self.optional_float(SCALE_Y, 1.0)?,
            clip_children,
            content_desc,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Required display-info properties for a visible, drawing view.
    pub(crate) fn geometry(left: i32, top: i32, width: i32, height: i32) -> Vec<(String, String)> {
        vec![
            (LEFT.to_string(), left.to_string()),
            (TOP.to_string(), top.to_string()),
            (WIDTH.to_string(), width.to_string()),
            (HEIGHT.to_string(), height.to_string()),
            (VISIBILITY.to_string(), "VISIBLE".to_string()),
            (WILL_NOT_DRAW.to_string(), "false".to_string()),
        ]
    }

    fn pairs(props: &[(String, String)]) -> Vec<(&str, &str)> {
        props.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    fn sample(version: ProtocolVersion) -> Vec<u8> {
        let mut scrolled = geometry(0, 100, 1080, 1800);
        scrolled.push((SCROLL_Y.to_string(), "40".to_string()));
        scrolled.push((ID.to_string(), "id/list".to_string()));
        let mut item = geometry(16, 60, 200, 48);
        item.push((TRANSLATION_X.to_string(), "4.5".to_string()));
        item.push(("text:getText()".to_string(), "Hello, world".to_string()));

        let mut writer = DumpWriter::new(version);
        writer
            .record(0, "com.android.internal.policy.DecorView", "1f2e", &pairs(&geometry(0, 0, 1080, 1920)))
            .record(1, "android.widget.ListView", "3a", &pairs(&scrolled))
            .record(2, "android.widget.TextView", "4b", &pairs(&item))
            .record(2, "android.widget.TextView", "5c", &pairs(&geometry(16, 120, 200, 48)))
            .record(1, "android.view.View", "6d", &pairs(&geometry(0, 1800, 1080, 120)));
        writer.finish()
    }

    #[test]
    fn both_protocols_build_the_same_tree() {
        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            let tree = parse(&sample(version), version).unwrap().unwrap();
            let root = tree.root();
            assert_eq!(tree.len(), 5);
            assert_eq!(tree.node(root).children().len(), 2);

            let list = tree.child(root, 0).unwrap();
            assert_eq!(tree.node(list).id.as_deref(), Some("id/list"));
            assert_eq!(tree.node(list).index, 0);
            let second = tree.child(list, 1).unwrap();
            assert_eq!(tree.node(second).index, 1);
            assert_eq!(tree.node(second).parent(), Some(list));
            let footer = tree.child(root, 1).unwrap();
            assert_eq!(tree.node(footer).name, "android.view.View");
            assert_eq!(tree.node(footer).index, 1);
        }
    }

    #[test]
    fn preview_box_follows_parent_scroll_and_translation() {
        let tree = parse(&sample(ProtocolVersion::V2), ProtocolVersion::V2)
            .unwrap()
            .unwrap();
        let list = tree.child(tree.root(), 0).unwrap();
        let first = tree.child(list, 0).unwrap();
        assert_eq!(tree.node(list).preview_box, Rect::new(0, 100, 1080, 1800));
        // 16 + 4.5 (translation) truncated, 100 - 40 (scroll) + 60
        assert_eq!(tree.node(first).preview_box, Rect::new(20, 120, 200, 48));
        assert_eq!(tree.node(first).display_info.translate_x, 4.5);
    }

    #[test]
    fn properties_are_grouped_and_named() {
        let tree = parse(&sample(ProtocolVersion::V1), ProtocolVersion::V1)
            .unwrap()
            .unwrap();
        let item = tree.select("/0/0").unwrap();
        let node = tree.node(item);
        assert_eq!(node.grouped_properties()["layout"].len(), 4);
        assert_eq!(node.grouped_properties()["methods"][0].full_name, VISIBILITY);
        assert_eq!(node.grouped_properties()["text"][0].value, "Hello, world");
        assert_eq!(
            node.get_property("text:mText", &["text:getText()"]).map(|p| p.value.as_str()),
            Some("Hello, world")
        );
        assert_eq!(node.properties().len(), 8);
    }

    #[test]
    fn parse_runs_draw_propagation() {
        let tree = parse(&sample(ProtocolVersion::V2), ProtocolVersion::V2)
            .unwrap()
            .unwrap();
        assert!(tree.preorder().into_iter().all(|id| tree.node(id).is_drawn()));
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(parse(b"", ProtocolVersion::V1).unwrap().is_none());
        assert!(parse(b"", ProtocolVersion::V2).unwrap().is_none());
        assert!(parse(b"DONE.\n", ProtocolVersion::V1).unwrap().is_none());
    }

    #[test]
    fn depth_jump_fails_whole_parse() {
        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            let mut writer = DumpWriter::new(version);
            writer
                .record(0, "Root", "a", &pairs(&geometry(0, 0, 10, 10)))
                .record(2, "Orphan", "b", &pairs(&geometry(0, 0, 10, 10)));
            let err = parse(&writer.finish(), version).unwrap_err();
            assert!(matches!(
                err,
                ParseError::DepthJump {
                    record: 2,
                    depth: 2,
                    parent: 0
                }
            ));
        }
    }

    #[test]
    fn rejects_second_root_and_nested_first_record() {
        let mut writer = DumpWriter::new(ProtocolVersion::V2);
        writer
            .record(0, "Root", "a", &pairs(&geometry(0, 0, 10, 10)))
            .record(0, "Other", "b", &pairs(&geometry(0, 0, 10, 10)));
        assert!(matches!(
            parse(&writer.finish(), ProtocolVersion::V2),
            Err(ParseError::MultipleRoots { record: 2 })
        ));

        let mut writer = DumpWriter::new(ProtocolVersion::V1);
        writer.record(1, "Child", "a", &pairs(&geometry(0, 0, 10, 10)));
        assert!(matches!(
            parse(&writer.finish(), ProtocolVersion::V1),
            Err(ParseError::RootNotAtTop { record: 1, depth: 1 })
        ));
    }

    #[test]
    fn missing_or_malformed_geometry_fails() {
        let mut props = geometry(0, 0, 10, 10);
        props.retain(|(k, _)| k != HEIGHT);
        let mut writer = DumpWriter::new(ProtocolVersion::V2);
        writer.record(0, "Root", "a", &pairs(&props));
        assert!(matches!(
            parse(&writer.finish(), ProtocolVersion::V2),
            Err(ParseError::MissingField { field: HEIGHT, .. })
        ));

        let mut props = geometry(0, 0, 10, 10);
        props.push((SCALE_X.to_string(), "wide".to_string()));
        let mut writer = DumpWriter::new(ProtocolVersion::V1);
        writer.record(0, "Root", "a", &pairs(&props));
        assert!(matches!(
            parse(&writer.finish(), ProtocolVersion::V1),
            Err(ParseError::MalformedField { field: SCALE_X, .. })
        ));

        let mut props = geometry(0, 0, 10, 10);
        props[4].1 = "SOMETIMES".to_string();
        let mut writer = DumpWriter::new(ProtocolVersion::V1);
        writer.record(0, "Root", "a", &pairs(&props));
        assert!(matches!(
            parse(&writer.finish(), ProtocolVersion::V1),
            Err(ParseError::MalformedField {
                field: VISIBILITY,
                ..
            })
        ));
    }

    #[test]
    fn display_info_defaults_and_flags() {
        let mut props = geometry(0, 0, 10, 10);
        props[4].1 = "GONE".to_string();
        props[5].1 = "true".to_string();
        props.push((CLIP_CHILDREN.to_string(), "false".to_string()));
        props.push((CONTENT_DESC.to_string(), "null".to_string()));
        props.push((ID.to_string(), "NO_ID".to_string()));
        let mut writer = DumpWriter::new(ProtocolVersion::V2);
        writer.record(0, "Root", "a", &pairs(&props));
        let tree = parse(&writer.finish(), ProtocolVersion::V2).unwrap().unwrap();
        let node = tree.node(tree.root());
        assert!(!node.display_info.is_visible);
        assert!(node.display_info.will_not_draw);
        assert!(!node.display_info.clip_children);
        assert_eq!(node.display_info.scale_x, 1.0);
        assert_eq!(node.display_info.content_desc, None);
        assert_eq!(node.id, None);
        assert!(!node.is_drawn());
    }
}
