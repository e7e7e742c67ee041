use crate::property::{index_properties, GroupedProperties, NamedProperties, PropertyTable, ViewProperty};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Index of a node inside its [`ViewTree`]. Only meaningful for the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Half-open containment, matching AWT rectangle semantics.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.width > 0
            && self.height > 0
            && x >= self.x
            && y >= self.y
            && x < self.right()
            && y < self.bottom()
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }
}

/// Capture-time geometry and draw flags of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayInfo {
    pub will_not_draw: bool,
    pub is_visible: bool,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub scroll_x: i32,
    pub scroll_y: i32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub clip_children: bool,
    pub content_desc: Option<String>,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            will_not_draw: false,
            is_visible: true,
            left: 0,
            top: 0,
            width: 0,
            height: 0,
            scroll_x: 0,
            scroll_y: 0,
            translate_x: 0.0,
            translate_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            clip_children: true,
            content_desc: None,
        }
    }
}

/// Manual visibility override used to preview hiding or showing a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ForcedState {
    #[default]
    None,
    Visible,
    Invisible,
}

/// Fields the parser collects for one record before the node is attached.
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    pub name: String,
    pub hash: String,
    pub id: Option<String>,
    pub display_info: DisplayInfo,
    pub preview_box: Rect,
    pub properties: Vec<ViewProperty>,
}

#[derive(Debug, Clone)]
pub struct ViewNode {
    pub hash: String,
    pub name: String,
    pub index: usize,
    pub id: Option<String>,
    pub preview_box: Rect,
    pub display_info: DisplayInfo,
    pub forced_state: ForcedState,
    properties: Vec<ViewProperty>,
    grouped_properties: GroupedProperties,
    named_properties: NamedProperties,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    is_parent_visible: bool,
    is_drawn: bool,
}

impl ViewNode {
    fn from_record(record: NodeRecord, parent: Option<NodeId>, index: usize) -> Self {
        let (grouped_properties, named_properties) = index_properties(&record.properties);
        Self {
            hash: record.hash,
            name: record.name,
            index,
            id: record.id,
            preview_box: record.preview_box,
            display_info: record.display_info,
            forced_state: ForcedState::None,
            properties: record.properties,
            grouped_properties,
            named_properties,
            parent,
            children: Vec::new(),
            is_parent_visible: true,
            is_drawn: false,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn properties(&self) -> &[ViewProperty] {
        &self.properties
    }

    pub fn grouped_properties(&self) -> &GroupedProperties {
        &self.grouped_properties
    }

    pub fn named_properties(&self) -> &NamedProperties {
        &self.named_properties
    }

    /// Looks up `name`, then each alternate in order.
    pub fn get_property(&self, name: &str, alt_names: &[&str]) -> Option<&ViewProperty> {
        std::iter::once(name)
            .chain(alt_names.iter().copied())
            .find_map(|key| self.named_properties.get(key))
    }

    pub fn is_parent_visible(&self) -> bool {
        self.is_parent_visible
    }

    pub fn is_drawn(&self) -> bool {
        self.is_drawn
    }

    pub fn property_table(&self) -> PropertyTable {
        PropertyTable::new(&self.properties, &self.grouped_properties)
    }
}

impl fmt::Display for ViewNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.hash)
    }
}

/// A single-rooted view hierarchy. Nodes live in an arena; parent links are indices.
#[derive(Debug, Clone)]
pub struct ViewTree {
    nodes: Vec<ViewNode>,
}

impl ViewTree {
    pub(crate) fn with_root(record: NodeRecord) -> Self {
        Self {
            nodes: vec![ViewNode::from_record(record, None, 0)],
        }
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, record: NodeRecord) -> NodeId {
        let id = NodeId(self.nodes.len());
        let index = self.nodes[parent.0].children.len();
        self.nodes.push(ViewNode::from_record(record, Some(parent), index));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ViewNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ViewNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ViewNode> {
        self.nodes.get(id.0)
    }

    /// Child `child_index` of `id`, if any.
    pub fn child(&self, id: NodeId, child_index: usize) -> Option<NodeId> {
        self.node(id).children.get(child_index).copied()
    }

    /// Node ids in pre-order: parents first, children in dump order.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root())
    }

    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.node(id).parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.node(parent).parent;
        }
        depth
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        self.path_impl(id, None)
    }

    /// Ids from `ancestor` down to `id`. Falls back to the root when `ancestor`
    /// is not on the parent chain of `id`.
    pub fn path_from(&self, id: NodeId, ancestor: NodeId) -> Vec<NodeId> {
        self.path_impl(id, Some(ancestor))
    }

    fn path_impl(&self, id: NodeId, stop: Option<NodeId>) -> Vec<NodeId> {
        let mut nodes = vec![id];
        let mut cursor = self.node(id).parent;
        while let Some(parent) = cursor {
            if Some(nodes[nodes.len() - 1]) == stop {
                break;
            }
            nodes.push(parent);
            cursor = self.node(parent).parent;
        }
        nodes.reverse();
        nodes
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.hash == hash)
            .map(NodeId)
    }

    /// Resolves a node selector: a hash, `name@hash`, or a child-index path
    /// such as `/`, `/0`, or `/0/2`.
    pub fn select(&self, selector: &str) -> Option<NodeId> {
        let selector = selector.trim();
        if let Some(path) = selector.strip_prefix('/') {
            let mut cursor = self.root();
            for step in path.split('/').filter(|s| !s.is_empty()) {
                let index = step.parse::<usize>().ok()?;
                cursor = self.child(cursor, index)?;
            }
            return Some(cursor);
        }
        match selector.rsplit_once('@') {
            Some((name, hash)) => self
                .find_by_hash(hash)
                .filter(|id| self.node(*id).name == name),
            None => self.find_by_hash(selector),
        }
    }

    /// Recomputes draw state for the whole tree, seeding from the root's stored
    /// parent visibility.
    pub fn update_node_drawn(&mut self) {
        let root = self.root();
        let seed = self.node(root).is_parent_visible;
        self.update_node_drawn_from(root, seed);
    }

    /// Recomputes `is_parent_visible` and `is_drawn` for the subtree at `start`.
    ///
    /// A node draws itself when it is visible, allowed to draw, and its parent
    /// is visible; a forced override replaces the captured flags. Afterwards a
    /// node also counts as drawn when any visible direct child is drawn.
    pub fn update_node_drawn_from(&mut self, start: NodeId, parent_visible: bool) {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(start, parent_visible)];
        while let Some((id, parent_visible)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.is_parent_visible = parent_visible;
            let child_seed = match node.forced_state {
                ForcedState::None => {
                    let info = &node.display_info;
                    node.is_drawn = !info.will_not_draw && parent_visible && info.is_visible;
                    parent_visible && info.is_visible
                }
                forced => {
                    node.is_drawn = forced == ForcedState::Visible && parent_visible;
                    node.is_drawn
                }
            };
            order.push(id);
            stack.extend(node.children.iter().rev().map(|child| (*child, child_seed)));
        }

        // Reverse pre-order visits every child before its parent.
        for &id in order.iter().rev() {
            let drawn_child = self.nodes[id.0].children.iter().any(|child| {
                let child = &self.nodes[child.0];
                child.is_drawn && child.display_info.is_visible
            });
            if drawn_child {
                self.nodes[id.0].is_drawn = true;
            }
        }
    }

    /// Stores a visibility override and re-runs propagation over the whole tree.
    pub fn set_forced_state(&mut self, id: NodeId, state: ForcedState) {
        self.nodes[id.0].forced_state = state;
        self.update_node_drawn();
    }

    /// One flat JSON row for `id`; `parent` is the parent's node index.
    pub fn node_value(&self, id: NodeId, depth: usize) -> Value {
        let node = self.node(id);
        json!({
            "index_in_tree": id.index(),
            "parent": node.parent.map(NodeId::index),
            "depth": depth,
            "name": node.name,
            "hash": node.hash,
            "index": node.index,
            "id": node.id,
            "preview_box": node.preview_box,
            "visible": node.display_info.is_visible,
            "will_not_draw": node.display_info.will_not_draw,
            "forced_state": node.forced_state,
            "parent_visible": node.is_parent_visible,
            "drawn": node.is_drawn,
            "child_count": node.children.len(),
        })
    }

    /// Pre-order `(id, depth)` pairs from the root.
    pub fn preorder_with_depth(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), 0)];
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(self.node(id).children.iter().rev().map(|c| (*c, depth + 1)));
        }
        out
    }

    /// The whole tree as a flat pre-order array of rows linked by `parent`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.preorder_with_depth()
                .into_iter()
                .map(|(id, depth)| self.node_value(id, depth))
                .collect(),
        )
    }
}
