//! Preview geometry: where each view lands on the preview image, and which
//! views sit under a given point.

use crate::node::{NodeId, Rect, ViewTree};

const FIT_MARGIN: f32 = 20.0;

/// Recomputes every node's `preview_box` for a preview drawn at `draw_scale`.
///
/// The root is placed at the origin. Children are offset by their parent's
/// position minus its scroll, plus their own translation; view scale factors
/// compound down the tree and shrink boxes around their centre.
pub fn compute_preview_boxes(tree: &mut ViewTree, draw_scale: f32) {
    let root = tree.root();
    let mut stack: Vec<(NodeId, f32, f32, f32, f32)> = vec![(root, 0.0, 0.0, 1.0, 1.0)];
    while let Some((id, left_shift, top_shift, scale_x, scale_y)) = stack.pop() {
        let node = tree.node_mut(id);
        let info = &node.display_info;
        let (left, top) = if id == root {
            (0.0, 0.0)
        } else {
            (info.left as f32, info.top as f32)
        };
        let (width, height) = (info.width as f32, info.height as f32);
        let new_scale_x = scale_x * info.scale_x;
        let new_scale_y = scale_y * info.scale_y;

        let l = left_shift + (left + info.translate_x) * scale_x + width * (scale_x - new_scale_x) / 2.0;
        let t = top_shift + (top + info.translate_y) * scale_y + height * (scale_y - new_scale_y) / 2.0;
        let child_left = l - info.scroll_x as f32 * new_scale_x;
        let child_top = t - info.scroll_y as f32 * new_scale_y;

        node.preview_box = Rect::new(
            (l * draw_scale) as i32,
            (t * draw_scale) as i32,
            (width * new_scale_x * draw_scale) as i32,
            (height * new_scale_y * draw_scale) as i32,
        );
        stack.extend(
            node.children()
                .iter()
                .map(|child| (*child, child_left, child_top, new_scale_x, new_scale_y)),
        );
    }
}

/// Largest scale that fits the root view into `width` x `height` with a margin.
pub fn fit_scale(tree: &ViewTree, width: u32, height: u32) -> f32 {
    let info = &tree.node(tree.root()).display_info;
    if info.width <= 0 || info.height <= 0 {
        return 1.0;
    }
    let avail_w = (width as f32 - FIT_MARGIN).max(1.0);
    let avail_h = (height as f32 - FIT_MARGIN).max(1.0);
    (avail_w / info.width as f32).min(avail_h / info.height as f32)
}

/// Drawn views whose preview box contains `(x, y)`, smallest area first.
///
/// Views that clip their children restrict the hit area of their subtree.
pub fn nodes_at(tree: &ViewTree, x: i32, y: i32) -> Vec<NodeId> {
    let root_box = tree.node(tree.root()).preview_box;
    if !root_box.contains(x, y) {
        return Vec::new();
    }

    let mut hits = Vec::new();
    let mut stack = vec![(tree.root(), 0, 0, root_box.width, root_box.height)];
    while let Some((id, mut clip_x1, mut clip_y1, mut clip_x2, mut clip_y2)) = stack.pop() {
        let node = tree.node(id);
        if !node.is_drawn() {
            continue;
        }
        let bounds = node.preview_box;
        if node.display_info.clip_children {
            clip_x1 = clip_x1.max(bounds.x);
            clip_y1 = clip_y1.max(bounds.y);
            clip_x2 = clip_x2.min(bounds.right());
            clip_y2 = clip_y2.min(bounds.bottom());
        }
        if x < clip_x1 || x > clip_x2 || y < clip_y1 || y > clip_y2 {
            continue;
        }
        if bounds.contains(x, y) {
            hits.push(id);
        }
        stack.extend(
            node.children()
                .iter()
                .rev()
                .map(|child| (*child, clip_x1, clip_y1, clip_x2, clip_y2)),
        );
    }

    hits.sort_by_key(|id| (tree.node(*id).preview_box.area(), *id));
    hits
}
