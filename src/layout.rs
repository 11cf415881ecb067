use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::config::{FitConfig, LayoutConfig};
use crate::{GraphStore, NodeId, Point, ViewportTransform};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub positions: BTreeMap<NodeId, Point>,
    pub levels: BTreeMap<NodeId, usize>,
}

/// Hop distance from `root` along outgoing edges. Nodes the BFS never
/// reaches are stacked one per level below the deepest reached level.
pub fn bfs_levels(graph: &GraphStore, root: NodeId) -> BTreeMap<NodeId, usize> {
    let mut levels: BTreeMap<NodeId, usize> = BTreeMap::new();

    if graph.contains_node(root) {
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        levels.insert(root, 0);
        queue.push_back(root);

        while let Some(node) = queue.pop_front() {
            let level = levels.get(&node).copied().unwrap_or(0);
            for next in graph.successors(node) {
                if let Entry::Vacant(entry) = levels.entry(next) {
                    entry.insert(level + 1);
                    queue.push_back(next);
                }
            }
        }
    }

    let mut next_level = levels.values().max().map_or(1, |max| max + 1);
    for &node in graph.nodes() {
        if !levels.contains_key(&node) {
            levels.insert(node, next_level);
            next_level += 1;
        }
    }

    levels
}

pub fn compute_layout(graph: &GraphStore, config: &LayoutConfig) -> Layout {
    let levels = bfs_levels(graph, config.root);

    let mut layers: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for (&node, &level) in &levels {
        layers.entry(level).or_default().push(node);
    }

    let mut spread_nodes = graph.descendants(&config.special_roots);
    spread_nodes.extend(config.special_roots.iter().copied());

    let mut positions = BTreeMap::new();
    for (&level, nodes) in &mut layers {
        nodes.sort_unstable();
        let center = (nodes.len() as f32 - 1.0) / 2.0;
        let y = level as f32 * config.y_gap;

        for (idx, &node) in nodes.iter().enumerate() {
            let mut x = (idx as f32 - center) * config.x_gap;
            if spread_nodes.contains(&node) {
                x += (idx as f32 - center) * config.x_gap * config.spread;
            }
            positions.insert(node, Point { x, y });
        }
    }

    let max_level = layers.keys().next_back().copied().unwrap_or(0);
    for &node in graph.nodes() {
        positions.entry(node).or_insert(Point {
            x: 0.0,
            y: (max_level + 1) as f32 * config.y_gap + config.fallback_drop,
        });
    }

    Layout { positions, levels }
}

/// Transform that centers every position inside a `width` x `height`
/// viewport. Returns `None` when there is nothing to fit.
pub fn fit_to_screen(
    positions: &BTreeMap<NodeId, Point>,
    width: f32,
    height: f32,
    bounds: (f32, f32),
    config: &FitConfig,
) -> Option<ViewportTransform> {
    if positions.is_empty() {
        return None;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for point in positions.values() {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    let pad = config.node_radius + config.margin;
    min_x -= pad;
    min_y -= pad;
    max_x += pad;
    max_y += pad;

    let world_width = (max_x - min_x).max(config.min_world_width);
    let world_height = (max_y - min_y).max(config.min_world_height);
    let canvas_width = width.max(config.min_viewport_width);
    let canvas_height = height.max(config.min_viewport_height);

    let mut view = ViewportTransform::with_bounds(bounds.0, bounds.1);
    let scale = (canvas_width / world_width).min(canvas_height / world_height)
        * config.shrink
        * config.bias;
    view.scale = view.clamp_scale(scale);

    let center_x = (min_x + max_x) / 2.0;
    let center_y = (min_y + max_y) / 2.0;
    view.tx = canvas_width / 2.0 - view.scale * center_x;
    view.ty = canvas_height / 2.0 - view.scale * center_y;

    Some(view)
}
