use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::RoutingConfig;
use crate::{GraphStore, NodeId, Point, ViewportTransform};

const MIN_UNI_CURVATURE: f32 = 12.0;
const MIN_BI_CURVATURE: f32 = 16.0;
const SLOPE_CURVATURE: f32 = 6.0;
const BI_CURVATURE_STEP: f32 = 3.0;
const STRAIGHT_ARROW_MIN: f32 = 10.0;
const STRAIGHT_ARROW_SCALE: f32 = 9.0;
const CURVED_ARROW_MIN: f32 = 9.0;
const CURVED_ARROW_SCALE: f32 = 8.5;

/// A directed edge, or both directions of an unordered node pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EdgePair {
    Uni { from: NodeId, to: NodeId },
    Bi { a: NodeId, b: NodeId },
}

impl EdgePair {
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        match *self {
            EdgePair::Uni { from, to } => (from, to),
            EdgePair::Bi { a, b } => (a, b),
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        let (first, second) = self.endpoints();
        first == node || second == node
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EdgePath {
    Straight {
        start: Point,
        end: Point,
    },
    Quadratic {
        start: Point,
        control: Point,
        end: Point,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Arrowhead {
    pub tip: Point,
    pub left: Point,
    pub right: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeGeometry {
    pub pair: EdgePair,
    pub path: EdgePath,
    pub arrows: Vec<Arrowhead>,
}

/// Groups every directed edge by unordered pair, in ascending `(min, max)`
/// order.
pub fn classify_edges(graph: &GraphStore) -> Vec<EdgePair> {
    let mut pairs: BTreeMap<(NodeId, NodeId), (bool, bool)> = BTreeMap::new();
    for (from, to) in graph.edges() {
        let a = from.min(to);
        let b = from.max(to);
        let entry = pairs.entry((a, b)).or_insert((false, false));
        if from == a && to == b {
            entry.0 = true;
        }
        if from == b && to == a {
            entry.1 = true;
        }
    }

    pairs
        .into_iter()
        .map(|((a, b), (has_ab, has_ba))| match (has_ab, has_ba) {
            (true, true) => EdgePair::Bi { a, b },
            (true, false) => EdgePair::Uni { from: a, to: b },
            _ => EdgePair::Uni { from: b, to: a },
        })
        .collect()
}

fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Pulls both endpoints back onto the node circles. Near-vertical and
/// near-horizontal edges are trimmed along that axis only so they stay
/// axis-aligned.
pub fn trim_endpoints(p1: Point, p2: Point, radius: f32, dominance: f32) -> (Point, Point) {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let adx = dx.abs();
    let ady = dy.abs();

    if ady >= adx * dominance {
        let offset = sign(dy) * radius;
        return (Point::new(p1.x, p1.y + offset), Point::new(p2.x, p2.y - offset));
    }

    if adx >= ady * dominance {
        let offset = sign(dx) * radius;
        return (Point::new(p1.x + offset, p1.y), Point::new(p2.x - offset, p2.y));
    }

    let dist = non_zero(dx.hypot(dy));
    let ux = dx / dist;
    let uy = dy / dist;
    (
        Point::new(p1.x + ux * radius, p1.y + uy * radius),
        Point::new(p2.x - ux * radius, p2.y - uy * radius),
    )
}

fn non_zero(value: f32) -> f32 {
    if value == 0.0 { 1.0 } else { value }
}

/// Point on the quadratic curve at `t` and its (unnormalized) tangent.
pub fn quad_point_and_tangent(
    start: Point,
    control: Point,
    end: Point,
    t: f32,
) -> (Point, Point) {
    let mt = 1.0 - t;
    let point = Point {
        x: mt * mt * start.x + 2.0 * mt * t * control.x + t * t * end.x,
        y: mt * mt * start.y + 2.0 * mt * t * control.y + t * t * end.y,
    };
    let tangent = Point {
        x: 2.0 * mt * (control.x - start.x) + 2.0 * t * (end.x - control.x),
        y: 2.0 * mt * (control.y - start.y) + 2.0 * t * (end.y - control.y),
    };
    (point, tangent)
}

fn arrowhead(tip: Point, direction: Point, size: f32, half_width: f32, flip: bool) -> Arrowhead {
    let len = non_zero(direction.x.hypot(direction.y));
    let mut ux = direction.x / len;
    let mut uy = direction.y / len;
    if flip {
        ux = -ux;
        uy = -uy;
    }
    let ox = -uy;
    let oy = ux;
    let spread = size * half_width;
    Arrowhead {
        tip,
        left: Point::new(tip.x - ux * size + ox * spread, tip.y - uy * size + oy * spread),
        right: Point::new(tip.x - ux * size - ox * spread, tip.y - uy * size - oy * spread),
    }
}

/// Arrow pointing from `from` to `to`, tip at `to`.
pub fn arrow_on_line(from: Point, to: Point, size: f32, half_width: f32) -> Arrowhead {
    let direction = Point::new(to.x - from.x, to.y - from.y);
    arrowhead(to, direction, size, half_width, false)
}

pub fn arrow_on_quad(
    (start, control, end): (Point, Point, Point),
    t: f32,
    size: f32,
    half_width: f32,
    flip: bool,
) -> Arrowhead {
    let (tip, tangent) = quad_point_and_tangent(start, control, end, t);
    arrowhead(tip, tangent, size, half_width, flip)
}

pub fn node_radius(scale: f32, config: &RoutingConfig) -> f32 {
    config.min_radius.max(config.base_radius * scale)
}

/// Screen-space geometry for one edge pair. `None` when either endpoint has
/// no position.
pub fn route_edge(
    pair: EdgePair,
    positions: &BTreeMap<NodeId, Point>,
    view: &ViewportTransform,
    config: &RoutingConfig,
) -> Option<EdgeGeometry> {
    let (first, second) = pair.endpoints();
    let p1 = view.world_to_screen(*positions.get(&first)?);
    let p2 = view.world_to_screen(*positions.get(&second)?);
    let radius = node_radius(view.scale, config);
    let (start, end) = trim_endpoints(p1, p2, radius, config.dominance_ratio);
    let half = config.arrow_half_width;

    if config.hub.is_some_and(|hub| pair.touches(hub)) {
        let size = STRAIGHT_ARROW_MIN.max(STRAIGHT_ARROW_SCALE * view.scale);
        let mut arrows = vec![arrow_on_line(start, end, size, half)];
        if matches!(pair, EdgePair::Bi { .. }) {
            arrows.push(arrow_on_line(end, start, size, half));
        }
        return Some(EdgeGeometry {
            pair,
            path: EdgePath::Straight { start, end },
            arrows,
        });
    }

    let mid = start.midpoint(end);
    let pdx = end.x - start.x;
    let pdy = end.y - start.y;
    let pdist = non_zero(pdx.hypot(pdy));
    let perp_x = -pdy / pdist;
    let perp_y = pdx / pdist;
    let base = config.max_curvature.min(pdist * config.curvature_per_length);

    let (magnitude, direction) = match pair {
        EdgePair::Uni { from, to } => {
            let center_dist = non_zero((p2.x - p1.x).hypot(p2.y - p1.y));
            let slope = (p2.y - p1.y).abs() / center_dist;
            let magnitude = MIN_UNI_CURVATURE.max(base + slope * SLOPE_CURVATURE);
            let direction = if from % 2 == to % 2 { 1.0 } else { -1.0 };
            (magnitude, direction)
        }
        EdgePair::Bi { a, b } => {
            let magnitude = MIN_BI_CURVATURE.max(base + (a.abs_diff(b) % 5) as f32 * BI_CURVATURE_STEP);
            let direction = if a > b { 1.0 } else { -1.0 };
            (magnitude, direction)
        }
    };

    let control = Point::new(
        mid.x + perp_x * magnitude * direction,
        mid.y + perp_y * magnitude * direction,
    );
    let curve = (start, control, end);
    let size = CURVED_ARROW_MIN.max(CURVED_ARROW_SCALE * view.scale);

    let arrows = match pair {
        EdgePair::Uni { .. } => vec![arrow_on_quad(curve, config.uni_arrow_t, size, half, false)],
        EdgePair::Bi { .. } => vec![
            arrow_on_quad(curve, config.bi_forward_arrow_t, size, half, false),
            arrow_on_quad(curve, config.bi_reverse_arrow_t, size, half, true),
        ],
    };

    Some(EdgeGeometry {
        pair,
        path: EdgePath::Quadratic {
            start,
            control,
            end,
        },
        arrows,
    })
}

pub fn route_edges(
    graph: &GraphStore,
    positions: &BTreeMap<NodeId, Point>,
    view: &ViewportTransform,
    config: &RoutingConfig,
) -> Vec<EdgeGeometry> {
    classify_edges(graph)
        .into_iter()
        .filter_map(|pair| route_edge(pair, positions, view, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphSeed;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    fn two_node_positions(p1: Point, p2: Point) -> BTreeMap<NodeId, Point> {
        BTreeMap::from([(1, p1), (2, p2)])
    }

    #[test]
    fn classification_distinguishes_pairs() {
        let graph = GraphStore::new(GraphSeed::new(
            1..=4,
            &[(1, 2), (2, 1), (4, 3), (2, 3)],
        ))
        .unwrap();
        assert_eq!(
            classify_edges(&graph),
            vec![
                EdgePair::Bi { a: 1, b: 2 },
                EdgePair::Uni { from: 2, to: 3 },
                EdgePair::Uni { from: 4, to: 3 },
            ]
        );
    }

    #[test]
    fn trimming_follows_dominant_axis() {
        let (start, end) = trim_endpoints(Point::new(0.0, 0.0), Point::new(10.0, 100.0), 20.0, 1.15);
        assert_eq!(start, Point::new(0.0, 20.0));
        assert_eq!(end, Point::new(10.0, 80.0));

        let (start, end) = trim_endpoints(Point::new(100.0, 0.0), Point::new(0.0, 5.0), 20.0, 1.15);
        assert_eq!(start, Point::new(80.0, 0.0));
        assert_eq!(end, Point::new(20.0, 5.0));

        let radius = 5.0 * 2.0_f32.sqrt();
        let (start, end) = trim_endpoints(Point::new(0.0, 0.0), Point::new(40.0, 40.0), radius, 1.15);
        assert!(close(start, Point::new(5.0, 5.0)));
        assert!(close(end, Point::new(35.0, 35.0)));
    }

    #[test]
    fn coincident_nodes_are_not_trimmed() {
        let (start, end) = trim_endpoints(Point::new(5.0, 5.0), Point::new(5.0, 5.0), 20.0, 1.15);
        assert_eq!(start, Point::new(5.0, 5.0));
        assert_eq!(end, Point::new(5.0, 5.0));
    }

    #[test]
    fn hub_pairs_are_straight_with_arrow_per_direction() {
        let positions = two_node_positions(Point::new(0.0, 0.0), Point::new(0.0, 200.0));
        let view = ViewportTransform::default();
        let geometry = route_edge(
            EdgePair::Bi { a: 1, b: 2 },
            &positions,
            &view,
            &RoutingConfig::default(),
        )
        .unwrap();

        let EdgePath::Straight { start, end } = geometry.path else {
            panic!("hub edge should be straight");
        };
        assert_eq!(start, Point::new(0.0, 22.0));
        assert_eq!(end, Point::new(0.0, 178.0));
        assert_eq!(geometry.arrows.len(), 2);
        assert_eq!(geometry.arrows[0].tip, end);
        assert_eq!(geometry.arrows[1].tip, start);
        assert!(geometry.arrows[0].left.y < end.y);
        assert!(geometry.arrows[1].left.y > start.y);
    }

    #[test]
    fn bidirectional_curve_gets_flipped_reverse_arrow() {
        let positions = two_node_positions(Point::new(0.0, 0.0), Point::new(300.0, 0.0));
        let config = RoutingConfig {
            hub: None,
            ..RoutingConfig::default()
        };
        let geometry = route_edge(
            EdgePair::Bi { a: 1, b: 2 },
            &positions,
            &ViewportTransform::default(),
            &config,
        )
        .unwrap();

        let EdgePath::Quadratic { start, control, end } = geometry.path else {
            panic!("non-hub pair should curve");
        };
        // a < b bends to the negative perpendicular.
        assert!(control.y < 0.0);
        assert_eq!(geometry.arrows.len(), 2);

        let (forward_tip, _) = quad_point_and_tangent(start, control, end, 0.78);
        let (reverse_tip, _) = quad_point_and_tangent(start, control, end, 0.22);
        assert!(close(geometry.arrows[0].tip, forward_tip));
        assert!(close(geometry.arrows[1].tip, reverse_tip));
        // The forward head points right, the reverse head points left.
        assert!(geometry.arrows[0].left.x < forward_tip.x);
        assert!(geometry.arrows[1].left.x > reverse_tip.x);
    }

    #[test]
    fn unidirectional_curve_side_follows_parity() {
        let positions = BTreeMap::from([
            (2, Point::new(0.0, 0.0)),
            (3, Point::new(300.0, 0.0)),
            (4, Point::new(0.0, 0.0)),
        ]);
        let view = ViewportTransform::default();
        let config = RoutingConfig::default();

        let odd = route_edge(EdgePair::Uni { from: 2, to: 3 }, &positions, &view, &config).unwrap();
        let EdgePath::Quadratic { control: odd_control, .. } = odd.path else {
            panic!("expected curve");
        };
        assert!(odd_control.y < 0.0);
        assert_eq!(odd.arrows.len(), 1);

        let positions = BTreeMap::from([(4, Point::new(0.0, 0.0)), (2, Point::new(300.0, 0.0))]);
        let even = route_edge(EdgePair::Uni { from: 4, to: 2 }, &positions, &view, &config).unwrap();
        let EdgePath::Quadratic { control: even_control, .. } = even.path else {
            panic!("expected curve");
        };
        assert!(even_control.y > 0.0);
        // Horizontal edge: base = 0.08 * 256 = 20.48, no slope term.
        assert!((even_control.y - 20.48).abs() < 1e-3);
    }

    #[test]
    fn unidirectional_arrow_sits_near_the_head() {
        let positions = BTreeMap::from([(2, Point::new(0.0, 0.0)), (3, Point::new(300.0, 0.0))]);
        let geometry = route_edge(
            EdgePair::Uni { from: 2, to: 3 },
            &positions,
            &ViewportTransform::default(),
            &RoutingConfig::default(),
        )
        .unwrap();

        let EdgePath::Quadratic { start, control, end } = geometry.path else {
            panic!("expected curve");
        };
        let (tip, _) = quad_point_and_tangent(start, control, end, 0.88);
        assert_eq!(geometry.arrows.len(), 1);
        assert!(close(geometry.arrows[0].tip, tip));
        assert!(geometry.arrows[0].left.x < tip.x);
    }

    #[test]
    fn diagonal_edges_bend_further_with_slope() {
        let positions = BTreeMap::from([(2, Point::new(0.0, 0.0)), (4, Point::new(300.0, 400.0))]);
        let geometry = route_edge(
            EdgePair::Uni { from: 2, to: 4 },
            &positions,
            &ViewportTransform::default(),
            &RoutingConfig::default(),
        )
        .unwrap();

        let EdgePath::Quadratic { start, control, end } = geometry.path else {
            panic!("expected curve");
        };
        // Vertical-dominant trim keeps x, so the trimmed chord is (300, 356).
        assert_eq!(start, Point::new(0.0, 22.0));
        assert_eq!(end, Point::new(300.0, 378.0));
        let chord = 300.0_f32.hypot(356.0);
        // |dy| / dist between centers is 400 / 500.
        let expected = 0.08 * chord + 0.8 * 6.0;

        let mid = start.midpoint(end);
        assert!((mid.distance(control) - expected).abs() < 1e-3);
        // Same parity bends toward (-dy, dx).
        assert!(control.x < mid.x);
        assert!(control.y > mid.y);
    }

    #[test]
    fn bidirectional_magnitude_grows_with_id_gap() {
        let positions = BTreeMap::from([(2, Point::new(0.0, 0.0)), (5, Point::new(300.0, 0.0))]);
        let geometry = route_edge(
            EdgePair::Bi { a: 2, b: 5 },
            &positions,
            &ViewportTransform::default(),
            &RoutingConfig::default(),
        )
        .unwrap();

        let EdgePath::Quadratic { control, .. } = geometry.path else {
            panic!("expected curve");
        };
        // 0.08 * 256 plus (3 % 5) * 3, bent to the negative side.
        assert!(close(control, Point::new(150.0, -(20.48 + 9.0))));
    }

    #[test]
    fn missing_position_skips_edge() {
        let positions = BTreeMap::from([(1, Point::new(0.0, 0.0))]);
        assert!(
            route_edge(
                EdgePair::Uni { from: 1, to: 2 },
                &positions,
                &ViewportTransform::default(),
                &RoutingConfig::default()
            )
            .is_none()
        );
    }

    #[test]
    fn arrowhead_is_isosceles() {
        let arrow = arrow_on_line(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 10.0, 0.45);
        assert_eq!(arrow.tip, Point::new(100.0, 0.0));
        assert!(close(arrow.left, Point::new(90.0, 4.5)));
        assert!(close(arrow.right, Point::new(90.0, -4.5)));
    }
}
