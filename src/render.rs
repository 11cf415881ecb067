use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as FmtWrite;

use serde::Serialize;
use tiny_skia::{Pixmap, Transform};

use crate::config::RoutingConfig;
use crate::routing::{EdgeGeometry, EdgePath, route_edges};
use crate::*;

const NODE_RADIUS_MIN: f32 = 14.0;
const NODE_RADIUS_MAX: f32 = 36.0;
const NODE_RADIUS_BASE: f32 = 22.0;
const LABEL_FONT_MIN: f32 = 11.0;
const LABEL_FONT_BASE: f32 = 12.0;

/// Display category of a node, resolved by priority
/// selected > active > visited > default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeTone {
    Default,
    Visited,
    Active,
    Selected,
}

impl NodeTone {
    pub fn resolve(
        node: NodeId,
        selected: &[NodeId],
        active: Option<&BTreeSet<NodeId>>,
        visited: &BTreeSet<NodeId>,
    ) -> Self {
        if selected.contains(&node) {
            NodeTone::Selected
        } else if active.is_some_and(|layer| layer.contains(&node)) {
            NodeTone::Active
        } else if visited.contains(&node) {
            NodeTone::Visited
        } else {
            NodeTone::Default
        }
    }

    pub fn fill<'t>(&self, theme: &'t Theme) -> &'t str {
        match self {
            NodeTone::Default => &theme.node_default,
            NodeTone::Visited => &theme.node_visited,
            NodeTone::Active => &theme.node_active,
            NodeTone::Selected => &theme.node_selected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeFrame {
    pub id: NodeId,
    pub world: Point,
    pub screen: Point,
    pub radius: f32,
    pub tone: NodeTone,
}

/// Everything a drawing surface needs for one pass, in screen space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
    pub transform: ViewportTransform,
    pub nodes: Vec<NodeFrame>,
    pub edges: Vec<EdgeGeometry>,
}

pub struct FrameSource<'a> {
    pub graph: &'a GraphStore,
    pub positions: &'a BTreeMap<NodeId, Point>,
    pub view: &'a ViewportTransform,
    pub selected: &'a [NodeId],
    pub active: Option<&'a BTreeSet<NodeId>>,
    pub visited: &'a BTreeSet<NodeId>,
    pub routing: &'a RoutingConfig,
    pub size: (f32, f32),
}

impl Frame {
    pub fn build(source: FrameSource<'_>) -> Self {
        let radius = (NODE_RADIUS_BASE * source.view.scale).clamp(NODE_RADIUS_MIN, NODE_RADIUS_MAX);

        let nodes = source
            .graph
            .nodes()
            .iter()
            .filter_map(|&id| {
                let world = *source.positions.get(&id)?;
                Some(NodeFrame {
                    id,
                    world,
                    screen: source.view.world_to_screen(world),
                    radius,
                    tone: NodeTone::resolve(id, source.selected, source.active, source.visited),
                })
            })
            .collect();

        let edges = route_edges(source.graph, source.positions, source.view, source.routing);

        Frame {
            width: source.size.0,
            height: source.size.1,
            transform: *source.view,
            nodes,
            edges,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeFrame> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

fn stroke_width(scale: f32, straight: bool) -> f32 {
    if straight {
        (2.0 * scale * 0.25).max(1.2)
    } else {
        (1.6 * scale * 0.25).max(1.0)
    }
}

pub fn render_svg(frame: &Frame, theme: &Theme, background: &str) -> Result<String> {
    let scale = frame.transform.scale;
    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <rect width="100%" height="100%" fill="{}" />
"##,
        frame.width,
        frame.height,
        frame.width,
        frame.height,
        escape_xml(background)
    )?;

    for edge in &frame.edges {
        let (from, to) = edge.pair.endpoints();
        match edge.path {
            EdgePath::Straight { start, end } => write!(
                svg,
                "  <line data-from=\"{}\" data-to=\"{}\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{:.2}\" />\n",
                from,
                to,
                start.x,
                start.y,
                end.x,
                end.y,
                escape_xml(&theme.edge),
                stroke_width(scale, true)
            )?,
            EdgePath::Quadratic {
                start,
                control,
                end,
            } => write!(
                svg,
                "  <path data-from=\"{}\" data-to=\"{}\" d=\"M{:.1},{:.1} Q{:.1},{:.1} {:.1},{:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{:.2}\" />\n",
                from,
                to,
                start.x,
                start.y,
                control.x,
                control.y,
                end.x,
                end.y,
                escape_xml(&theme.edge),
                stroke_width(scale, false)
            )?,
        }

        for arrow in &edge.arrows {
            write!(
                svg,
                "  <polygon class=\"arrow\" points=\"{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{:.1}\" stroke-linejoin=\"round\" />\n",
                arrow.tip.x,
                arrow.tip.y,
                arrow.left.x,
                arrow.left.y,
                arrow.right.x,
                arrow.right.y,
                escape_xml(&theme.arrow_fill),
                escape_xml(&theme.arrow_stroke),
                (1.8 * scale).round().max(1.6)
            )?;
        }
    }

    let font_size = (LABEL_FONT_BASE * scale).round().max(LABEL_FONT_MIN);
    for node in &frame.nodes {
        write!(
            svg,
            "  <circle data-node=\"{}\" data-tone=\"{}\" cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.1}\" fill=\"{}\" />\n",
            node.id,
            tone_name(node.tone),
            node.screen.x,
            node.screen.y,
            node.radius,
            escape_xml(node.tone.fill(theme))
        )?;
        write!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"{:.0}\" font-weight=\"bold\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
            node.screen.x,
            node.screen.y,
            escape_xml(&theme.node_label),
            font_size,
            node.id
        )?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

fn tone_name(tone: NodeTone) -> &'static str {
    match tone {
        NodeTone::Default => "default",
        NodeTone::Visited => "visited",
        NodeTone::Active => "active",
        NodeTone::Selected => "selected",
    }
}

pub fn render_png(svg: &str, scale: f32) -> Result<Vec<u8>> {
    if scale <= 0.0 {
        bail!("scale must be greater than zero when rendering PNG output");
    }

    let mut options = resvg::usvg::Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = resvg::usvg::Tree::from_str(svg, &options)
        .map_err(|err| anyhow!("failed to parse generated SVG for PNG export: {err}"))?;

    let size = tree.size().to_int_size();
    let scaled_width = ((size.width() as f32) * scale).ceil();
    let scaled_height = ((size.height() as f32) * scale).ceil();

    if !scaled_width.is_finite() || !scaled_height.is_finite() {
        bail!("scaled dimensions are not finite; try a smaller scale factor");
    }

    if scaled_width < 1.0 || scaled_height < 1.0 {
        bail!("scaled dimensions collapsed below 1px; try a larger scale factor");
    }

    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        bail!("scaled dimensions exceed supported limits; try a smaller scale factor");
    }

    let scaled_width = scaled_width as u32;
    let scaled_height = scaled_height as u32;

    let mut pixmap = Pixmap::new(scaled_width, scaled_height).ok_or_else(|| {
        anyhow!("failed to allocate {scaled_width}x{scaled_height} surface for PNG export")
    })?;

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| anyhow!("failed to encode PNG output: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_priority_prefers_selection() {
        let visited = BTreeSet::from([1, 2, 3]);
        let active = BTreeSet::from([2, 3]);
        assert_eq!(NodeTone::resolve(3, &[3], Some(&active), &visited), NodeTone::Selected);
        assert_eq!(NodeTone::resolve(2, &[3], Some(&active), &visited), NodeTone::Active);
        assert_eq!(NodeTone::resolve(1, &[3], Some(&active), &visited), NodeTone::Visited);
        assert_eq!(NodeTone::resolve(4, &[3], Some(&active), &visited), NodeTone::Default);
        assert_eq!(NodeTone::resolve(2, &[], None, &visited), NodeTone::Visited);
    }

    fn two_node_frame() -> Frame {
        let graph = GraphStore::new(GraphSeed::new(1..=2, &[(1, 2), (2, 1)])).unwrap();
        let positions = BTreeMap::from([(1, Point::new(0.0, 0.0)), (2, Point::new(0.0, 140.0))]);
        let view = ViewportTransform {
            tx: 300.0,
            ty: 100.0,
            ..ViewportTransform::default()
        };
        Frame::build(FrameSource {
            graph: &graph,
            positions: &positions,
            view: &view,
            selected: &[2],
            active: None,
            visited: &BTreeSet::from([1]),
            routing: &RoutingConfig::default(),
            size: (600.0, 400.0),
        })
    }

    #[test]
    fn frame_carries_tones_and_edges() {
        let frame = two_node_frame();
        assert_eq!(frame.nodes.len(), 2);
        assert_eq!(frame.node(1).map(|n| n.tone), Some(NodeTone::Visited));
        assert_eq!(frame.node(2).map(|n| n.tone), Some(NodeTone::Selected));
        assert_eq!(frame.node(2).map(|n| n.screen), Some(Point::new(300.0, 240.0)));
        assert_eq!(frame.edges.len(), 1);
        assert_eq!(frame.edges[0].arrows.len(), 2);
    }

    #[test]
    fn svg_contains_nodes_edges_and_arrows() -> Result<()> {
        let frame = two_node_frame();
        let svg = render_svg(&frame, &Theme::default(), "white")?;

        assert!(svg.contains("<svg"));
        assert!(svg.contains("data-node=\"1\" data-tone=\"visited\""));
        assert!(svg.contains("data-node=\"2\" data-tone=\"selected\""));
        assert!(svg.contains("<line data-from=\"1\" data-to=\"2\""));
        assert_eq!(svg.matches("class=\"arrow\"").count(), 2);
        assert!(svg.contains("#43aa8b"));
        Ok(())
    }

    #[test]
    fn png_rejects_non_positive_scale() {
        assert!(render_png("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"1\" height=\"1\"/>", 0.0).is_err());
    }
}
