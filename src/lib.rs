pub mod config;
pub mod graph;
pub mod layout;
pub mod render;
pub mod routing;
#[cfg(feature = "server")]
pub mod serve;
pub mod session;
pub mod traversal;
pub mod viewport;

pub use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

pub use config::{Config, ConfigError, Theme};
pub use graph::{GraphError, GraphSeed, GraphStore};
pub use layout::{Layout, compute_layout, fit_to_screen};
pub use render::{Frame, NodeTone, render_png, render_svg};
pub use routing::{Arrowhead, EdgeGeometry, EdgePair, EdgePath, classify_edges};
pub use session::{Command, GraphSession, PointerButton, SessionError, Summary};
pub use traversal::{StepOutcome, TraversalEngine, TraversalKind, TraversalSnapshot};
pub use viewport::ViewportTransform;

pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::new();
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
