use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NodeId;

pub const CONFIG_ENV_VAR: &str = "GRAPHWALK_CONFIG";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub fit: FitConfig,
    pub routing: RoutingConfig,
    pub viewport: ViewportConfig,
    pub traversal: TraversalTiming,
    pub interaction: InteractionConfig,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub root: NodeId,
    pub x_gap: f32,
    pub y_gap: f32,
    /// Roots whose subtrees get pushed away from the level center.
    pub special_roots: Vec<NodeId>,
    pub spread: f32,
    pub fallback_drop: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            root: 1,
            x_gap: 280.0,
            y_gap: 140.0,
            special_roots: vec![18, 20],
            spread: 0.28,
            fallback_drop: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub node_radius: f32,
    pub margin: f32,
    pub min_world_width: f32,
    pub min_world_height: f32,
    pub min_viewport_width: f32,
    pub min_viewport_height: f32,
    pub shrink: f32,
    pub bias: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            node_radius: 20.0,
            margin: 80.0,
            min_world_width: 720.0,
            min_world_height: 520.0,
            min_viewport_width: 600.0,
            min_viewport_height: 420.0,
            shrink: 0.98,
            bias: 1.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Edges touching this node are always drawn straight.
    pub hub: Option<NodeId>,
    pub dominance_ratio: f32,
    pub base_radius: f32,
    pub min_radius: f32,
    pub max_curvature: f32,
    pub curvature_per_length: f32,
    pub arrow_half_width: f32,
    pub uni_arrow_t: f32,
    pub bi_forward_arrow_t: f32,
    pub bi_reverse_arrow_t: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            hub: Some(1),
            dominance_ratio: 1.15,
            base_radius: 22.0,
            min_radius: 14.0,
            max_curvature: 160.0,
            curvature_per_length: 0.08,
            arrow_half_width: 0.45,
            uni_arrow_t: 0.88,
            bi_forward_arrow_t: 0.78,
            bi_reverse_arrow_t: 0.22,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub wheel_sensitivity: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            min_scale: 0.25,
            max_scale: 4.0,
            wheel_sensitivity: 0.0011,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalTiming {
    pub bfs_delay_ms: u64,
    pub dfs_delay_ms: u64,
}

impl TraversalTiming {
    pub fn bfs_delay(&self) -> Duration {
        Duration::from_millis(self.bfs_delay_ms)
    }

    pub fn dfs_delay(&self) -> Duration {
        Duration::from_millis(self.dfs_delay_ms)
    }
}

impl Default for TraversalTiming {
    fn default() -> Self {
        Self {
            bfs_delay_ms: 900,
            dfs_delay_ms: 650,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub hit_radius: f32,
    pub min_hit_radius: f32,
    pub long_press_ms: u64,
}

impl InteractionConfig {
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hit_radius: 34.0,
            min_hit_radius: 20.0,
            long_press_ms: 700,
        }
    }
}

/// Named colors handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub node_default: String,
    pub node_visited: String,
    pub node_active: String,
    pub node_selected: String,
    pub node_label: String,
    pub edge: String,
    pub arrow_fill: String,
    pub arrow_stroke: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            node_default: "#ffd358".to_string(),
            node_visited: "#43aa8b".to_string(),
            node_active: "#e63946".to_string(),
            node_selected: "#3bacf7".to_string(),
            node_label: "#031826".to_string(),
            edge: "#2b9fe9".to_string(),
            arrow_fill: "rgba(255,211,88,0.92)".to_string(),
            arrow_stroke: "rgba(1,30,40,0.95)".to_string(),
        }
    }
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the viewport math panic or divide by
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ViewportConfig {
            min_scale,
            max_scale,
            ..
        } = self.viewport;
        if !(min_scale.is_finite() && max_scale.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "viewport scale bounds must be finite, got {min_scale}..{max_scale}"
            )));
        }
        if min_scale <= 0.0 || min_scale > max_scale {
            return Err(ConfigError::Invalid(format!(
                "viewport scale bounds must satisfy 0 < min_scale <= max_scale, got {min_scale}..{max_scale}"
            )));
        }
        Ok(())
    }

    /// Resolves the config in order: explicit path, `GRAPHWALK_CONFIG`, the
    /// per-user config file when it exists, then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Self::from_path(Path::new(&path));
            }
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "graphwalk").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
