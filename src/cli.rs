use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};
use dialoguer::Select;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "server")]
use graphwalk::serve::{ServeArgs, run_serve};
use graphwalk::{Config, GraphSession, NodeId, StepOutcome, TraversalKind, render_png};

const DEFAULT_OUTPUT_STEM: &str = "graph";

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "graphwalk",
    about = "Render the social graph, optionally mid-traversal, to SVG or PNG."
)]
pub struct RenderArgs {
    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Output format (defaults to the output file extension or svg).
    #[arg(short = 'e', long = "output-format")]
    output_format: Option<OutputFormat>,

    /// Convenience flag to force PNG output without specifying --output-format.
    #[arg(long = "png", action = ArgAction::SetTrue, conflicts_with = "output_format")]
    png: bool,

    /// Scale factor when rasterizing PNG output.
    #[arg(long = "scale", default_value_t = 2.0)]
    scale: f32,

    /// Run a traversal before rendering.
    #[arg(long = "traverse", value_enum)]
    traverse: Option<TraversalKind>,

    /// Start node for --traverse (defaults to the layout root).
    #[arg(long = "start", requires = "traverse")]
    start: Option<NodeId>,

    /// Stop after this many steps so the active layer is still highlighted.
    #[arg(long = "steps", requires = "traverse")]
    steps: Option<usize>,

    /// Remove a directed edge before rendering, written as FROM:TO. Repeatable.
    #[arg(long = "delete", value_parser = parse_edge)]
    delete: Vec<(NodeId, NodeId)>,

    /// Select a node (shown highlighted). Repeatable.
    #[arg(long = "select")]
    select: Vec<NodeId>,

    /// Canvas width in pixels.
    #[arg(long = "width")]
    width: Option<f32>,

    /// Canvas height in pixels.
    #[arg(long = "height")]
    height: Option<f32>,

    /// Background color for the rendered graph.
    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// JSON config file; falls back to GRAPHWALK_CONFIG and the user config dir.
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "graphwalk walk",
    about = "Print a BFS or DFS over the social graph one step at a time."
)]
pub struct WalkArgs {
    /// Traversal to run. Prompts when omitted.
    #[arg(long = "kind", value_enum)]
    kind: Option<TraversalKind>,

    /// Start node (defaults to the layout root).
    #[arg(long = "start")]
    start: Option<NodeId>,

    /// Pause between steps using the configured BFS/DFS delays.
    #[arg(long = "delay", action = ArgAction::SetTrue)]
    delay: bool,

    /// Remove a directed edge before walking, written as FROM:TO. Repeatable.
    #[arg(long = "delete", value_parser = parse_edge)]
    delete: Vec<(NodeId, NodeId)>,

    /// JSON config file; falls back to GRAPHWALK_CONFIG and the user config dir.
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        {
            Some(ext) if ext == "svg" => Some(OutputFormat::Svg),
            Some(ext) if ext == "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

fn parse_edge(raw: &str) -> Result<(NodeId, NodeId), String> {
    let (from, to) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got '{raw}'"))?;
    let from = from
        .trim()
        .parse()
        .map_err(|_| format!("invalid node id '{from}'"))?;
    let to = to
        .trim()
        .parse()
        .map_err(|_| format!("invalid node id '{to}'"))?;
    Ok((from, to))
}

fn select_traversal_kind() -> Result<TraversalKind> {
    let variants = TraversalKind::value_variants();
    let options: Vec<String> = variants
        .iter()
        .map(|kind| match kind {
            TraversalKind::Bfs => "Breadth-first (layer by layer)".to_string(),
            TraversalKind::Dfs => "Depth-first (one node at a time)".to_string(),
        })
        .collect();

    let selection = Select::new()
        .with_prompt("Select traversal")
        .items(&options)
        .default(0)
        .interact()
        .context("traversal selection was cancelled")?;

    Ok(variants[selection])
}

fn build_session(config_path: Option<&Path>, size: (Option<f32>, Option<f32>)) -> Result<GraphSession> {
    let mut config = Config::load(config_path).context("failed to load configuration")?;
    if let Some(width) = size.0 {
        config.viewport.width = width;
    }
    if let Some(height) = size.1 {
        config.viewport.height = height;
    }
    GraphSession::new(config).context("failed to build graph session")
}

fn apply_deletions(session: &mut GraphSession, edges: &[(NodeId, NodeId)], quiet: bool) {
    for &(from, to) in edges {
        if !session.delete_edge(from, to) && !quiet {
            eprintln!("edge {from}:{to} not present; skipped");
        }
    }
}

fn run_render(cli: RenderArgs) -> Result<()> {
    let format_preference = if cli.png {
        Some(OutputFormat::Png)
    } else {
        cli.output_format
    };

    let output_dest = parse_output(cli.output.as_deref(), format_preference)?;
    let format = determine_format(format_preference, &output_dest)?;

    if format == OutputFormat::Png && cli.scale <= 0.0 {
        bail!("--scale must be greater than zero for PNG output");
    }

    let mut session = build_session(cli.config.as_deref(), (cli.width, cli.height))?;
    apply_deletions(&mut session, &cli.delete, cli.quiet);

    if let Some(kind) = cli.traverse {
        let start = cli.start.unwrap_or(session.config().layout.root);
        let generation = session
            .start_traversal_from(kind, start)
            .with_context(|| format!("cannot start {} from node {start}", kind.as_str()))?;
        match cli.steps {
            Some(limit) => {
                for taken in 1..=limit {
                    if !matches!(session.step(generation), StepOutcome::Advanced { .. }) {
                        break;
                    }
                    if taken < limit {
                        session.settle(generation);
                    }
                }
            }
            None => {
                session.drive(generation, |_, _| {});
            }
        }
    }

    for &node in &cli.select {
        session
            .toggle_selection(node)
            .with_context(|| format!("cannot select node {node}"))?;
    }

    let svg = session.render_svg(&cli.background_color)?;
    let output_bytes = match format {
        OutputFormat::Svg => svg.into_bytes(),
        OutputFormat::Png => render_png(&svg, cli.scale)?,
    };

    write_output(output_dest, &output_bytes, cli.quiet)?;

    Ok(())
}

fn run_walk(cli: WalkArgs) -> Result<()> {
    let kind = match cli.kind {
        Some(kind) => kind,
        None => select_traversal_kind()?,
    };

    let mut session = build_session(cli.config.as_deref(), (None, None))?;
    apply_deletions(&mut session, &cli.delete, false);

    let start = cli.start.unwrap_or(session.config().layout.root);
    let generation = session
        .start_traversal_from(kind, start)
        .with_context(|| format!("cannot start {} from node {start}", kind.as_str()))?;

    let total = session.graph().nodes().len();
    let pace = cli.delay;
    let mut stdout = io::stdout();
    let mut failure = None;
    let steps = session.drive(generation, |snapshot, delay| {
        let active: Vec<String> = snapshot
            .active
            .iter()
            .flatten()
            .map(|node| node.to_string())
            .collect();
        let line = format!(
            "step {:>2}  [{}]  visited {}/{}",
            snapshot.counter,
            active.join(", "),
            snapshot.visited.len(),
            total
        );
        if failure.is_none() {
            if let Err(err) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
                failure = Some(err);
            }
        }
        if pace {
            std::thread::sleep(delay);
        }
    });
    if let Some(err) = failure {
        return Err(anyhow!(err).context("failed to write walk output"));
    }

    println!(
        "{} from {start}: visited {} of {total} nodes in {steps} steps",
        kind.as_str(),
        session.traversal().visited().len()
    );
    Ok(())
}

#[cfg(feature = "server")]
pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let serve_args = ServeArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_serve(serve_args).await
        }
        _ => dispatch_offline(args),
    }
}

#[cfg(not(feature = "server"))]
pub fn dispatch_sync() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => Err(anyhow!(
            "'serve' command requires the 'server' feature to be enabled"
        )),
        _ => dispatch_offline(args),
    }
}

fn dispatch_offline(args: Vec<String>) -> Result<()> {
    match args.get(1).map(|s| s.as_str()) {
        Some("render") => {
            let render_args = RenderArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_render(render_args)
        }
        Some("walk") => {
            let walk_args = WalkArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_walk(walk_args)
        }
        _ => {
            let render_args = RenderArgs::parse_from(args);
            run_render(render_args)
        }
    }
}

fn parse_output(output: Option<&str>, format_hint: Option<OutputFormat>) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
        None => {
            let ext = format_hint.unwrap_or(OutputFormat::Svg).extension();
            Ok(OutputDestination::File(PathBuf::from(format!(
                "{DEFAULT_OUTPUT_STEM}.{ext}"
            ))))
        }
    }
}

fn determine_format(
    preference: Option<OutputFormat>,
    output: &OutputDestination,
) -> Result<OutputFormat> {
    if let Some(fmt) = preference {
        return Ok(fmt);
    }

    match output {
        OutputDestination::Stdout => Ok(OutputFormat::Svg),
        OutputDestination::File(path) => OutputFormat::from_path(path).ok_or_else(|| {
            anyhow!(
                "unable to determine output format from '{}'; please specify --output-format",
                path.display()
            )
        }),
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Generated graph -> {}", path.display());
            }
        }
    }
    Ok(())
}
