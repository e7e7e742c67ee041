use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use layout_inspector::config::InspectorConfig;
use layout_inspector::files;
use layout_inspector::layout;
use layout_inspector::notify::{report_capture, TracingNotifier};
use layout_inspector::overlay::{self, DEFAULT_OVERLAY_ALPHA};
use layout_inspector::remote::{CommandWindow, FileWindow};
use layout_inspector::{
    capture_view, CaptureError, CaptureOptions, ForcedState, NodeId, PropertyTable, RemoteWindow,
    Snapshot, ViewTree,
};
use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "layout-inspector",
    version,
    about = "Capture and inspect view hierarchy snapshots of remote UI windows"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture a window through dump/preview commands and save a snapshot
    Capture(CaptureArgs),
    /// Build a snapshot from a dump file and preview image captured earlier
    Replay(ReplayArgs),
    /// Print snapshot options and the parsed view tree
    Inspect(InspectArgs),
    /// Print the property table of one view
    Props(PropsArgs),
    /// List views under a preview coordinate, smallest first
    Hit(HitArgs),
    /// Override a view's visibility and print the re-propagated draw state
    Force(ForceArgs),
    /// Compare the snapshot preview against a design mock image
    Overlay(OverlayArgs),
}

#[derive(Args, Debug)]
struct SaveArgs {
    /// Device API level; selects the dump protocol (default: LIV_API_LEVEL or 23)
    #[arg(long)]
    api_level: Option<u32>,
    /// Project directory; snapshots go to <project>/captures (default: LIV_PROJECT_DIR or .)
    #[arg(long)]
    project: Option<PathBuf>,
    /// Client name used for the snapshot file name
    #[arg(long)]
    client: Option<String>,
    /// Print capture result JSON to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Window title on the device
    #[arg(long)]
    window: String,
    /// Dump command; may use {title} and {version} (default: LIV_DUMP_CMD)
    #[arg(long)]
    dump_cmd: Option<String>,
    /// Preview command; may use {title}, {name} and {hash} (default: LIV_PREVIEW_CMD)
    #[arg(long)]
    preview_cmd: Option<String>,
    #[command(flatten)]
    save: SaveArgs,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Raw hierarchy dump file
    #[arg(long)]
    dump: PathBuf,
    /// Preview image file
    #[arg(long)]
    preview: PathBuf,
    /// Window title recorded in the snapshot options
    #[arg(long, default_value = "replay")]
    window: String,
    #[command(flatten)]
    save: SaveArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Snapshot file (.liv2)
    snapshot: PathBuf,
    /// Print the full tree as JSON instead of an outline
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct PropsArgs {
    /// Snapshot file (.liv2)
    snapshot: PathBuf,
    /// View hash, name@hash, or child-index path such as /0/2
    #[arg(long)]
    node: String,
}

#[derive(Args, Debug)]
struct HitArgs {
    /// Snapshot file (.liv2)
    snapshot: PathBuf,
    #[arg(long)]
    x: i32,
    #[arg(long)]
    y: i32,
    /// Preview draw scale the coordinates refer to
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
}

#[derive(Args, Debug)]
struct ForceArgs {
    /// Snapshot file (.liv2)
    snapshot: PathBuf,
    /// View hash, name@hash, or child-index path such as /0/2
    #[arg(long)]
    node: String,
    #[arg(long, value_enum)]
    state: ForcedState,
}

#[derive(Args, Debug)]
struct OverlayArgs {
    /// Snapshot file (.liv2)
    snapshot: PathBuf,
    /// Design mock image
    #[arg(long)]
    image: PathBuf,
    /// Write the preview with the mock blended on top
    #[arg(long)]
    out: Option<PathBuf>,
    /// Mock opacity, 0.0 to 1.0
    #[arg(long, default_value_t = DEFAULT_OVERLAY_ALPHA)]
    alpha: f32,
    /// Per-channel difference below which a pixel counts as unchanged
    #[arg(long, default_value_t = 16)]
    threshold: u8,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Capture(args) => command_capture(args),
        Commands::Replay(args) => command_replay(args),
        Commands::Inspect(args) => command_inspect(args),
        Commands::Props(args) => command_props(args),
        Commands::Hit(args) => command_hit(args),
        Commands::Force(args) => command_force(args),
        Commands::Overlay(args) => command_overlay(args),
    }
}

fn command_capture(args: CaptureArgs) -> Result<()> {
    let config = InspectorConfig::from_env()?;
    let dump_cmd = args
        .dump_cmd
        .or_else(|| config.dump_cmd.clone())
        .context("no dump command: pass --dump-cmd or set LIV_DUMP_CMD")?;
    let preview_cmd = args
        .preview_cmd
        .or_else(|| config.preview_cmd.clone())
        .context("no preview command: pass --preview-cmd or set LIV_PREVIEW_CMD")?;

    let window = CommandWindow::new(&args.window, dump_cmd, preview_cmd);
    save_capture(&window, &args.save, &config)
}

fn command_replay(args: ReplayArgs) -> Result<()> {
    if !args.dump.exists() {
        bail!("dump not found: {}", args.dump.display());
    }
    if !args.preview.exists() {
        bail!("preview not found: {}", args.preview.display());
    }
    let config = InspectorConfig::from_env()?;
    let window = FileWindow::new(&args.window, &args.dump, Some(args.preview.clone()));
    save_capture(&window, &args.save, &config)
}

fn save_capture(window: &dyn RemoteWindow, save: &SaveArgs, config: &InspectorConfig) -> Result<()> {
    let api_level = save.api_level.unwrap_or(config.api_level);
    let options = CaptureOptions::for_api_level(window.title(), api_level);
    let project_dir = save
        .project
        .clone()
        .unwrap_or_else(|| config.project_dir.clone());

    let notifier = TracingNotifier;
    let result = capture_view(window, &options);
    let Some(data) = result.data() else {
        report_capture(&notifier, window.title(), &result, None);
        let code = result.failure_kind().map(CaptureError::code).unwrap_or("unknown");
        bail!("capture failed ({code}): {}", result.error());
    };

    let fallback = project_name(&project_dir);
    let path = files::save_to_file_now(&project_dir, save.client.as_deref(), &fallback, data)?;
    report_capture(&notifier, window.title(), &result, Some(&path));

    if save.json {
        let payload = json!({
            "path": abs_path(&path),
            "bytes": data.len(),
            "window": window.title(),
            "api_level": api_level,
            "options": options,
        });
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!("{}", abs_path(&path).display());
    }
    Ok(())
}

fn command_inspect(args: InspectArgs) -> Result<()> {
    let snapshot = files::read_snapshot_file(&args.snapshot)?;
    let tree = load_tree(&snapshot, &args.snapshot)?;

    if args.json {
        let payload = json!({
            "path": abs_path(&args.snapshot),
            "options": snapshot.capture_options(),
            "raw_options": snapshot.options,
            "version": snapshot.protocol_version().to_string(),
            "node_count": tree.len(),
            "hierarchy_bytes": snapshot.hierarchy.len(),
            "preview_bytes": snapshot.preview.len(),
            "tree": tree.to_json(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("options: {}", snapshot.options);
    println!("nodes: {}", tree.len());
    for (id, depth) in tree.preorder_with_depth() {
        let node = tree.node(id);
        let marker = if node.is_drawn() { "" } else { " (not drawn)" };
        println!("{}{node}{marker}", "  ".repeat(depth));
    }
    Ok(())
}

fn command_props(args: PropsArgs) -> Result<()> {
    let snapshot = files::read_snapshot_file(&args.snapshot)?;
    let tree = load_tree(&snapshot, &args.snapshot)?;
    let id = select_node(&tree, &args.node)?;
    let node = tree.node(id);
    let table = node.property_table();

    let rows: Vec<Value> = (0..table.row_count())
        .map(|row| {
            json!([
                table.value_at(row, 0).unwrap_or_default(),
                table.value_at(row, 1).unwrap_or_default(),
            ])
        })
        .collect();
    let payload = json!({
        "node": node.to_string(),
        "path": selector_path(&tree, id),
        "columns": PropertyTable::COLUMNS,
        "rows": rows,
        "groups": table.groups(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn command_hit(args: HitArgs) -> Result<()> {
    if !(args.scale.is_finite() && args.scale > 0.0) {
        bail!("--scale must be a positive number, got {}", args.scale);
    }
    let snapshot = files::read_snapshot_file(&args.snapshot)?;
    let mut tree = load_tree(&snapshot, &args.snapshot)?;
    layout::compute_preview_boxes(&mut tree, args.scale);

    let hits: Vec<Value> = layout::nodes_at(&tree, args.x, args.y)
        .into_iter()
        .map(|id| node_summary(&tree, id))
        .collect();
    let payload = json!({
        "x": args.x,
        "y": args.y,
        "scale": args.scale,
        "hits": hits,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn command_force(args: ForceArgs) -> Result<()> {
    let snapshot = files::read_snapshot_file(&args.snapshot)?;
    let mut tree = load_tree(&snapshot, &args.snapshot)?;
    let id = select_node(&tree, &args.node)?;

    let before: Vec<bool> = tree.preorder().iter().map(|n| tree.node(*n).is_drawn()).collect();
    tree.set_forced_state(id, args.state);
    let changed: Vec<Value> = tree
        .preorder()
        .into_iter()
        .zip(before)
        .filter(|(n, was_drawn)| tree.node(*n).is_drawn() != *was_drawn)
        .map(|(n, _)| node_summary(&tree, n))
        .collect();

    let payload = json!({
        "node": tree.node(id).to_string(),
        "state": args.state,
        "changed": changed,
        "tree": tree.to_json(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn command_overlay(args: OverlayArgs) -> Result<()> {
    if !args.image.exists() {
        bail!("overlay image not found: {}", args.image.display());
    }
    let snapshot = files::read_snapshot_file(&args.snapshot)?;
    let preview = overlay::decode_preview(&snapshot.preview)
        .with_context(|| format!("snapshot preview is not an image: {}", args.snapshot.display()))?;
    let mock = overlay::open_overlay(&args.image)?;

    let comparison = overlay::compare_overlay(&preview, &mock, args.threshold);
    let mut payload = serde_json::to_value(&comparison)?;
    if let Some(out) = args.out.as_ref() {
        overlay::save_image(overlay::blend_overlay(&preview, &mock, args.alpha), out)?;
        payload["overlay_path"] = json!(abs_path(out));
        payload["alpha"] = json!(args.alpha.clamp(0.0, 1.0));
    }
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn load_tree(snapshot: &Snapshot, path: &Path) -> Result<ViewTree> {
    snapshot
        .parse_tree()
        .with_context(|| format!("failed to parse hierarchy in {}", path.display()))?
        .with_context(|| format!("snapshot has an empty hierarchy: {}", path.display()))
}

fn select_node(tree: &ViewTree, selector: &str) -> Result<NodeId> {
    tree.select(selector)
        .with_context(|| format!("no view matches {selector:?}"))
}

fn node_summary(tree: &ViewTree, id: NodeId) -> Value {
    let node = tree.node(id);
    json!({
        "node": node.to_string(),
        "path": selector_path(tree, id),
        "id": node.id,
        "preview_box": node.preview_box,
        "drawn": node.is_drawn(),
    })
}

/// Child-index path accepted by `ViewTree::select`, e.g. `/0/2`.
fn selector_path(tree: &ViewTree, id: NodeId) -> String {
    let steps: Vec<String> = tree
        .path(id)
        .into_iter()
        .skip(1)
        .map(|n| tree.node(n).index.to_string())
        .collect();
    format!("/{}", steps.join("/"))
}

fn project_name(project_dir: &Path) -> String {
    abs_path(project_dir)
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "project".to_string())
}

fn abs_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}
