use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use wifi_heatmap::loader::{self, InputMode};
use wifi_heatmap::render::{Midpoint, Preset};
use wifi_heatmap::report;
use wifi_heatmap::simulate::{self, Scene};
use wifi_heatmap::plot_heatmap;

#[derive(Parser, Debug)]
#[command(
    name = "wifi_heatmap",
    about = "Render WiFi signal-strength CSV grids as heatmap images",
    version
)]
struct Cli {
    /// Log level for diagnostics on stderr (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a CSV power grid to an image
    Plot(PlotArgs),
    /// Compute a signal map from a scene description and export it as CSV
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct PlotArgs {
    /// Input CSV file
    #[arg(short, long, default_value = "heatmap.csv")]
    input: PathBuf,

    /// Output image file
    #[arg(short, long, default_value = "wifi_heatmap.png")]
    output: PathBuf,

    /// How to read the CSV
    #[arg(long, value_enum, default_value_t = InputMode::Auto)]
    mode: InputMode,

    /// Rendering preset; defaults to the one matching the input mode
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Color scale center: "center" for the data midpoint, or a dBm value
    #[arg(long, value_parser = parse_midpoint, allow_hyphen_values = true)]
    midpoint: Option<Midpoint>,

    /// Output resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// Figure width in inches
    #[arg(long)]
    width: Option<f64>,

    /// Figure height in inches
    #[arg(long)]
    height: Option<f64>,

    /// TrueType font used for labels
    #[arg(long)]
    font: Option<PathBuf>,

    /// Skip title, ticks, and labels
    #[arg(long)]
    no_labels: bool,

    /// Treat cells holding exactly this value as obstacles (e.g. -555)
    #[arg(long, allow_hyphen_values = true)]
    marker: Option<f64>,

    /// JSON file overriding rendering options
    #[arg(long)]
    style: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Scene description (JSON)
    #[arg(short, long)]
    scene: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = "heatmap.csv")]
    output: PathBuf,

    /// Stamp obstacles and the room border with the scene's marker value
    #[arg(long)]
    mark_obstacles: bool,
}

fn parse_midpoint(raw: &str) -> Result<Midpoint, String> {
    if raw.eq_ignore_ascii_case("center") {
        return Ok(Midpoint::DataCenter);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Midpoint::Fixed)
        .ok_or_else(|| format!("expected \"center\" or a number, got {raw:?}"))
}

fn init_tracing(log_level: &str) -> Result<(), Box<dyn Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run_plot(args: PlotArgs) -> Result<(), Box<dyn Error>> {
    // An unreadable input keeps `Auto`; the pipeline reports it.
    let resolved = loader::resolve_mode(&args.input, args.mode).unwrap_or(args.mode);
    let preset = args.preset.unwrap_or_else(|| Preset::for_mode(resolved));

    let mut options = preset.options();
    if let Some(style) = &args.style {
        options = options.with_overrides_from_file(style)?;
    }
    if let Some(midpoint) = args.midpoint {
        options.midpoint = midpoint;
    }
    if let Some(dpi) = args.dpi {
        options.dpi = dpi;
    }
    if let Some(width) = args.width {
        options.width_in = width;
    }
    if let Some(height) = args.height {
        options.height_in = height;
    }
    if args.font.is_some() {
        options.font_path = args.font;
    }
    if args.no_labels {
        options.labels = false;
    }
    if args.marker.is_some() {
        options.marker_dbm = args.marker;
    }

    tracing::info!(?resolved, ?preset, "starting plot");
    plot_heatmap(&args.input, &args.output, resolved, Some(&options))?;
    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut scene = Scene::load(&args.scene)?;
    scene.mark_obstacles |= args.mark_obstacles;
    let grid = scene.signal_map()?;
    simulate::export_csv(&grid, &args.output)?;
    report::success(format!(
        "Signal map {:?} exported to {}",
        grid.shape(),
        args.output.display()
    ));
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Plot(args) => run_plot(args),
        Command::Simulate(args) => run_simulate(args),
    }
}
