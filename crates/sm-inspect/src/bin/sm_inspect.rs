use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use sm_core::{Image, Plane, PointCloud};
use sm_edge::EdgeExtractor;
use sm_inspect::cloud_io::{load_cloud, save_xyz};
use sm_measure::cycle::{prepare_horizontal, prepare_small, prepare_vertical};
use sm_measure::{
    BandLengths, BoreFit, CircleFitter, CircleSelector, DistanceCheck, HornGap, InspectionConfig,
    ScanViews, SlopeFit, band_lengths, horn_gap, measure_slope, run_cycle, width,
};

#[derive(Parser, Debug)]
#[command(name = "sm_inspect")]
#[command(about = "Measure part features on laser-scan point clouds")]
#[command(
    long_about = "Measure part features on laser-scan point clouds.\n\n\
                  Clouds are read from XYZ/CSV text or from PLY files in ASCII or \
                  binary little-endian encoding."
)]
struct Cli {
    /// JSON inspection config; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the rasterized projection, blur and edge map as PNGs.
    #[command(name = "edges")]
    Edges(EdgesArgs),
    #[command(name = "bore")]
    Bore(BoreArgs),
    #[command(name = "slope")]
    Slope(SlopeArgs),
    #[command(name = "horn")]
    Horn(HornArgs),
    /// Run the four-view cycle and check tolerances.
    #[command(name = "cycle")]
    Cycle(CycleArgs),
    /// Write the per-view clouds the cycle measures on.
    #[command(name = "prepare")]
    Prepare(PrepareArgs),
    /// Print the default inspection config.
    #[command(name = "config")]
    Config(OutArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlaneArg {
    Xy,
    Yz,
    Xz,
}

impl From<PlaneArg> for Plane {
    fn from(p: PlaneArg) -> Self {
        match p {
            PlaneArg::Xy => Plane::XY,
            PlaneArg::Yz => Plane::YZ,
            PlaneArg::Xz => Plane::XZ,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct OutArgs {
    /// Output JSON path; stdout when absent.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct EdgesArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, value_enum, default_value_t = PlaneArg::Xy)]
    plane: PlaneArg,
    #[arg(long, default_value = "out/edges")]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct BoreArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, value_enum, default_value_t = PlaneArg::Xy)]
    plane: PlaneArg,
    #[arg(long)]
    val_x: Option<f64>,
    #[arg(long)]
    val_z: Option<f64>,
    #[arg(long)]
    delta_z: Option<f64>,
    #[arg(long)]
    window_width: Option<f64>,
    /// Fit the primary circle only.
    #[arg(long)]
    single: bool,
    /// Expected centre height above the datum; enables the position check.
    #[arg(long)]
    z_distance: Option<f64>,
    #[arg(long)]
    reel_datum: Option<f64>,
    #[command(flatten)]
    out: OutArgs,
}

#[derive(Args, Debug, Clone)]
struct SlopeArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    /// Reference value the centre offset is measured from.
    #[arg(long)]
    reference: Option<f64>,
    /// Use the secondary slope band.
    #[arg(long)]
    secondary: bool,
    #[command(flatten)]
    out: OutArgs,
}

#[derive(Args, Debug, Clone)]
struct HornArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[command(flatten)]
    out: OutArgs,
}

#[derive(Args, Debug, Clone)]
struct ViewArgs {
    #[arg(long, required = true)]
    small: PathBuf,
    #[arg(long, required = true)]
    horizontal: PathBuf,
    #[arg(long, required = true)]
    horizontal2: PathBuf,
    #[arg(long, required = true)]
    vertical: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct CycleArgs {
    #[command(flatten)]
    views: ViewArgs,
    #[command(flatten)]
    out: OutArgs,
}

#[derive(Args, Debug, Clone)]
struct PrepareArgs {
    #[command(flatten)]
    views: ViewArgs,
    #[arg(long, default_value = "out/views")]
    out: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
struct MetaEdges {
    points: usize,
    scale: f64,
    crop_origin: [usize; 2],
    crop_size: [usize; 2],
    edge_pixels: usize,
}

#[derive(Debug, Clone, Serialize)]
struct BoreOutput {
    fit: BoreFit,
    datum: Option<f64>,
    distance: Option<DistanceCheck>,
}

#[derive(Debug, Clone, Serialize)]
struct HornOutput {
    width: f64,
    inner_gap: HornGap,
    outer_gap: HornGap,
    band: Option<BandLengths>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Edges(args) => run_edges(args, &cfg),
        Command::Bore(args) => run_bore(args, &cfg),
        Command::Slope(args) => run_slope(args, &cfg),
        Command::Horn(args) => run_horn(args, &cfg),
        Command::Cycle(args) => run_cycle_cmd(args, &cfg),
        Command::Prepare(args) => run_prepare(args, &cfg),
        Command::Config(out) => emit(&out, &InspectionConfig::default()),
    }
}

fn run_edges(args: EdgesArgs, cfg: &InspectionConfig) -> Result<()> {
    let cloud = load_cloud(&args.input)?;
    let projected = cloud.project(args.plane.into());

    let mut extractor = EdgeExtractor::new(cfg.fitting.edges.clone());
    let Some(debug) = extractor.extract_debug(&projected) else {
        bail!("no point of {} lands on the raster canvas", args.input.display());
    };

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;
    save_u8_image(args.out.join("raster.png"), &debug.raster.image)?;
    save_u8_image(args.out.join("blurred.png"), &f32_to_u8_vis(&debug.blurred))?;
    save_u8_image(args.out.join("edges.png"), &debug.edges)?;

    let edge_pixels = debug.edges.data().iter().filter(|&&v| v != 0).count();
    write_json(
        args.out.join("meta.json"),
        &MetaEdges {
            points: projected.len(),
            scale: debug.raster.scale,
            crop_origin: [debug.raster.col0, debug.raster.row0],
            crop_size: [debug.edges.width(), debug.edges.height()],
            edge_pixels,
        },
    )?;
    log::info!("{edge_pixels} edge pixels written to {}", args.out.display());
    Ok(())
}

fn run_bore(args: BoreArgs, cfg: &InspectionConfig) -> Result<()> {
    let cloud = load_cloud(&args.input)?;
    let mut window = cfg.horizontal.window.clone();
    window.find_second_circle = !args.single;
    if let Some(v) = args.val_x {
        window.val_x = v;
    }
    if let Some(v) = args.val_z {
        window.val_z = v;
    }
    if let Some(v) = args.delta_z {
        window.delta_z = v;
    }
    if let Some(v) = args.window_width {
        window.window_width = v;
    }

    let mut fitter = CircleFitter::new(cloud, cfg.fitting.clone())
        .with_plane(args.plane.into())
        .with_datum_params(cfg.horizontal.datum.clone());
    let fit = fitter.fit_circles(&window).context("fitting bore circles")?;

    let datum = match fitter.datum() {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("datum unavailable: {e}");
            None
        }
    };
    let distance = match args.z_distance {
        Some(z) => {
            let which = if args.single {
                CircleSelector::Primary
            } else {
                CircleSelector::Secondary
            };
            Some(fitter.distance(which, z, args.reel_datum).context("position check")?)
        }
        None => None,
    };

    emit(
        &args.out,
        &BoreOutput {
            fit,
            datum,
            distance,
        },
    )
}

fn run_slope(args: SlopeArgs, cfg: &InspectionConfig) -> Result<()> {
    let cloud = load_cloud(&args.input)?;
    let params = if args.secondary {
        &cfg.vertical.slope_secondary
    } else {
        &cfg.vertical.slope_primary
    };
    let fit: SlopeFit =
        measure_slope(&cloud, args.reference, params, &cfg.fitting).context("measuring slope")?;
    emit(&args.out, &fit)
}

fn run_horn(args: HornArgs, cfg: &InspectionConfig) -> Result<()> {
    let cloud = load_cloud(&args.input)?;
    let v = &cfg.vertical;
    let edges = &cfg.fitting.edges;

    let band = match band_lengths(&cloud, &cfg.horizontal.band) {
        Ok(b) => Some(b),
        Err(e) => {
            log::warn!("band lengths unavailable: {e}");
            None
        }
    };
    let out = HornOutput {
        width: width(&cloud, &v.width),
        inner_gap: horn_gap(&cloud, &v.horn_inner, edges).context("inner horn gap")?,
        outer_gap: horn_gap(&cloud, &v.horn_outer, edges).context("outer horn gap")?,
        band,
    };
    emit(&args.out, &out)
}

fn load_views(args: &ViewArgs) -> Result<ScanViews> {
    Ok(ScanViews {
        small: load_cloud(&args.small)?,
        horizontal: load_cloud(&args.horizontal)?,
        horizontal2: load_cloud(&args.horizontal2)?,
        vertical: load_cloud(&args.vertical)?,
    })
}

fn run_cycle_cmd(args: CycleArgs, cfg: &InspectionConfig) -> Result<()> {
    let views = load_views(&args.views)?;
    let outcome = run_cycle(&views, cfg);

    for (name, verdict) in outcome.quality.failures() {
        log::info!("{name}: {verdict:?}");
    }
    if outcome.quality.passed() {
        log::info!("part passed the quality check");
    } else {
        log::warn!("part failed the quality check");
    }
    emit(&args.out, &outcome)
}

fn run_prepare(args: PrepareArgs, cfg: &InspectionConfig) -> Result<()> {
    let views = load_views(&args.views)?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let small = prepare_small(&views.small, &cfg.small).context("preparing small view")?;
    let horizontal = prepare_horizontal(&views.horizontal, &views.horizontal2, &cfg.horizontal)
        .context("preparing horizontal view")?;
    let vertical = prepare_vertical(&views.vertical, &cfg.vertical).context("preparing vertical view")?;

    let outputs: [(&str, &PointCloud); 4] = [
        ("small.xyz", &small),
        ("horizontal.xyz", &horizontal),
        ("vertical.xyz", &vertical.cloud),
        ("vertical_origin.xyz", &vertical.reorigined),
    ];
    for (name, cloud) in outputs {
        save_xyz(&args.out.join(name), cloud)?;
    }
    log::info!("prepared views written to {}", args.out.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<InspectionConfig> {
    match path {
        Some(p) => read_json(p),
        None => Ok(InspectionConfig::default()),
    }
}

fn emit(out: &OutArgs, value: &impl Serialize) -> Result<()> {
    match &out.out {
        Some(path) => write_json(path.clone(), value),
        None => {
            let text = serde_json::to_string_pretty(value).context("serializing json")?;
            println!("{text}");
            Ok(())
        }
    }
}

fn save_u8_image(path: PathBuf, img: &Image<u8>) -> Result<()> {
    let gray = GrayImage::from_raw(img.width() as u32, img.height() as u32, img.data().to_vec())
        .context("constructing GrayImage from raw bytes")?;
    gray.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

/// Min-max stretch to the full 8-bit range.
fn f32_to_u8_vis(img: &Image<f32>) -> Image<u8> {
    let data = img.data();
    let (lo, hi) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if !(hi - lo).is_normal() {
        return Image::new_fill(img.width(), img.height(), 0);
    }
    let scale = 255.0 / (hi - lo);
    img.as_view()
        .map_to(|v| ((v - lo) * scale).round().clamp(0.0, 255.0) as u8)
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(&path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing json {}", path.display()))
}
