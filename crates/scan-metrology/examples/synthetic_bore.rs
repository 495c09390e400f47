//! Example: bore circle fit on a synthetic scan.
//!
//! Builds a plate with a through-bore, projects it on the XY plane and runs
//! `CircleFitter` with a window around the bore. The fitted circle and its
//! residual statistics are printed as JSON, together with the wall-clock time
//! of the fit.
//!
//! Run from the workspace root:
//!   cargo run -p scan-metrology --example synthetic_bore -- --help
//!   cargo run -p scan-metrology --example synthetic_bore -- --radius 15

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use scan_metrology::{BoreWindow, CircleFitter, EdgeFitConfig, Point3, PointCloud};
use serde::Serialize;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Fit the bore circle of a synthetic plate scan")]
struct Args {
    /// Bore centre X in millimetres
    #[arg(long, default_value_t = 60.0)]
    cx: f64,

    /// Bore centre Y in millimetres
    #[arg(long, default_value_t = 80.0)]
    cy: f64,

    /// Bore radius in millimetres
    #[arg(long, default_value_t = 12.5)]
    radius: f64,

    /// Sampling step of the plate grid
    #[arg(long, default_value_t = 0.1)]
    step: f64,

    /// Raster scale in pixels per millimetre
    #[arg(long, default_value_t = 12.0)]
    scale: f64,
}

// ── JSON DTOs ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Summary {
    points: usize,
    elapsed_ms: f64,
    expected: [f64; 3],
    fitted: [f64; 3],
    rms_error: f64,
    angle_range_deg: f64,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Square plate `[cx - 3r, cx + 3r]` on both axes with the bore cut out.
fn plate_with_bore(args: &Args) -> PointCloud {
    let half = 3.0 * args.radius;
    let n = (2.0 * half / args.step).round() as usize;
    let mut points = Vec::with_capacity(n * n);
    for i in 0..=n {
        for j in 0..=n {
            let x = args.cx - half + i as f64 * args.step;
            let y = args.cy - half + j as f64 * args.step;
            if (x - args.cx).hypot(y - args.cy) > args.radius {
                points.push(Point3::new(x, y, 0.0));
            }
        }
    }
    PointCloud::new(points)
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let cloud = plate_with_bore(&args);
    let points = cloud.len();
    println!("synthetic plate: {points} points, bore r={:.2}", args.radius);

    let mut cfg = EdgeFitConfig::default();
    cfg.edges.raster.scale = args.scale;

    // The window opens 2 mm outside the bore on the plate's low side and
    // spans the bore plus 2 mm on the far side.
    let start = (2.0 * args.radius - 2.0) / (6.0 * args.radius);
    let extent = 2.0 * args.radius + 4.0;
    let window = BoreWindow {
        find_second_circle: false,
        val_x: start,
        val_z: start,
        window_width: extent,
        delta_z: extent,
        ..BoreWindow::default()
    };

    let mut fitter = CircleFitter::new(cloud, cfg);
    let t0 = Instant::now();
    let fit = fitter.fit_circles(&window).context("fitting the bore")?;
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1e3;

    let c = fit.primary.circle;
    let summary = Summary {
        points,
        elapsed_ms,
        expected: [args.cx, args.cy, args.radius],
        fitted: [c.cx, c.cy, c.r],
        rms_error: fit.primary.report.rms_error,
        angle_range_deg: fit.primary.report.angle_range_deg,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
