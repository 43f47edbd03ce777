//! Raster charts for report analysis and the PDF report.
//!
//! Every chart is drawn through a generic `DrawingArea`, so the same code
//! renders straight to a PNG file or into an in-memory RGB buffer that the
//! report embeds.

use std::path::Path;
use std::sync::OnceLock;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontStyle;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{ProjectScore, Rating, RatingCount};
use crate::scoring::ScoreBand;

pub const CHART_SIZE: (u32, u32) = (1000, 600);
const FONT_FAMILY: &str = "sans-serif";

const PALETTE: [RGBColor; 6] = [
    RGBColor(68, 1, 84),
    RGBColor(59, 82, 139),
    RGBColor(33, 145, 140),
    RGBColor(94, 201, 98),
    RGBColor(253, 231, 37),
    RGBColor(150, 150, 150),
];

/// Row-major 8-bit RGB pixels
#[derive(Debug, Clone)]
pub struct ChartImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

static FONT_REGISTERED: OnceLock<()> = OnceLock::new();

/// Register the TrueType font used for every chart label. Only the first
/// successful call has any effect.
pub fn load_font(path: &Path) -> Result<()> {
    if FONT_REGISTERED.get().is_some() {
        return Ok(());
    }

    let bytes = std::fs::read(path).map_err(|e| Error::Asset {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    // plotters keeps registered fonts for the life of the process
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes).map_err(|_| {
        Error::Asset {
            path: path.to_path_buf(),
            reason: "not a valid TrueType font".to_string(),
        }
    })?;

    let _ = FONT_REGISTERED.set(());
    debug!("Registered chart font {}", path.display());
    Ok(())
}

fn render_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Render(err.to_string())
}

pub fn render_png<F>(path: &Path, draw: F) -> Result<()>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    draw(&root)?;
    root.present().map_err(render_err)?;
    info!("Chart written to {}", path.display());
    Ok(())
}

pub fn render_image<F>(draw: F) -> Result<ChartImage>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    let (width, height) = CHART_SIZE;
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;
        draw(&root)?;
        root.present().map_err(render_err)?;
    }
    Ok(ChartImage {
        width,
        height,
        pixels,
    })
}

pub fn band_colour(score: f64) -> RGBColor {
    let (r, g, b) = ScoreBand::from_score(score).rgb();
    RGBColor(r, g, b)
}

fn index_label(labels: &[String], x: i32) -> String {
    usize::try_from(x)
        .ok()
        .and_then(|idx| labels.get(idx))
        .cloned()
        .unwrap_or_default()
}

/// Mean score per group as points on a 0-110 axis. Points are coloured by
/// score band when `banded` is set, otherwise drawn in a single colour.
pub fn draw_score_points<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    x_desc: &str,
    scores: &[ProjectScore],
    banded: bool,
) -> Result<()> {
    let labels: Vec<String> = scores.iter().map(|s| s.label.clone()).collect();
    let count = scores.len() as i32;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 26))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-1..count, 0f64..110f64)
        .map_err(render_err)?;

    let formatter = |x: &i32| index_label(&labels, *x);
    chart
        .configure_mesh()
        .x_labels(labels.len() + 2)
        .x_label_formatter(&formatter)
        .x_label_style((FONT_FAMILY, 13))
        .y_labels(12)
        .y_desc("Score out of 100")
        .x_desc(x_desc)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(scores.iter().enumerate().map(|(idx, score)| {
            let colour = if banded { band_colour(score.score) } else { BLUE };
            Circle::new((idx as i32, score.score), 8, colour.filled())
        }))
        .map_err(render_err)?;

    Ok(())
}

/// Rating labels in chart order: the known ratings first, then any other
/// stored labels alphabetically.
pub fn rating_series(counts: &[RatingCount]) -> Vec<String> {
    let mut series: Vec<String> = Rating::ALL
        .iter()
        .map(|r| r.label().to_string())
        .filter(|label| counts.iter().any(|c| &c.rating == label))
        .collect();

    let mut extra: Vec<String> = counts
        .iter()
        .filter(|c| Rating::from_label(&c.rating).is_none())
        .map(|c| c.rating.clone())
        .collect();
    extra.sort();
    extra.dedup();
    series.extend(extra);
    series
}

/// Horizontal span of one bar. Each project owns `series + 1` slots: one per
/// rating plus a gap.
pub fn bar_span(project_idx: usize, series_idx: usize, series: usize) -> (i32, i32) {
    let start = (project_idx * (series + 1) + series_idx) as i32;
    (start, start + 1)
}

/// Project label shown under the middle of its group of bars.
fn group_label(projects: &[String], series: usize, x: i32) -> String {
    let slot = series + 1;
    let Ok(x) = usize::try_from(x) else {
        return String::new();
    };
    if x % slot == series / 2 {
        projects.get(x / slot).cloned().unwrap_or_default()
    } else {
        String::new()
    }
}

/// Grouped bars: number of entries per rating for each project.
pub fn draw_rating_counts<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    counts: &[RatingCount],
) -> Result<()> {
    let mut projects: Vec<String> = counts.iter().map(|c| c.project.clone()).collect();
    projects.dedup();
    let series = rating_series(counts);
    let width = (projects.len() * (series.len() + 1)) as i32;
    let max_count = counts.iter().map(|c| c.count).max().unwrap_or(0) as i32;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0..width.max(1), 0..max_count + 1)
        .map_err(render_err)?;

    let formatter = |x: &i32| group_label(&projects, series.len(), *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(width as usize + 1)
        .x_label_formatter(&formatter)
        .x_label_style((FONT_FAMILY, 14))
        .y_desc("Number of Ratings")
        .x_desc("Project")
        .draw()
        .map_err(render_err)?;

    for (series_idx, rating) in series.iter().enumerate() {
        let colour = PALETTE[series_idx.min(PALETTE.len() - 1)];
        let bars = counts
            .iter()
            .filter(|c| &c.rating == rating)
            .filter_map(|c| {
                let project_idx = projects.iter().position(|p| p == &c.project)?;
                let (x0, x1) = bar_span(project_idx, series_idx, series.len());
                Some(Rectangle::new([(x0, 0), (x1, c.count as i32)], colour.filled()))
            });

        chart
            .draw_series(bars)
            .map_err(render_err)?
            .label(rating.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], colour.filled()));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()
        .map_err(render_err)?;

    Ok(())
}
