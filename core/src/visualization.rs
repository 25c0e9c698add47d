use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use plotters::{coord::Shift, prelude::*};

use crate::sweep::Figure;

pub const CHART_WIDTH: u32 = 800;
pub const CHART_HEIGHT: u32 = 600;
const CAP_WIDTH: u32 = 10;

/// A chart written to disk, along with its inline form for the notebook.
#[derive(Clone, Debug)]
pub struct RenderedFigure {
    pub title: String,
    pub path: PathBuf,
    pub data_url: String,
}

/// Render `figure` and write it as `<file_stem>.png` under `dir`.
pub fn write_figure(figure: &Figure, dir: &Path) -> Result<RenderedFigure> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;
    let png = render_figure_png(figure, CHART_WIDTH, CHART_HEIGHT)?;
    let path = dir.join(format!("{}.png", figure.file_stem));
    fs::write(&path, &png).with_context(|| format!("failed to write chart to {}", path.display()))?;

    Ok(RenderedFigure {
        title: figure.title.clone(),
        path,
        data_url: png_data_url(&png),
    })
}

/// Render `figure` into an in-memory PNG.
pub fn render_figure_png(figure: &Figure, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        draw_figure(&root, figure)?;
        root.present().map_err(draw_error)?;
    }
    encode_rgb_png(width, height, &pixels)
}

/// Draw one error-barred line per series, with title, axis labels, grid and legend.
pub fn draw_figure<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()> {
    root.fill(&WHITE).map_err(draw_error)?;

    let (x_min, x_max) = padded_range(figure.x_values.iter().copied(), 0.05);
    let (y_min, y_max) = padded_range(
        figure
            .series
            .iter()
            .flat_map(|series| series.estimated_points())
            .flat_map(|(_, estimate)| [estimate.lower(), estimate.upper()]),
        0.1,
    );

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(draw_error)?;

    chart
        .configure_mesh()
        .x_desc(figure.x_label.as_str())
        .y_desc(figure.y_label.as_str())
        .y_label_formatter(&|y| format!("{:.1}", y))
        .draw()
        .map_err(draw_error)?;

    for (index, series) in figure.series.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();
        let line_style = color.stroke_width(2);

        chart
            .draw_series(
                contiguous_runs(series)
                    .into_iter()
                    .map(move |run| PathElement::new(run, line_style)),
            )
            .map_err(draw_error)?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_style));

        chart
            .draw_series(series.estimated_points().map(|(x, estimate)| {
                ErrorBar::new_vertical(
                    x,
                    estimate.lower(),
                    estimate.mean,
                    estimate.upper(),
                    color.stroke_width(1),
                    CAP_WIDTH,
                )
            }))
            .map_err(draw_error)?;

        chart
            .draw_series(
                series
                    .estimated_points()
                    .map(|(x, estimate)| Circle::new((x, estimate.mean), 3, color.filled())),
            )
            .map_err(draw_error)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_error)?;

    Ok(())
}

/// Encode a packed RGB8 buffer as PNG bytes.
pub fn encode_rgb_png(width: u32, height: u32, pixels: &[u8]) -> Result<Vec<u8>> {
    let expected_len = (width * height * 3) as usize;
    if pixels.len() != expected_len {
        anyhow::bail!(
            "pixel buffer length {} does not match RGB image size {}x{}",
            pixels.len(),
            width,
            height
        );
    }

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);
    encoder
        .write_image(pixels, width, height, ExtendedColorType::Rgb8)
        .context("failed to encode RGB PNG data")?;
    Ok(buffer)
}

pub fn png_data_url(png: &[u8]) -> String {
    let base64 = base64::engine::general_purpose::STANDARD.encode(png);
    format!("data:image/png;base64,{base64}")
}

/// Split a series into runs of consecutive estimated points so gaps stay unconnected.
fn contiguous_runs(series: &crate::sweep::Series) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for point in &series.points {
        match point.estimate {
            Some(estimate) => current.push((point.x, estimate.mean)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn padded_range(values: impl Iterator<Item = f64>, fraction: f64) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    let span = max - min;
    let pad = if span > 0.0 {
        span * fraction
    } else {
        min.abs().max(1.0) * fraction
    };
    (min - pad, max + pad)
}

fn draw_error(err: impl Display) -> anyhow::Error {
    anyhow!("failed to draw chart: {err}")
}
