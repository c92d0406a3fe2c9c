//! Waveform rendering.
//!
//! Draws the flow series as a polyline over a light grid, with apnea spans
//! shaded, and encodes the raster as PNG. Rendering uses no clock, font or
//! random state, so identical input gives byte-identical output.

use crate::config::RenderConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::ApneaSpan;
use crate::parser::FlowSeries;
use base64::Engine;
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const APNEA_SHADE: Rgb<u8> = Rgb([255, 221, 221]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const AXIS: Rgb<u8> = Rgb([128, 128, 128]);
const TRACE: Rgb<u8> = Rgb([31, 119, 180]);

const GRID_COLUMNS: u32 = 10;
const GRID_ROWS: u32 = 4;

/// An encoded waveform image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowImage {
    png: Vec<u8>,
}

impl FlowImage {
    /// Raw PNG bytes.
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Consumes the image, returning the PNG bytes.
    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    /// Base64 text for embedding in a JSON body.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }
}

/// Plot area inside the margins, in pixel coordinates.
struct Plot {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    start: f64,
    duration: f64,
    scale: f64,
}

impl Plot {
    fn x(&self, offset: f64) -> i64 {
        let frac = if self.duration > 0.0 {
            (offset - self.start) / self.duration
        } else {
            0.5
        };
        (self.left + frac * (self.width - 1.0)).round() as i64
    }

    fn y(&self, value: f64) -> i64 {
        let mid = self.top + (self.height - 1.0) / 2.0;
        (mid - value / self.scale * (self.height - 1.0) / 2.0).round() as i64
    }
}

/// Renders flow series to PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveformRenderer {
    config: RenderConfig,
}

impl WaveformRenderer {
    /// Creates a renderer.
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Draws the series and encodes it.
    pub fn render(&self, series: &FlowSeries, apneas: &[ApneaSpan]) -> AnalysisResult<FlowImage> {
        let img = self.draw(series, apneas);
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| AnalysisError::Render(e.to_string()))?;
        Ok(FlowImage {
            png: cursor.into_inner(),
        })
    }

    /// Draws the series into a raster without encoding.
    pub fn draw(&self, series: &FlowSeries, apneas: &[ApneaSpan]) -> RgbImage {
        let RenderConfig { width, height } = self.config;
        let margin = RenderConfig::MARGIN;
        let mut img: RgbImage = ImageBuffer::from_pixel(width, height, BACKGROUND);

        let peak = series.values().fold(0.0_f64, |m, v| m.max(v.abs()));
        let plot = Plot {
            left: f64::from(margin),
            top: f64::from(margin),
            width: f64::from(width - 2 * margin),
            height: f64::from(height - 2 * margin),
            start: series.start_secs(),
            duration: series.duration_secs(),
            scale: if peak > 0.0 { peak } else { 1.0 },
        };
        let (x0, x1) = (i64::from(margin), i64::from(width - margin - 1));
        let (y0, y1) = (i64::from(margin), i64::from(height - margin - 1));

        for span in apneas {
            let (sx, ex) = (plot.x(span.start_secs), plot.x(span.end_secs));
            for x in sx.max(x0)..=ex.min(x1) {
                for y in y0..=y1 {
                    put(&mut img, x, y, APNEA_SHADE);
                }
            }
        }

        for col in 0..=GRID_COLUMNS {
            let x = x0 + (x1 - x0) * i64::from(col) / i64::from(GRID_COLUMNS);
            line(&mut img, (x, y0), (x, y1), GRID);
        }
        for row in 0..=GRID_ROWS {
            let y = y0 + (y1 - y0) * i64::from(row) / i64::from(GRID_ROWS);
            line(&mut img, (x0, y), (x1, y), GRID);
        }
        let zero = plot.y(0.0);
        line(&mut img, (x0, zero), (x1, zero), AXIS);

        let points: Vec<(i64, i64)> = series
            .samples()
            .iter()
            .map(|s| (plot.x(s.offset_secs), plot.y(s.value)))
            .collect();
        match points.as_slice() {
            [single] => put(&mut img, single.0, single.1, TRACE),
            _ => {
                for pair in points.windows(2) {
                    line(&mut img, pair[0], pair[1], TRACE);
                }
            }
        }
        img
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
        if x < img.width() && y < img.height() {
            img.put_pixel(x, y, color);
        }
    }
}

/// Bresenham line.
fn line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x, y, color);
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
