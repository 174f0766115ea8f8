//! Local simulated edits, used when no remote provider can serve a request.
//!
//! The simulator never touches the network. It copies the source onto an RGBA
//! surface, applies the color overlays and rain streaks whose keywords appear
//! in the instruction, and stamps a caption explaining that the result is a
//! placeholder.

mod draw;
mod font;
mod rules;

use crate::error::Result;
use crate::image::codec;
use crate::image::{EditMetadata, EditSource, EditedImage, ImageFormat};
use crate::poll::{Sleeper, TokioSleeper};
use draw::Rect;
use image::{Rgb, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rules::Effect;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Model name reported for simulated results.
pub const SIMULATION_MODEL: &str = "local-simulation";

/// Number of streaks drawn when a rain keyword matches.
pub const RAIN_SEGMENTS: usize = 50;

/// Second caption line.
pub const NOTICE: &str = "Add a provider API key for real AI editing";

const RAIN_COLOR: Rgb<u8> = Rgb([174, 194, 224]);
const RAIN_ALPHA: f32 = 0.6;
const RAIN_DX: i64 = 5;
const RAIN_DY: i64 = 15;

const CAPTION_MARGIN: i64 = 10;
const CAPTION_BG: Rgb<u8> = Rgb([0, 0, 0]);
const CAPTION_ALPHA: f32 = 0.7;
const CAPTION_FG: Rgb<u8> = Rgb([255, 255, 255]);

/// Tuning for the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Artificial delay before rendering.
    pub delay: Duration,
    /// Fixed RNG seed for reproducible rain; random when `None`.
    pub seed: Option<u64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            seed: None,
        }
    }
}

impl SimulationOptions {
    /// Sets the artificial delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fixes the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// What the simulator did to the image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Names of the applied effects, in order.
    pub effects: Vec<&'static str>,
    /// Rain streaks drawn (zero or [`RAIN_SEGMENTS`]).
    pub rain_segments: usize,
}

/// A simulated result together with its report.
#[derive(Debug, Clone)]
pub struct SimulatedEdit {
    /// The rendered PNG.
    pub image: EditedImage,
    /// Effects that were applied.
    pub report: SimulationReport,
}

/// Renders placeholder edits locally.
#[derive(Clone)]
pub struct Simulator {
    options: SimulationOptions,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulationOptions::default())
    }
}

impl Simulator {
    /// Creates a simulator that sleeps on the tokio timer.
    pub fn new(options: SimulationOptions) -> Self {
        Self {
            options,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the sleeper used for the artificial delay.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the options.
    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Waits the configured delay, then renders.
    pub async fn simulate(&self, source_image: &[u8], instruction: &str) -> Result<SimulatedEdit> {
        if !self.options.delay.is_zero() {
            self.sleeper.sleep(self.options.delay).await;
        }
        self.render(source_image, instruction)
    }

    /// Renders immediately. Fails only when the source cannot be decoded.
    pub fn render(&self, source_image: &[u8], instruction: &str) -> Result<SimulatedEdit> {
        let start = Instant::now();
        let mut surface = codec::decode_image(source_image)?.to_rgba8();
        let mut report = SimulationReport::default();

        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        for rule in rules::matching(instruction) {
            match rule.effect {
                Effect::Tint { color, alpha } => draw::fill(&mut surface, color, alpha),
                Effect::Rain => {
                    report.rain_segments += draw_rain(&mut surface, &mut rng);
                }
            }
            report.effects.push(rule.name);
        }

        draw_caption(&mut surface, instruction);

        tracing::debug!(
            width = surface.width(),
            height = surface.height(),
            effects = ?report.effects,
            "rendered simulated edit"
        );

        let data = codec::encode_png(&surface)?;
        let image = EditedImage::new(
            data,
            ImageFormat::Png,
            EditSource::Simulated,
            EditMetadata {
                model: Some(SIMULATION_MODEL.to_string()),
                seed: self.options.seed,
                duration_ms: Some(start.elapsed().as_millis() as u64),
                job_id: None,
                fallback: None,
            },
        );

        Ok(SimulatedEdit { image, report })
    }
}

type Segment = ((i64, i64), (i64, i64));

/// Streak endpoints: random starts anywhere on the surface, fixed slant.
fn rain_streaks(width: u32, height: u32, rng: &mut StdRng) -> Vec<Segment> {
    let width = width.max(1) as i64;
    let height = height.max(1) as i64;

    (0..RAIN_SEGMENTS)
        .map(|_| {
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);
            ((x, y), (x + RAIN_DX, y + RAIN_DY))
        })
        .collect()
}

/// Returns the number of streaks drawn.
fn draw_rain(surface: &mut RgbaImage, rng: &mut StdRng) -> usize {
    let streaks = rain_streaks(surface.width(), surface.height(), rng);
    for &(from, to) in &streaks {
        draw::draw_line(surface, from, to, RAIN_COLOR, RAIN_ALPHA);
    }
    streaks.len()
}

struct CaptionLayout {
    rect: Rect,
    lines: [String; 2],
    scale: u32,
    padding: i64,
}

fn caption_layout(width: u32, height: u32, instruction: &str) -> CaptionLayout {
    let scale = (width / 320).clamp(1, 4);
    let padding = 4 * scale as i64;
    let advance = draw::advance(scale);

    let available = width as i64 - 2 * CAPTION_MARGIN - 2 * padding;
    let max_chars = (available / advance).max(0) as usize;

    let lines = [
        truncate(&format!("EDIT: {instruction}"), max_chars),
        truncate(NOTICE, max_chars),
    ];
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i64;

    let w = widest * advance + 2 * padding;
    let h = 2 * draw::line_height(scale) + 2 * padding;

    CaptionLayout {
        rect: Rect {
            x: CAPTION_MARGIN,
            y: height as i64 - CAPTION_MARGIN - h,
            w,
            h,
        },
        lines,
        scale,
        padding,
    }
}

fn draw_caption(surface: &mut RgbaImage, instruction: &str) {
    let layout = caption_layout(surface.width(), surface.height(), instruction);
    draw::fill_rect(surface, layout.rect, CAPTION_BG, CAPTION_ALPHA);

    let line_height = draw::line_height(layout.scale);
    for (i, line) in layout.lines.iter().enumerate() {
        draw::draw_text(
            surface,
            layout.rect.x + layout.padding,
            layout.rect.y + layout.padding + i as i64 * line_height,
            line,
            layout.scale,
            CAPTION_FG,
        );
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}
