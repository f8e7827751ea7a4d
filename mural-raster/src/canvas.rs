//! The canvas: a fixed-size RGBA8 buffer plus the rasterization machinery
//! that applies operations to it.
//!
//! Pixels are stored the way `tiny-skia` keeps them: row-major RGBA8 with
//! premultiplied alpha. Snapshot bytes round-trip through [`Canvas::init`]
//! unchanged, so a mirror seeded from a snapshot is bit-identical to the
//! source buffer.

use cosmic_text::{Attrs, Buffer, Color as GlyphColor, FontSystem, Metrics, Shaping, SwashCache};
use thiserror::Error;
use tiny_skia::{FillRule, LineCap, Paint, PathBuilder, Pixmap, Stroke, Transform};

use mural_core::{LineOp, Operation, TextOp};

/// Raster errors.
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// Zero or overflowing canvas dimensions.
    #[error("invalid canvas dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// A full copy of the canvas state, sufficient to reconstruct exact pixels
/// elsewhere. This is what a newly joined session receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Snapshot {
    /// Wrap the snapshot as the init operation sent to a joining session.
    pub fn into_op(self) -> Operation {
        Operation::init(self.width, self.height, self.pixels)
    }
}

/// A mutable pixel buffer that applies drawing operations deterministically.
///
/// Dimensions are set by [`Canvas::init`] and change no other way. Applying
/// or snapshotting before `init` is a programmer error and panics: the
/// relay initializes its canvas at startup, and a mirror applies the
/// server's init before anything else, so neither path can reach an
/// uninitialized buffer.
pub struct Canvas {
    pixmap: Option<Pixmap>,
    // Font discovery is done once here, not per text operation.
    fonts: FontSystem,
    glyphs: SwashCache,
}

impl Canvas {
    /// Create an uninitialized canvas.
    pub fn new() -> Self {
        Self {
            pixmap: None,
            fonts: FontSystem::new(),
            glyphs: SwashCache::new(),
        }
    }

    /// Create a canvas and initialize it blank at the given size.
    pub fn with_size(width: u32, height: u32) -> Result<Self, RasterError> {
        let mut canvas = Self::new();
        canvas.init(width, height, &[])?;
        Ok(canvas)
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.pixmap.is_some()
    }

    /// Canvas width in pixels. Panics before `init`.
    pub fn width(&self) -> u32 {
        self.pixmap.as_ref().expect("canvas not initialized").width()
    }

    /// Canvas height in pixels. Panics before `init`.
    pub fn height(&self) -> u32 {
        self.pixmap
            .as_ref()
            .expect("canvas not initialized")
            .height()
    }

    /// (Re)allocate the buffer at `width`×`height`, zero-filled, then
    /// overwrite it with `seed` if the length matches exactly. A non-empty
    /// seed of the wrong length is logged and ignored, leaving the buffer
    /// blank.
    pub fn init(&mut self, width: u32, height: u32, seed: &[u8]) -> Result<(), RasterError> {
        let mut pixmap =
            Pixmap::new(width, height).ok_or(RasterError::InvalidDimensions { width, height })?;
        if !seed.is_empty() {
            if seed.len() == pixmap.data().len() {
                pixmap.data_mut().copy_from_slice(seed);
            } else {
                log::warn!(
                    "seed buffer is {} bytes, expected {} for {width}x{height}; leaving blank",
                    seed.len(),
                    pixmap.data().len()
                );
            }
        }
        self.pixmap = Some(pixmap);
        Ok(())
    }

    /// Apply any operation. `Init` re-runs [`Canvas::init`]; `Line` and
    /// `Text` rasterize onto the buffer and panic before `init`.
    pub fn apply(&mut self, op: &Operation) -> Result<(), RasterError> {
        match op {
            Operation::Init(init) => self.init(init.width, init.height, &init.data),
            Operation::Line(line) => {
                self.line(line);
                Ok(())
            }
            Operation::Text(text) => {
                self.text(text);
                Ok(())
            }
        }
    }

    /// Stroke one straight segment, round caps, anti-aliased. A zero-length
    /// segment still leaves a round dot of the stroke width.
    pub fn line(&mut self, op: &LineOp) {
        let pixmap = self.pixmap.as_mut().expect("canvas not initialized");

        let mut paint = Paint::default();
        paint.set_color_rgba8(op.color.r, op.color.g, op.color.b, op.color.a);
        paint.anti_alias = true;

        let (x1, y1) = (op.x1 as f32, op.y1 as f32);
        let (x2, y2) = (op.x2 as f32, op.y2 as f32);
        let width = op.width.max(0.0) as f32;

        if x1 == x2 && y1 == y2 {
            let radius = (width / 2.0).max(0.5);
            if let Some(path) = PathBuilder::from_circle(x1, y1, radius) {
                pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(x1, y1);
        pb.line_to(x2, y2);
        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width,
                line_cap: LineCap::Round,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    /// Draw a text run with `op.y` as the baseline. Empty text paints
    /// nothing. Glyphs are shaped with cosmic-text and alpha-blended onto
    /// the buffer.
    pub fn text(&mut self, op: &TextOp) {
        if op.text.is_empty() {
            return;
        }
        let size = op.size as f32;
        if size <= 0.0 {
            return;
        }
        let pixmap = self.pixmap.as_mut().expect("canvas not initialized");

        let mut buffer = Buffer::new(&mut self.fonts, Metrics::new(size, size * 1.2));
        // Unbounded: a run placed near the right edge clips, it does not wrap.
        buffer.set_size(&mut self.fonts, None, None);
        buffer.set_text(&mut self.fonts, &op.text, Attrs::new(), Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.fonts, false);

        // The buffer's origin is its top-left; the baseline sits roughly one
        // em below it.
        let ox = op.x.round() as i32;
        let oy = (op.y - op.size).round() as i32;

        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let data = pixmap.data_mut();
        let color = GlyphColor::rgba(op.color.r, op.color.g, op.color.b, op.color.a);

        buffer.draw(&mut self.fonts, &mut self.glyphs, color, |x, y, w, h, c| {
            if c.a() == 0 {
                return;
            }
            for row in 0..h as i32 {
                let dy = oy + y + row;
                if dy < 0 || dy >= height {
                    continue;
                }
                for col in 0..w as i32 {
                    let dx = ox + x + col;
                    if dx < 0 || dx >= width {
                        continue;
                    }
                    blend_pixel(data, ((dy * width + dx) as usize) * 4, c);
                }
            }
        });
    }

    /// A consistent copy of the current buffer. Panics before `init`.
    pub fn snapshot(&self) -> Snapshot {
        let pixmap = self.pixmap.as_ref().expect("canvas not initialized");
        Snapshot {
            width: pixmap.width(),
            height: pixmap.height(),
            pixels: pixmap.data().to_vec(),
        }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

/// Source-over one glyph pixel onto the premultiplied destination.
fn blend_pixel(data: &mut [u8], idx: usize, color: GlyphColor) {
    let a = color.a() as u32;
    let inv = 255 - a;
    let src = [
        color.r() as u32 * a / 255,
        color.g() as u32 * a / 255,
        color.b() as u32 * a / 255,
        a,
    ];
    for ch in 0..4 {
        let dst = data[idx + ch] as u32;
        data[idx + ch] = (src[ch] + dst * inv / 255).min(255) as u8;
    }
}
