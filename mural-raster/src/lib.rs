//! # mural-raster — the authoritative pixel buffer
//!
//! A [`Canvas`] owns a single RGBA8 raster and applies drawing operations
//! to it deterministically: the same operation sequence always yields the
//! same pixels. The relay holds one canvas as the source of truth; each
//! mirror client holds another and converges by applying the same stream.
//!
//! Rasterization uses `tiny-skia` for stroked paths and `cosmic-text`
//! (shaping + swash glyph rasterization) for text runs.

pub mod canvas;

pub use canvas::{Canvas, RasterError, Snapshot};
