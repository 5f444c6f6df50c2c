//! Path-building rasterization backend for the IconVG compact
//! vector-graphic format.
//!
//! The crate exposes the stateful [`Rasterizer`] command surface a decoder
//! drives, the view-box and palette metadata it consumes, and the
//! collaborator interfaces it renders through: a pluggable scanline
//! [`Coverage`] rasterizer, the [`Gradient`] paint configuration, and the
//! destination [`Image`].

mod arc;
mod color;
mod gradient;
mod math;
mod raster;
mod rasterizer;

pub use color::{Color, Rgba, Rgba64};
pub use gradient::{Gradient, GradientShape, Spread, Stop};
pub use math::{Rect, Vec2};
pub use raster::{Coverage, DrawOp, Image, Paint};
pub use rasterizer::{Metadata, Rasterizer, ViewBox};
