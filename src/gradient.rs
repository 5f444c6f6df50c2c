//! Gradient paint configuration shared with the downstream sampler.
//!
//! The rasterizer validates and assembles this configuration when a path
//! starts on a gradient descriptor; the per-pixel color lookup lives in the
//! sampler that consumes it.

use crate::color::Rgba64;

/// Gradient edge behavior outside the [0, 1] stop range.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Spread {
    /// No extension; samples outside the range are transparent.
    #[default]
    None,
    /// Clamp to the first or last stop color.
    Pad,
    /// Mirror the stop range back and forth.
    Reflect,
    /// Tile the stop range.
    Repeat,
}

impl Spread {
    /// Decode the descriptor's 2-bit spread code.
    pub fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => Spread::None,
            1 => Spread::Pad,
            2 => Spread::Reflect,
            _ => Spread::Repeat,
        }
    }
}

/// A gradient stop with a normalized offset in [0, 1].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Stop {
    /// Normalized offset; strictly increasing across a gradient's stops.
    pub offset: f64,
    /// Premultiplied stop color, widened to 16 bits per channel.
    pub color: Rgba64,
}

/// Gradient geometry in destination pixel space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GradientShape {
    /// Linear gradient along the segment from (x0, y0) to (x1, y1).
    Linear { x0: f64, y0: f64, x1: f64, y1: f64 },
    /// Circular gradient of radius r around (cx, cy).
    Circular { cx: f64, cy: f64, r: f64 },
}

/// Paint source configured per gradient path.
///
/// One instance lives inside the rasterizer and is reinitialized for each
/// path that starts on a gradient descriptor. Both `init` calls replace the
/// entire configuration.
#[derive(Debug, Clone)]
pub struct Gradient {
    shape: GradientShape,
    spread: Spread,
    stops: Vec<Stop>,
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            shape: GradientShape::Linear {
                x0: 0.0,
                y0: 0.0,
                x1: 0.0,
                y1: 0.0,
            },
            spread: Spread::None,
            stops: Vec::new(),
        }
    }
}

impl Gradient {
    /// Configure a linear gradient between two pixel-space points.
    pub fn init_linear(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, spread: Spread, stops: &[Stop]) {
        self.shape = GradientShape::Linear { x0, y0, x1, y1 };
        self.replace(spread, stops);
    }

    /// Configure a circular gradient around a pixel-space center.
    pub fn init_circular(&mut self, cx: f64, cy: f64, r: f64, spread: Spread, stops: &[Stop]) {
        self.shape = GradientShape::Circular { cx, cy, r };
        self.replace(spread, stops);
    }

    fn replace(&mut self, spread: Spread, stops: &[Stop]) {
        self.spread = spread;
        self.stops.clear();
        self.stops.extend_from_slice(stops);
    }

    /// The configured geometry.
    pub fn shape(&self) -> GradientShape {
        self.shape
    }

    /// The configured spread mode.
    pub fn spread(&self) -> Spread {
        self.spread
    }

    /// The configured stops, in increasing offset order.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }
}
