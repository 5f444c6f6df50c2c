//! The stateful command surface turning decoded drawing commands into
//! filled, anti-aliased paths on a destination image.

use std::f64::consts::PI;

use log::{debug, trace};
use thiserror::Error;

use crate::arc::CenterArc;
use crate::color::{Color, Rgba};
use crate::gradient::{Gradient, Spread, Stop};
use crate::math::{Rect, Vec2};
use crate::raster::{Coverage, DrawOp, Image, Paint};


/// Axis-aligned view-box rectangle in graphic coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl ViewBox {
    /// The format default, (-32, -32) to (+32, +32).
    pub const DEFAULT: Self = Self {
        min: Vec2::new(-32.0, -32.0),
        max: Vec2::new(32.0, 32.0),
    };

    /// Construct a view-box from its corners; `max` must exceed `min` on
    /// both axes for the transform to be well defined.
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }
}

impl Default for ViewBox {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decoded graphic metadata: the view-box and the 64-color palette that
/// seeds the color registers on reset.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub view_box: ViewBox,
    pub palette: [Rgba; 64],
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            view_box: ViewBox::DEFAULT,
            palette: [Rgba::OPAQUE_BLACK; 64],
        }
    }
}

/// Kind of the previous curve command, for smooth control-point reflection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Smooth {
    None,
    Quad,
    Cube,
}

/// Why paint resolution rejected the current path.
///
/// Never propagated past the command surface: the path is silently
/// disabled and the reason surfaces only in debug logs.
#[derive(Debug, Error)]
enum PaintError {
    #[error("malformed premultiplied color")]
    InvalidColor,
    #[error("fully transparent paint")]
    Transparent,
    #[error("gradient stop {index} color is not valid premultiplied")]
    StopColor { index: usize },
    #[error("gradient stop {index} offset {offset} is outside [0, 1]")]
    StopOffset { index: usize, offset: f32 },
    #[error("gradient stop {index} offset {offset} does not increase")]
    StopOrder { index: usize, offset: f32 },
}

/// Draws a decoded IconVG graphic onto a raster image.
///
/// A `Rasterizer` is driven by a decoder invoking the command methods in
/// byte-code order. It owns its coverage backend `Z` and its gradient
/// collaborator; the destination image is borrowed from the caller between
/// [`set_dst_image`](Rasterizer::set_dst_image) and the end of the borrow.
///
/// With no destination bound, every command is accepted and drawing is a
/// no-op, so a fresh rasterizer can be used to check a command stream
/// without producing pixels.
pub struct Rasterizer<'a, Z> {
    z: Z,

    dst: Option<&'a mut Image>,
    rect: Rect,
    draw_op: DrawOp,

    // scale and bias map the metadata view-box onto the rectangle
    // (0, 0)-(rect.dx(), rect.dy()), with x and y scaled independently.
    scale_x: f32,
    bias_x: f32,
    scale_y: f32,
    bias_y: f32,

    metadata: Metadata,

    lod0: f32,
    lod1: f32,
    c_sel: u8,
    n_sel: u8,

    disabled: bool,

    first_start_path: bool,
    prev_smooth: Smooth,
    prev_smooth_point: Vec2,

    flat_color: Rgba,
    use_gradient: bool,
    gradient: Gradient,

    c_reg: [Rgba; 64],
    n_reg: [f32; 64],
    stops: [Stop; 64],
}

impl<'a, Z: Coverage> Rasterizer<'a, Z> {
    /// Construct a rasterizer around a coverage backend, with default
    /// metadata and no destination bound.
    pub fn new(z: Z) -> Self {
        let metadata = Metadata::default();
        let mut r = Self {
            z,
            dst: None,
            rect: Rect::EMPTY,
            draw_op: DrawOp::default(),
            scale_x: 0.0,
            bias_x: 0.0,
            scale_y: 0.0,
            bias_y: 0.0,
            c_reg: metadata.palette,
            metadata,
            lod0: 0.0,
            lod1: f32::INFINITY,
            c_sel: 0,
            n_sel: 0,
            disabled: false,
            first_start_path: true,
            prev_smooth: Smooth::None,
            prev_smooth_point: Vec2::ZERO,
            flat_color: Rgba::TRANSPARENT,
            use_gradient: false,
            gradient: Gradient::default(),
            n_reg: [0.0; 64],
            stops: [Stop::default(); 64],
        };
        r.recalc_transform();
        r
    }

    /// The coverage backend, for inspection by the caller.
    pub fn coverage(&self) -> &Z {
        &self.z
    }

    /// Bind a destination image and pixel rectangle, with the compositing
    /// operator used for every draw until the next binding.
    ///
    /// The graphic has no fixed pixel size; it is scaled in the x and y
    /// dimensions independently to fit `rect`. An empty rectangle leaves
    /// the rasterizer accepting commands but drawing nothing.
    pub fn set_dst_image(&mut self, dst: &'a mut Image, rect: Rect, draw_op: DrawOp) {
        self.dst = Some(dst);
        self.rect = if rect.is_empty() { Rect::EMPTY } else { rect };
        self.draw_op = draw_op;
        trace!(
            "destination bound: {}x{} px at ({}, {})",
            self.rect.dx(),
            self.rect.dy(),
            self.rect.min_x,
            self.rect.min_y
        );
        self.recalc_transform();
    }

    /// Reset for the given metadata: reseed the color registers from the
    /// palette, zero the scalar registers and both selectors, and widen
    /// the level-of-detail range.
    pub fn reset(&mut self, metadata: Metadata) {
        self.metadata = metadata;
        self.lod0 = 0.0;
        self.lod1 = f32::INFINITY;
        self.c_sel = 0;
        self.n_sel = 0;
        self.first_start_path = true;
        self.prev_smooth = Smooth::None;
        self.prev_smooth_point = Vec2::ZERO;
        self.c_reg = self.metadata.palette;
        self.n_reg = [0.0; 64];
        trace!(
            "reset: view-box ({}, {})-({}, {})",
            self.metadata.view_box.min.x,
            self.metadata.view_box.min.y,
            self.metadata.view_box.max.x,
            self.metadata.view_box.max.y
        );
        self.recalc_transform();
    }

    fn recalc_transform(&mut self) {
        let vb = self.metadata.view_box;
        self.scale_x = self.rect.dx() as f32 / (vb.max.x - vb.min.x);
        self.bias_x = -vb.min.x;
        self.scale_y = self.rect.dy() as f32 / (vb.max.y - vb.min.y);
        self.bias_y = -vb.min.y;
    }

    /// Set the color-register selector, masked to the 64-entry bank.
    pub fn set_c_sel(&mut self, c_sel: u8) {
        self.c_sel = c_sel & 0x3f;
    }

    /// Set the scalar-register selector, masked to the 64-entry bank.
    pub fn set_n_sel(&mut self, n_sel: u8) {
        self.n_sel = n_sel & 0x3f;
    }

    /// Resolve `c` and store it in the color register `adj` slots below the
    /// selector, advancing the selector afterwards when `incr` is set.
    pub fn set_c_reg(&mut self, adj: u8, incr: bool, c: Color) {
        let slot = (self.c_sel.wrapping_sub(adj) & 0x3f) as usize;
        self.c_reg[slot] = c.resolve(&self.metadata.palette, &self.c_reg);
        if incr {
            self.c_sel = (self.c_sel + 1) & 0x3f;
        }
    }

    /// Store `f` in the scalar register `adj` slots below the selector,
    /// advancing the selector afterwards when `incr` is set.
    pub fn set_n_reg(&mut self, adj: u8, incr: bool, f: f32) {
        let slot = (self.n_sel.wrapping_sub(adj) & 0x3f) as usize;
        self.n_reg[slot] = f;
        if incr {
            self.n_sel = (self.n_sel + 1) & 0x3f;
        }
    }

    /// Set the level-of-detail bounds on the destination height: paths
    /// started while the height is outside `[lod0, lod1)` are skipped.
    pub fn set_lod(&mut self, lod0: f32, lod1: f32) {
        self.lod0 = lod0;
        self.lod1 = lod1;
    }

    fn abs_x(&self, x: f32) -> f32 {
        self.scale_x * (x + self.bias_x)
    }

    fn abs_y(&self, y: f32) -> f32 {
        self.scale_y * (y + self.bias_y)
    }

    fn rel_x(&self, x: f32) -> f32 {
        self.scale_x * x
    }

    fn rel_y(&self, y: f32) -> f32 {
        self.scale_y * y
    }

    fn unabs_x(&self, x: f32) -> f32 {
        x / self.scale_x - self.bias_x
    }

    fn unabs_y(&self, y: f32) -> f32 {
        y / self.scale_y - self.bias_y
    }

    fn abs_vec2(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(self.abs_x(x), self.abs_y(y))
    }

    fn rel_vec2(&self, x: f32, y: f32) -> Vec2 {
        let pen = self.z.pen();
        Vec2::new(pen.x + self.rel_x(x), pen.y + self.rel_y(y))
    }

    /// Implicit leading control point for smooth curve variants: the
    /// previous curve's trailing control reflected across the pen, or the
    /// pen itself when the previous command was not a curve of this kind.
    ///
    /// https://www.w3.org/TR/SVG/paths.html#PathDataCurveCommands
    fn implicit_smooth_point(&self, kind: Smooth) -> Vec2 {
        let pen = self.z.pen();
        if self.prev_smooth != kind {
            return pen;
        }
        pen * 2.0 - self.prev_smooth_point
    }

    fn resolve_paint(&mut self, adj: u8) -> Result<(), PaintError> {
        let rgba = self.c_reg[(self.c_sel.wrapping_sub(adj) & 0x3f) as usize];
        if rgba.is_valid_premul() {
            self.use_gradient = false;
            self.flat_color = rgba;
            if rgba.a == 0x00 {
                return Err(PaintError::Transparent);
            }
            Ok(())
        } else if rgba.is_gradient() {
            self.use_gradient = true;
            self.init_gradient(rgba)
        } else {
            Err(PaintError::InvalidColor)
        }
    }

    fn init_gradient(&mut self, rgba: Rgba) -> Result<(), PaintError> {
        let n_stops = rgba.gradient_stop_count();
        let c_base = rgba.gradient_c_base();
        let n_base = rgba.gradient_n_base();
        let mut prev = f64::NEG_INFINITY;
        for i in 0..n_stops {
            let c = self.c_reg[(c_base + i) & 0x3f];
            if !c.is_valid_premul() {
                return Err(PaintError::StopColor { index: i });
            }
            let n = self.n_reg[(n_base + i) & 0x3f];
            if !(0.0..=1.0).contains(&n) {
                return Err(PaintError::StopOffset { index: i, offset: n });
            }
            if f64::from(n) <= prev {
                return Err(PaintError::StopOrder { index: i, offset: n });
            }
            prev = f64::from(n);
            self.stops[i] = Stop {
                offset: f64::from(n),
                color: c.expand16(),
            };
        }

        let spread = Spread::from_code(rgba.gradient_spread_code());
        if !rgba.gradient_is_circular() {
            let x0 = self.abs_x(self.n_reg[n_base.wrapping_sub(4) & 0x3f]);
            let y0 = self.abs_y(self.n_reg[n_base.wrapping_sub(3) & 0x3f]);
            let x1 = self.abs_x(self.n_reg[n_base.wrapping_sub(2) & 0x3f]);
            let y1 = self.abs_y(self.n_reg[n_base.wrapping_sub(1) & 0x3f]);
            self.gradient.init_linear(
                f64::from(x0),
                f64::from(y0),
                f64::from(x1),
                f64::from(y1),
                spread,
                &self.stops[..n_stops],
            );
        } else {
            // TODO: honor the r1 radius at n_base-2, not just r2, and make
            // the radius elliptical in gradient space; rel_x bakes in the x
            // pixel scale, which differs from the y scale for non-square
            // destinations.
            let cx = self.abs_x(self.n_reg[n_base.wrapping_sub(4) & 0x3f]);
            let cy = self.abs_y(self.n_reg[n_base.wrapping_sub(3) & 0x3f]);
            let r = self.rel_x(self.n_reg[n_base.wrapping_sub(1) & 0x3f]);
            self.gradient.init_circular(
                f64::from(cx),
                f64::from(cy),
                f64::from(r),
                spread,
                &self.stops[..n_stops],
            );
        }
        Ok(())
    }

    /// Begin a new path at (x, y), resolving the paint from the color
    /// register `adj` slots below the selector.
    ///
    /// The path is disabled, and every later command through the matching
    /// close is a no-op, when the paint is malformed or fully transparent,
    /// when its gradient fails validation, or when the destination height
    /// falls outside the level-of-detail range.
    pub fn start_path(&mut self, adj: u8, x: f32, y: f32) {
        self.disabled = match self.resolve_paint(adj) {
            Ok(()) => false,
            Err(err) => {
                debug!("path disabled: {err}");
                true
            }
        };

        let width = self.rect.dx();
        let height = self.rect.dy();
        let h = height as f32;
        if !(self.lod0 <= h && h < self.lod1) {
            debug!(
                "path disabled: destination height {h} outside lod [{}, {})",
                self.lod0, self.lod1
            );
            self.disabled = true;
        }
        if self.disabled {
            return;
        }

        self.z.reset(width, height);
        if self.first_start_path {
            self.first_start_path = false;
            self.z.set_draw_op(self.draw_op);
        }
        self.prev_smooth = Smooth::None;
        self.z.move_to(self.abs_vec2(x, y));
    }

    /// Close the current subpath and fill the accumulated path onto the
    /// bound destination with the paint resolved at the path start.
    pub fn close_path_end_path(&mut self) {
        if self.disabled {
            return;
        }
        self.z.close_path();
        let Some(dst) = self.dst.as_deref_mut() else {
            return;
        };
        let paint = if self.use_gradient {
            Paint::Gradient(&self.gradient)
        } else {
            Paint::Solid(self.flat_color)
        };
        self.z.draw(dst, self.rect, paint, Vec2::ZERO);
    }

    /// Close the current subpath and begin another at the absolute (x, y).
    pub fn close_path_abs_move_to(&mut self, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        self.z.close_path();
        self.z.move_to(self.abs_vec2(x, y));
    }

    /// Close the current subpath and begin another at the pen-relative
    /// (x, y).
    pub fn close_path_rel_move_to(&mut self, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        self.z.close_path();
        self.z.move_to(self.rel_vec2(x, y));
    }

    /// Horizontal line to the absolute x, holding y at the pen.
    pub fn abs_h_line_to(&mut self, x: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        let pen = self.z.pen();
        self.z.line_to(Vec2::new(self.abs_x(x), pen.y));
    }

    pub fn rel_h_line_to(&mut self, x: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        let pen = self.z.pen();
        self.z.line_to(Vec2::new(pen.x + self.rel_x(x), pen.y));
    }

    /// Vertical line to the absolute y, holding x at the pen.
    pub fn abs_v_line_to(&mut self, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        let pen = self.z.pen();
        self.z.line_to(Vec2::new(pen.x, self.abs_y(y)));
    }

    pub fn rel_v_line_to(&mut self, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        let pen = self.z.pen();
        self.z.line_to(Vec2::new(pen.x, pen.y + self.rel_y(y)));
    }

    /// Straight line to the absolute (x, y).
    pub fn abs_line_to(&mut self, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        self.z.line_to(self.abs_vec2(x, y));
    }

    pub fn rel_line_to(&mut self, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;
        self.z.line_to(self.rel_vec2(x, y));
    }

    /// Quadratic Bézier to the absolute (x, y), with the control point
    /// reflected from the previous quadratic.
    pub fn abs_smooth_quad_to(&mut self, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        let c = self.implicit_smooth_point(Smooth::Quad);
        self.prev_smooth = Smooth::Quad;
        self.prev_smooth_point = c;
        self.z.quad_to(c, self.abs_vec2(x, y));
    }

    pub fn rel_smooth_quad_to(&mut self, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        let c = self.implicit_smooth_point(Smooth::Quad);
        self.prev_smooth = Smooth::Quad;
        self.prev_smooth_point = c;
        self.z.quad_to(c, self.rel_vec2(x, y));
    }

    /// Quadratic Bézier to the absolute (x, y) with control (x1, y1).
    pub fn abs_quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::Quad;
        self.prev_smooth_point = self.abs_vec2(x1, y1);
        self.z.quad_to(self.prev_smooth_point, self.abs_vec2(x, y));
    }

    pub fn rel_quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::Quad;
        self.prev_smooth_point = self.rel_vec2(x1, y1);
        self.z.quad_to(self.prev_smooth_point, self.rel_vec2(x, y));
    }

    /// Cubic Bézier to the absolute (x, y), with the first control point
    /// reflected from the previous cubic and the second at (x2, y2).
    pub fn abs_smooth_cube_to(&mut self, x2: f32, y2: f32, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        let c1 = self.implicit_smooth_point(Smooth::Cube);
        self.prev_smooth = Smooth::Cube;
        self.prev_smooth_point = self.abs_vec2(x2, y2);
        self.z.cube_to(c1, self.prev_smooth_point, self.abs_vec2(x, y));
    }

    pub fn rel_smooth_cube_to(&mut self, x2: f32, y2: f32, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        let c1 = self.implicit_smooth_point(Smooth::Cube);
        self.prev_smooth = Smooth::Cube;
        self.prev_smooth_point = self.rel_vec2(x2, y2);
        self.z.cube_to(c1, self.prev_smooth_point, self.rel_vec2(x, y));
    }

    /// Cubic Bézier to the absolute (x, y) with controls (x1, y1) and
    /// (x2, y2).
    pub fn abs_cube_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::Cube;
        self.prev_smooth_point = self.abs_vec2(x2, y2);
        self.z
            .cube_to(self.abs_vec2(x1, y1), self.prev_smooth_point, self.abs_vec2(x, y));
    }

    pub fn rel_cube_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::Cube;
        self.prev_smooth_point = self.rel_vec2(x2, y2);
        self.z
            .cube_to(self.rel_vec2(x1, y1), self.prev_smooth_point, self.rel_vec2(x, y));
    }

    /// Elliptic arc to the absolute (x, y), approximated by cubic Béziers.
    ///
    /// `rx` and `ry` are the ellipse radii in graphic units,
    /// `x_axis_rotation` is in turns, and `large_arc`/`sweep` select among
    /// the four candidate arcs as in SVG path data.
    pub fn abs_arc_to(
        &mut self,
        rx: f32,
        ry: f32,
        x_axis_rotation: f32,
        large_arc: bool,
        sweep: bool,
        x: f32,
        y: f32,
    ) {
        if self.disabled {
            return;
        }
        self.prev_smooth = Smooth::None;

        let rx = f64::from(rx).abs();
        let ry = f64::from(ry).abs();
        if !(rx > 0.0 && ry > 0.0) {
            // Degenerate radii (including NaN) collapse to a straight line
            // to the endpoint, taken here in graphic coordinates, unmapped;
            // existing renderings depend on this exact output.
            self.z.line_to(Vec2::new(x, y));
            return;
        }

        // Center parameterization happens in graphic coordinates: the radii
        // scale with the graphic rather than the destination, and the two
        // pixel scales can differ under an x-axis rotation. Control points
        // convert to pixels at emission.
        let pen = self.z.pen();
        let x1 = f64::from(self.unabs_x(pen.x));
        let y1 = f64::from(self.unabs_y(pen.y));
        let phi = 2.0 * PI * f64::from(x_axis_rotation);

        let arc = CenterArc::from_endpoints(
            x1,
            y1,
            f64::from(x),
            f64::from(y),
            rx,
            ry,
            phi,
            large_arc,
            sweep,
        );
        let n = arc.segments();
        for i in 0..n {
            let theta_a = arc.theta1 + arc.delta_theta * i as f64 / n as f64;
            let theta_b = arc.theta1 + arc.delta_theta * (i + 1) as f64 / n as f64;
            let [c1, c2, p] = arc.segment_cubic(theta_a, theta_b);
            let c1 = self.abs_vec2(c1.0 as f32, c1.1 as f32);
            let c2 = self.abs_vec2(c2.0 as f32, c2.1 as f32);
            let p = self.abs_vec2(p.0 as f32, p.1 as f32);
            self.z.cube_to(c1, c2, p);
        }
    }

    /// Elliptic arc to the pen-relative (x, y).
    pub fn rel_arc_to(
        &mut self,
        rx: f32,
        ry: f32,
        x_axis_rotation: f32,
        large_arc: bool,
        sweep: bool,
        x: f32,
        y: f32,
    ) {
        let a = self.rel_vec2(x, y);
        let gx = self.unabs_x(a.x);
        let gy = self.unabs_y(a.y);
        self.abs_arc_to(rx, ry, x_axis_rotation, large_arc, sweep, gx, gy);
    }
}

impl<Z: Coverage + Default> Default for Rasterizer<'_, Z> {
    fn default() -> Self {
        Self::new(Z::default())
    }
}
