//! Elliptic arc support: endpoint parameterization to center form, and
//! per-quadrant cubic Bézier approximation.
//!
//! Everything here works in f64 and in graphic (view-box) coordinates; the
//! caller converts control points to destination pixels when emitting.

use std::f64::consts::PI;

/// Signed angle from vector u to vector v, in radians.
///
/// The cosine is clamped into [-1, +1] before `acos`, so nearly collinear
/// inputs map to 0 or pi instead of NaN. Negative iff v lies clockwise of u.
pub(crate) fn signed_angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
    let norm = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
    let cos = (ux * vx + uy * vy) / norm;
    let ret = if cos <= -1.0 {
        PI
    } else if cos >= 1.0 {
        0.0
    } else {
        cos.acos()
    };
    if ux * vy < uy * vx {
        -ret
    } else {
        ret
    }
}

/// Center parameterization of an elliptic arc.
#[derive(Debug, Copy, Clone)]
pub(crate) struct CenterArc {
    pub cx: f64,
    pub cy: f64,
    pub theta1: f64,
    pub delta_theta: f64,
    pub rx: f64,
    pub ry: f64,
    pub cos_phi: f64,
    pub sin_phi: f64,
}

impl CenterArc {
    /// Convert an endpoint-parameterized arc to center form, following
    /// https://www.w3.org/TR/SVG/implnote.html#ArcConversionEndpointToCenter
    /// plus the radius-correction step shipping implementations add.
    ///
    /// Endpoints are (x1, y1) and (x2, y2); `rx` and `ry` must be positive;
    /// `phi` is the x-axis rotation in radians.
    pub(crate) fn from_endpoints(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        rx: f64,
        ry: f64,
        phi: f64,
        large_arc: bool,
        sweep: bool,
    ) -> Self {
        let (sin_phi, cos_phi) = phi.sin_cos();

        // Step 1: (x1', y1') — midpoint-translated, derotated endpoint.
        let half_dx = (x1 - x2) / 2.0;
        let half_dy = (y1 - y2) / 2.0;
        let x1p = cos_phi * half_dx + sin_phi * half_dy;
        let y1p = -sin_phi * half_dx + cos_phi * half_dy;

        let (mut rx, mut ry) = (rx, ry);
        let mut rx_sq = rx * rx;
        let mut ry_sq = ry * ry;
        let x1p_sq = x1p * x1p;
        let y1p_sq = y1p * y1p;

        // Scale up radii that are too small to span the endpoints.
        let radii_check = x1p_sq / rx_sq + y1p_sq / ry_sq;
        if radii_check > 1.0 {
            let c = radii_check.sqrt();
            rx *= c;
            ry *= c;
            rx_sq = rx * rx;
            ry_sq = ry * ry;
        }

        // Step 2: (cx', cy').
        let denom = rx_sq * y1p_sq + ry_sq * x1p_sq;
        let mut step = 0.0;
        let a = rx_sq * ry_sq / denom - 1.0;
        if a > 0.0 {
            step = a.sqrt();
        }
        if large_arc == sweep {
            step = -step;
        }
        let cxp = step * rx * y1p / ry;
        let cyp = -step * ry * x1p / rx;

        // Step 3: rotate and translate back to get the center.
        let cx = cos_phi * cxp - sin_phi * cyp + (x1 + x2) / 2.0;
        let cy = sin_phi * cxp + cos_phi * cyp + (y1 + y2) / 2.0;

        // Step 4: start angle and sweep angle.
        let ax = (x1p - cxp) / rx;
        let ay = (y1p - cyp) / ry;
        let bx = (-x1p - cxp) / rx;
        let by = (-y1p - cyp) / ry;
        let theta1 = signed_angle(1.0, 0.0, ax, ay);
        let mut delta_theta = signed_angle(ax, ay, bx, by);
        if sweep {
            if delta_theta < 0.0 {
                delta_theta += 2.0 * PI;
            }
        } else if delta_theta > 0.0 {
            delta_theta -= 2.0 * PI;
        }

        Self {
            cx,
            cy,
            theta1,
            delta_theta,
            rx,
            ry,
            cos_phi,
            sin_phi,
        }
    }

    /// Number of cubic segments, each spanning at most a quadrant.
    ///
    /// The 0.001 slack keeps an exact quarter turn from splitting in two.
    pub(crate) fn segments(&self) -> usize {
        (self.delta_theta.abs() / (PI / 2.0 + 0.001)).ceil() as usize
    }

    /// Control points of the cubic approximating the [theta1, theta2] slice,
    /// in graphic coordinates. The control-point formulae match librsvg.
    pub(crate) fn segment_cubic(&self, theta1: f64, theta2: f64) -> [(f64, f64); 3] {
        let half_delta = (theta2 - theta1) * 0.5;
        let q = (half_delta * 0.5).sin();
        let t = (8.0 * q * q) / (3.0 * half_delta.sin());
        let (sin1, cos1) = theta1.sin_cos();
        let (sin2, cos2) = theta2.sin_cos();
        let x1 = self.rx * (cos1 - t * sin1);
        let y1 = self.ry * (sin1 + t * cos1);
        let x2 = self.rx * (cos2 + t * sin2);
        let y2 = self.ry * (sin2 - t * cos2);
        let x3 = self.rx * cos2;
        let y3 = self.ry * sin2;
        [
            self.place(x1, y1),
            self.place(x2, y2),
            self.place(x3, y3),
        ]
    }

    fn place(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.cx + self.cos_phi * x - self.sin_phi * y,
            self.cy + self.sin_phi * x + self.cos_phi * y,
        )
    }
}
