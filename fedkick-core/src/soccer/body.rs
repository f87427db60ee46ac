//! Circular rigid bodies on the field.

/// Position and velocity access shared by every body.
pub(super) trait Body {
    fn position(&self) -> (f64, f64);

    /// Moves the body by `(dx, dy)` and adds `(dvx, dvy)` to its velocity.
    fn nudge(&mut self, dx: f64, dy: f64, dvx: f64, dvy: f64);
}

/// The ball.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ball {
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Velocity x.
    pub vx: f64,
    /// Velocity y.
    pub vy: f64,
}

/// A player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Player {
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Velocity x.
    pub vx: f64,
    /// Velocity y.
    pub vy: f64,
    /// Heading in radians, updated by directional actions.
    pub facing: f64,
}

/// A cone, an obstacle that can be pushed around and spun.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cone {
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Velocity x.
    pub vx: f64,
    /// Velocity y.
    pub vy: f64,
    /// Orientation in radians.
    pub angle: f64,
    /// Change of orientation per step.
    pub angular_velocity: f64,
}

impl Cone {
    pub(super) fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }
}

macro_rules! impl_body {
    ($t:ty) => {
        impl Body for $t {
            fn position(&self) -> (f64, f64) {
                (self.x, self.y)
            }

            fn nudge(&mut self, dx: f64, dy: f64, dvx: f64, dvy: f64) {
                self.x += dx;
                self.y += dy;
                self.vx += dvx;
                self.vy += dvy;
            }
        }
    };
}

impl_body!(Ball);
impl_body!(Player);
impl_body!(Cone);

/// Unit contact normal from `a` to `b` and the overlap of two discs whose
/// radii sum to `min_dist`, if they overlap. Coincident centres are ignored.
pub(super) fn contact(a: (f64, f64), b: (f64, f64), min_dist: f64) -> Option<(f64, f64, f64)> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let dist = dx.hypot(dy);
    if dist < min_dist && dist > 0.0 {
        Some((dx / dist, dy / dist, min_dist - dist))
    } else {
        None
    }
}

/// Normalizes a vector, leaving the zero vector unchanged.
pub(super) fn normalise(x: f64, y: f64) -> (f64, f64) {
    let len = x.hypot(y);
    let len = if len == 0.0 { 1.0 } else { len };
    (x / len, y / len)
}
