use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use cueball_core::player::Player;

use crate::table::{BallColor, Point, TableConfig};

/// State of a single ball on the table.
///
/// Motion is stored as a scalar speed plus a heading, the form observers
/// render from. Speed is never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    /// Speed in table units per tick.
    pub velocity: f64,
    /// Heading in radians; meaningless while `velocity == 0`.
    pub angle: f64,
    pub color: BallColor,
    pub potted: bool,
    /// Who sank the ball. Set once, never for the cue ball.
    #[serde(with = "cueball_core::player::optional")]
    pub potted_by: Option<Player>,
    /// Whether the rules pass has already handled this pot.
    #[serde(skip)]
    pub(crate) accounted: bool,
}

// Equality is over observable state only; `accounted` never leaves the engine.
impl PartialEq for Ball {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.velocity == other.velocity
            && self.angle == other.angle
            && self.color == other.color
            && self.potted == other.potted
            && self.potted_by == other.potted_by
    }
}

impl Ball {
    pub fn new(color: BallColor, at: Point) -> Self {
        Self {
            x: at.x,
            y: at.y,
            velocity: 0.0,
            angle: 0.0,
            color,
            potted: false,
            potted_by: None,
            accounted: false,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        self.position().distance_to(other)
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != 0.0
    }

    /// Cartesian velocity `(vx, vy)`.
    pub fn velocity_components(&self) -> (f64, f64) {
        (
            self.velocity * self.angle.cos(),
            self.velocity * self.angle.sin(),
        )
    }

    /// Set speed and heading from a Cartesian velocity.
    pub fn set_velocity_components(&mut self, vx: f64, vy: f64) {
        self.velocity = vx.hypot(vy);
        self.angle = vy.atan2(vx);
    }

    /// Advance the ball by one tick. Returns the pocket index if the ball
    /// dropped this tick.
    ///
    /// Rails reflect one axis at a time, x before y; a ball driven into a
    /// corner gets both reflections in the same tick rather than a true
    /// corner normal.
    pub fn advance(&mut self, table: &TableConfig) -> Option<usize> {
        if self.potted {
            return None;
        }

        let (vx, vy) = self.velocity_components();
        self.x += vx;
        self.y += vy;
        self.velocity *= table.friction;

        let r = table.ball_radius;
        if self.x < r {
            self.x = r;
            self.angle = PI - self.angle;
        } else if self.x > table.width - r {
            self.x = table.width - r;
            self.angle = PI - self.angle;
        }

        if self.y < r {
            self.y = r;
            self.angle = -self.angle;
        } else if self.y > table.height - r {
            self.y = table.height - r;
            self.angle = -self.angle;
        }

        // Cloth grabs a slow ball outright instead of letting it creep.
        if self.velocity < table.rest_threshold {
            self.velocity = 0.0;
        }

        let pocket = table.pocket_at(self.position())?;
        self.potted = true;
        self.velocity = 0.0;
        Some(pocket)
    }
}
