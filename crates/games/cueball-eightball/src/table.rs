use serde::{Deserialize, Serialize};

/// A point on the table cloth, in table units (origin at the top-left corner).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Identity of a ball. The two object-ball groups share colours; the rack
/// order distinguishes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BallColor {
    Yellow,
    Blue,
    Red,
    Purple,
    Orange,
    Green,
    Brown,
    Black,
    White,
}

impl BallColor {
    /// The white ball is the cue ball.
    pub fn is_cue(self) -> bool {
        self == Self::White
    }

    pub fn is_black(self) -> bool {
        self == Self::Black
    }

    /// Any ball other than the cue ball and the black.
    pub fn is_object(self) -> bool {
        !self.is_cue() && !self.is_black()
    }
}

/// Immutable table geometry and physical constants for one match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TableConfig {
    pub width: f64,
    pub height: f64,
    pub ball_radius: f64,
    /// Speed multiplier applied once per tick (cloth drag).
    pub friction: f64,
    /// Velocity multiplier applied to both balls after a contact.
    pub restitution: f64,
    pub pocket_radius: f64,
    /// Four corners then the two mid-rail pockets.
    pub pockets: [Point; 6],
    /// Speeds below this snap to exactly zero after integration.
    pub rest_threshold: f64,
    /// Where the cue ball starts each rack.
    pub cue_spot: Point,
    /// First candidate for a ball-in-hand respot.
    pub respot_origin: Point,
    /// Step between respot candidates, both along a row and between rows.
    pub respot_step: f64,
    /// A respot row wraps once x passes `width - respot_margin`.
    pub respot_margin: f64,
}

impl TableConfig {
    pub const STANDARD: Self = Self {
        width: 800.0,
        height: 400.0,
        ball_radius: 10.0,
        friction: 0.98,
        restitution: 0.9,
        pocket_radius: 20.0,
        pockets: [
            Point::new(0.0, 0.0),
            Point::new(400.0, 0.0),
            Point::new(800.0, 0.0),
            Point::new(0.0, 400.0),
            Point::new(400.0, 400.0),
            Point::new(800.0, 400.0),
        ],
        rest_threshold: 0.01,
        cue_spot: Point::new(200.0, 200.0),
        respot_origin: Point::new(100.0, 200.0),
        respot_step: 20.0,
        respot_margin: 100.0,
    };

    /// Minimum centre distance between two balls that are not touching.
    pub fn contact_distance(&self) -> f64 {
        2.0 * self.ball_radius
    }

    /// Index of the first pocket whose capture radius strictly contains `p`.
    pub fn pocket_at(&self, p: Point) -> Option<usize> {
        self.pockets
            .iter()
            .position(|pocket| p.distance_to(*pocket) < self.pocket_radius)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// The fixed opening rack: colour and position for the fifteen object balls,
/// apex first. The cue ball is added separately at [`TableConfig::cue_spot`].
pub const RACK: [(BallColor, Point); 15] = [
    (BallColor::Yellow, Point::new(400.0, 200.0)),
    (BallColor::Blue, Point::new(430.0, 185.0)),
    (BallColor::Red, Point::new(430.0, 215.0)),
    (BallColor::Purple, Point::new(460.0, 170.0)),
    (BallColor::Orange, Point::new(460.0, 200.0)),
    (BallColor::Green, Point::new(460.0, 230.0)),
    (BallColor::Brown, Point::new(490.0, 155.0)),
    (BallColor::Black, Point::new(490.0, 185.0)),
    (BallColor::Yellow, Point::new(490.0, 215.0)),
    (BallColor::Blue, Point::new(490.0, 245.0)),
    (BallColor::Red, Point::new(520.0, 140.0)),
    (BallColor::Purple, Point::new(520.0, 170.0)),
    (BallColor::Orange, Point::new(520.0, 200.0)),
    (BallColor::Green, Point::new(520.0, 230.0)),
    (BallColor::Brown, Point::new(520.0, 260.0)),
];

/// Number of object balls (everything but cue and black) in a full rack.
pub const OBJECT_BALL_COUNT: usize = 14;
