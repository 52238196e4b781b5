use cueball_core::player::Player;

use crate::physics::Ball;
use crate::table::{OBJECT_BALL_COUNT, Point, TableConfig};

/// Winner of a frame ended by potting the black.
///
/// The black is the last ball: sinking it with every object ball already
/// retired wins for the shooter, sinking it early hands the frame to the
/// opponent.
pub fn black_ball_winner(shooter: Player, object_balls_retired: usize) -> Player {
    if object_balls_retired >= OBJECT_BALL_COUNT {
        shooter
    } else {
        shooter.other()
    }
}

/// Ball-in-hand placement for the cue ball after a scratch.
///
/// Candidates start at the respot origin and step rightward, wrapping to the
/// next row once past the right margin. The first candidate clear of every
/// other unpotted ball wins. Rows stop at the bottom rail; a completely
/// covered grid falls back to the cue spot.
pub fn find_respot(balls: &[Ball], cue_index: usize, table: &TableConfig) -> Point {
    let clearance = table.contact_distance();
    let occupied = |candidate: Point| {
        balls
            .iter()
            .enumerate()
            .any(|(i, b)| i != cue_index && !b.potted && b.distance_to(candidate) < clearance)
    };

    let mut candidate = table.respot_origin;
    while candidate.y <= table.height - table.ball_radius {
        if !occupied(candidate) {
            return candidate;
        }
        candidate.x += table.respot_step;
        if candidate.x > table.width - table.respot_margin {
            candidate.x = table.respot_origin.x;
            candidate.y += table.respot_step;
        }
    }

    tracing::warn!(
        fallback_x = table.cue_spot.x,
        fallback_y = table.cue_spot.y,
        "no free respot position, using cue spot"
    );
    table.cue_spot
}
