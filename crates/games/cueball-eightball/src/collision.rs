//! Ball-to-ball contact: overlap test and impulse response.
//!
//! Balls have equal mass and radius. A contact swaps the velocity components
//! along the line of centres, scales both results by the table's restitution,
//! then separates the pair so the same contact does not fire again next tick.

use crate::physics::Ball;
use crate::table::TableConfig;

/// Whether two balls interpenetrate (centre distance strictly below `2r`).
pub fn overlapping(a: &Ball, b: &Ball, table: &TableConfig) -> bool {
    a.distance_to(b.position()) < table.contact_distance()
}

/// Resolve a contact between two overlapping, unpotted balls.
pub fn resolve(a: &mut Ball, b: &mut Ball, table: &TableConfig) {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let distance = dx.hypot(dy);

    // Coincident centres leave the line of centres undefined; any fixed
    // direction separates them.
    let (nx, ny) = if distance > 0.0 {
        (dx / distance, dy / distance)
    } else {
        (1.0, 0.0)
    };

    let (mut v1x, mut v1y) = a.velocity_components();
    let (mut v2x, mut v2y) = b.velocity_components();

    // Equal-mass elastic exchange along the normal; tangential parts untouched.
    let p = (v1x - v2x) * nx + (v1y - v2y) * ny;
    v1x -= p * nx;
    v1y -= p * ny;
    v2x += p * nx;
    v2y += p * ny;

    let e = table.restitution;
    a.set_velocity_components(v1x * e, v1y * e);
    b.set_velocity_components(v2x * e, v2y * e);

    let half_overlap = (table.contact_distance() - distance) / 2.0;
    a.x += nx * half_overlap;
    a.y += ny * half_overlap;
    b.x -= nx * half_overlap;
    b.y -= ny * half_overlap;
}

/// One pass over every unordered pair of unpotted balls, resolving each
/// overlap in index order. Returns the number of contacts resolved.
pub fn resolve_all(balls: &mut [Ball], table: &TableConfig) -> usize {
    let mut contacts = 0;
    for j in 1..balls.len() {
        let (head, tail) = balls.split_at_mut(j);
        let b = &mut tail[0];
        for a in head.iter_mut() {
            if a.potted || b.potted {
                continue;
            }
            if overlapping(a, b, table) {
                resolve(a, b, table);
                contacts += 1;
            }
        }
    }
    contacts
}
