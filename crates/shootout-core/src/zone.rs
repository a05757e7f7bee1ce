use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of target zones on the goal face (3x3 grid).
pub const ZONE_COUNT: u8 = 9;

/// Highest valid zone index.
pub const MAX_ZONE: u8 = ZONE_COUNT - 1;

/// Keeper points at or above which the shot is saved.
pub const SAVE_THRESHOLD: u8 = 2;

/// Vertical band of the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Height {
    High,
    Mid,
    Low,
}

/// Horizontal band of the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Center,
    Right,
}

/// A zone expressed on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub height: Height,
    pub side: Side,
}

// Row-major: row = height, column = side.
const HEIGHTS: [Height; ZONE_COUNT as usize] = [
    Height::High,
    Height::High,
    Height::High,
    Height::Mid,
    Height::Mid,
    Height::Mid,
    Height::Low,
    Height::Low,
    Height::Low,
];

const SIDES: [Side; ZONE_COUNT as usize] = [
    Side::Left,
    Side::Center,
    Side::Right,
    Side::Left,
    Side::Center,
    Side::Right,
    Side::Left,
    Side::Center,
    Side::Right,
];

/// Clamp an arbitrary client-supplied zone index into `0..=8`.
pub fn clamp_zone(zone_id: i64) -> u8 {
    zone_id.clamp(0, MAX_ZONE as i64) as u8
}

/// Map a zone index onto its (height, side) pair. Out-of-range input is
/// clamped rather than rejected.
pub fn translate_zone(zone_id: i64) -> Zone {
    let idx = clamp_zone(zone_id) as usize;
    Zone {
        height: HEIGHTS[idx],
        side: SIDES[idx],
    }
}

/// Overlap between a shot and a save: +1 for matching height, +1 for
/// matching side.
pub fn score(shot: Zone, save: Zone) -> u8 {
    u8::from(shot.height == save.height) + u8::from(shot.side == save.side)
}

/// Keeper points for a pair of raw zone indices.
pub fn keeper_points(shooter_zone: u8, keeper_zone: u8) -> u8 {
    score(
        translate_zone(shooter_zone.into()),
        translate_zone(keeper_zone.into()),
    )
}

/// A shot is a goal unless the keeper matched both axes.
pub fn is_goal(keeper_points: u8) -> bool {
    keeper_points < SAVE_THRESHOLD
}

/// Uniformly random valid zone.
pub fn random_zone<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random_range(0..ZONE_COUNT)
}
