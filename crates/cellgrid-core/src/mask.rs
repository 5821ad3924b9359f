//! Direction masks: up to six directions packed into one byte.
//!
//! Every transformation that runs on the connection hot path (rotation,
//! opposite, listing) is answered from a table indexed by the mask value.
//! The tables cover all 64 masks and are generated at compile time, so they
//! are immutable statics shared freely between threads.
//!
//! Rotations act on horizontal directions only; Up and Down pass through.

use std::fmt;
use std::ops::{Add, BitOr, Sub};

use crate::space::{Direction, RelativeRotationDirection};

// ---------------------------------------------------------------------------
// Bit assignment
// ---------------------------------------------------------------------------

const fn bit(direction: Direction) -> u8 {
    match direction {
        Direction::North => 1 << 0,
        Direction::South => 1 << 1,
        Direction::West => 1 << 2,
        Direction::East => 1 << 3,
        Direction::Down => 1 << 4,
        Direction::Up => 1 << 5,
    }
}

const ALL_BITS: u8 = 0b11_1111;

/// Number of distinct masks.
pub const MASK_COUNT: usize = 64;

// ---------------------------------------------------------------------------
// DirectionMask
// ---------------------------------------------------------------------------

/// A set of [`Direction`]s stored as a 6-bit integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DirectionMask(u8);

impl DirectionMask {
    pub const EMPTY: DirectionMask = DirectionMask(0);
    pub const FULL: DirectionMask = DirectionMask(ALL_BITS);

    pub const DOWN: DirectionMask = DirectionMask::of(Direction::Down);
    pub const UP: DirectionMask = DirectionMask::of(Direction::Up);
    pub const NORTH: DirectionMask = DirectionMask::of(Direction::North);
    pub const SOUTH: DirectionMask = DirectionMask::of(Direction::South);
    pub const WEST: DirectionMask = DirectionMask::of(Direction::West);
    pub const EAST: DirectionMask = DirectionMask::of(Direction::East);

    pub const FRONT: DirectionMask = DirectionMask::of_relative(RelativeRotationDirection::Front);
    pub const BACK: DirectionMask = DirectionMask::of_relative(RelativeRotationDirection::Back);
    pub const LEFT: DirectionMask = DirectionMask::of_relative(RelativeRotationDirection::Left);
    pub const RIGHT: DirectionMask = DirectionMask::of_relative(RelativeRotationDirection::Right);

    pub const HORIZONTALS: DirectionMask = Self::NORTH
        .plus(Self::SOUTH)
        .plus(Self::WEST)
        .plus(Self::EAST);
    pub const VERTICALS: DirectionMask = Self::UP.plus(Self::DOWN);

    // -- Construction --

    /// The mask containing only `direction`.
    pub const fn of(direction: Direction) -> DirectionMask {
        DirectionMask(bit(direction))
    }

    /// The mask containing the absolute alias of `direction`.
    pub const fn of_relative(direction: RelativeRotationDirection) -> DirectionMask {
        Self::of(direction.direction_alias())
    }

    /// The mask containing every direction in `directions`.
    pub fn of_all(directions: &[Direction]) -> DirectionMask {
        directions.iter().copied().collect()
    }

    /// The mask containing the absolute aliases of `directions`.
    pub fn of_relatives(directions: &[RelativeRotationDirection]) -> DirectionMask {
        directions
            .iter()
            .map(|d| d.direction_alias())
            .collect()
    }

    /// Wrap raw bits. Returns `None` if bits outside the six directions are set.
    pub const fn from_bits(bits: u8) -> Option<DirectionMask> {
        if bits & !ALL_BITS == 0 {
            Some(DirectionMask(bits))
        } else {
            None
        }
    }

    /// Raw bits; also the index of this mask in every cached table.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every mask, in index order.
    pub fn all() -> impl Iterator<Item = DirectionMask> {
        (0..MASK_COUNT as u8).map(DirectionMask)
    }

    /// The four directions perpendicular to `direction`.
    pub fn perpendicular(direction: Direction) -> DirectionMask {
        PERPENDICULARS[direction.index()]
    }

    // -- Components --

    pub const fn horizontal_component(self) -> DirectionMask {
        DirectionMask(self.0 & Self::HORIZONTALS.0)
    }

    pub const fn vertical_component(self) -> DirectionMask {
        DirectionMask(self.0 & Self::VERTICALS.0)
    }

    // -- Checks --

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn has_flag(self, direction: Direction) -> bool {
        self.0 & bit(direction) != 0
    }

    pub const fn has_relative(self, direction: RelativeRotationDirection) -> bool {
        self.has_flag(direction.direction_alias())
    }

    /// True if every direction of `flags` is in this mask. Not an equality test.
    pub const fn has_flags(self, flags: DirectionMask) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// True if at least one direction of `flags` is in this mask.
    /// Always false for an empty `flags`.
    pub const fn has_any_flags(self, flags: DirectionMask) -> bool {
        self.0 & flags.0 != 0
    }

    pub const fn has_verticals(self) -> bool {
        self.has_any_flags(Self::VERTICALS)
    }

    pub const fn has_horizontals(self) -> bool {
        self.has_any_flags(Self::HORIZONTALS)
    }

    /// Only vertical directions. False for the empty mask.
    pub const fn is_vertical(self) -> bool {
        self.has_verticals() && !self.has_horizontals()
    }

    /// Only horizontal directions. False for the empty mask.
    pub const fn is_horizontal(self) -> bool {
        self.has_horizontals() && !self.has_verticals()
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    // -- Listing --

    /// Directions in this mask, in index order.
    pub fn directions(self) -> &'static [Direction] {
        DIRECTION_LISTS[self.index()].as_slice()
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        self.directions().iter().copied()
    }

    // -- Transformations --

    /// Map every direction through `transform`.
    pub fn transformed(self, transform: impl Fn(Direction) -> Direction) -> DirectionMask {
        self.iter().map(transform).collect()
    }

    /// Map directions accepted by `filter` through `transform`; the others are
    /// kept as they are.
    pub fn transformed_filtered(
        self,
        transform: impl Fn(Direction) -> Direction,
        filter: impl Fn(Direction) -> bool,
    ) -> DirectionMask {
        self.iter()
            .map(|d| if filter(d) { transform(d) } else { d })
            .collect()
    }

    pub fn clockwise(self) -> DirectionMask {
        CLOCKWISE[self.index()]
    }

    pub fn counter_clockwise(self) -> DirectionMask {
        COUNTER_CLOCKWISE[self.index()]
    }

    /// Every direction inverted, verticals included.
    pub fn opposite(self) -> DirectionMask {
        OPPOSITE[self.index()]
    }

    /// Half turn of the horizontal directions only. `opposite` would also
    /// flip Up and Down.
    fn half_turn(self) -> DirectionMask {
        self.horizontal_component()
            .opposite()
            .plus(self.vertical_component())
    }

    /// Rotate clockwise by `steps` quarter turns.
    pub fn clockwise_steps(self, steps: u32) -> DirectionMask {
        match steps % 4 {
            0 => self,
            1 => self.clockwise(),
            2 => self.half_turn(),
            _ => self.counter_clockwise(),
        }
    }

    /// Rotate counter-clockwise by `steps` quarter turns.
    pub fn counter_clockwise_steps(self, steps: u32) -> DirectionMask {
        match steps % 4 {
            0 => self,
            1 => self.counter_clockwise(),
            2 => self.half_turn(),
            _ => self.clockwise(),
        }
    }

    /// The smallest number of clockwise quarter turns that maps this mask onto
    /// `target`, or `None` if no rotation does.
    pub fn match_clockwise(self, target: DirectionMask) -> Option<u8> {
        (0..4u8).find(|&steps| self.clockwise_steps(steps as u32) == target)
    }

    /// Counter-clockwise counterpart of [`match_clockwise`](Self::match_clockwise).
    pub fn match_counter_clockwise(self, target: DirectionMask) -> Option<u8> {
        (0..4u8).find(|&steps| self.counter_clockwise_steps(steps as u32) == target)
    }

    // -- Algebra --

    pub const fn plus(self, other: DirectionMask) -> DirectionMask {
        DirectionMask(self.0 | other.0)
    }

    pub const fn minus(self, other: DirectionMask) -> DirectionMask {
        DirectionMask(self.0 & !other.0)
    }
}

impl FromIterator<Direction> for DirectionMask {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        DirectionMask(iter.into_iter().fold(0, |acc, d| acc | bit(d)))
    }
}

impl From<Direction> for DirectionMask {
    fn from(direction: Direction) -> Self {
        DirectionMask::of(direction)
    }
}

impl Add for DirectionMask {
    type Output = DirectionMask;

    fn add(self, rhs: DirectionMask) -> DirectionMask {
        self.plus(rhs)
    }
}

impl Add<Direction> for DirectionMask {
    type Output = DirectionMask;

    fn add(self, rhs: Direction) -> DirectionMask {
        self.plus(DirectionMask::of(rhs))
    }
}

impl BitOr for DirectionMask {
    type Output = DirectionMask;

    fn bitor(self, rhs: DirectionMask) -> DirectionMask {
        self.plus(rhs)
    }
}

impl Sub for DirectionMask {
    type Output = DirectionMask;

    fn sub(self, rhs: DirectionMask) -> DirectionMask {
        self.minus(rhs)
    }
}

impl Sub<Direction> for DirectionMask {
    type Output = DirectionMask;

    fn sub(self, rhs: Direction) -> DirectionMask {
        self.minus(DirectionMask::of(rhs))
    }
}

impl fmt::Display for DirectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for direction in self.iter() {
            write!(f, " {direction:?}")?;
        }
        f.write_str(" }")
    }
}

impl fmt::Debug for DirectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectionMask({:#08b} {self})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cached tables
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct DirectionList {
    items: [Direction; 6],
    len: usize,
}

impl DirectionList {
    fn as_slice(&self) -> &[Direction] {
        &self.items[..self.len]
    }
}

#[derive(Clone, Copy)]
enum Transform {
    Clockwise,
    CounterClockwise,
    Opposite,
}

const fn apply(transform: Transform, direction: Direction) -> Direction {
    match transform {
        Transform::Clockwise => direction.clockwise(),
        Transform::CounterClockwise => direction.counter_clockwise(),
        Transform::Opposite => direction.opposite(),
    }
}

const fn transform_table(transform: Transform) -> [DirectionMask; MASK_COUNT] {
    let mut table = [DirectionMask::EMPTY; MASK_COUNT];
    let mut mask = 0;
    while mask < MASK_COUNT {
        let mut result = 0u8;
        let mut i = 0;
        while i < 6 {
            let direction = Direction::ALL[i];
            if mask as u8 & bit(direction) != 0 {
                result |= bit(apply(transform, direction));
            }
            i += 1;
        }
        table[mask] = DirectionMask(result);
        mask += 1;
    }
    table
}

const fn direction_lists() -> [DirectionList; MASK_COUNT] {
    let empty = DirectionList {
        items: [Direction::Down; 6],
        len: 0,
    };
    let mut lists = [empty; MASK_COUNT];
    let mut mask = 0;
    while mask < MASK_COUNT {
        let mut i = 0;
        while i < 6 {
            let direction = Direction::ALL[i];
            if mask as u8 & bit(direction) != 0 {
                let len = lists[mask].len;
                lists[mask].items[len] = direction;
                lists[mask].len = len + 1;
            }
            i += 1;
        }
        mask += 1;
    }
    lists
}

const fn perpendicular_table() -> [DirectionMask; 6] {
    let mut table = [DirectionMask::EMPTY; 6];
    let mut i = 0;
    while i < 6 {
        let direction = Direction::ALL[i];
        table[i] = DirectionMask(
            ALL_BITS & !bit(direction) & !bit(direction.opposite()),
        );
        i += 1;
    }
    table
}

static CLOCKWISE: [DirectionMask; MASK_COUNT] = transform_table(Transform::Clockwise);
static COUNTER_CLOCKWISE: [DirectionMask; MASK_COUNT] =
    transform_table(Transform::CounterClockwise);
static OPPOSITE: [DirectionMask; MASK_COUNT] = transform_table(Transform::Opposite);
static DIRECTION_LISTS: [DirectionList; MASK_COUNT] = direction_lists();
static PERPENDICULARS: [DirectionMask; 6] = perpendicular_table();

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::*;

    #[test]
    fn bits_are_a_bijection() {
        let mut seen = 0u8;
        for d in Direction::ALL {
            let b = DirectionMask::of(d).bits();
            assert_eq!(b.count_ones(), 1);
            assert_eq!(seen & b, 0, "bit reused by {d:?}");
            seen |= b;
        }
        assert_eq!(DirectionMask(seen), DirectionMask::FULL);
        assert_eq!(DirectionMask::FULL.count(), 6);
    }

    #[test]
    fn from_bits_rejects_out_of_range() {
        assert_eq!(DirectionMask::from_bits(63), Some(DirectionMask::FULL));
        assert_eq!(DirectionMask::from_bits(64), None);
    }

    #[test]
    fn components_split_north_south_up() {
        let mask = DirectionMask::of_all(&[North, South, Up]);
        assert_eq!(mask.horizontal_component(), DirectionMask::of_all(&[North, South]));
        assert_eq!(mask.vertical_component(), DirectionMask::UP);
    }

    #[test]
    fn has_flags_is_subset_not_equality() {
        let mask = DirectionMask::of_all(&[North, East, Up]);
        assert!(mask.has_flags(DirectionMask::NORTH + DirectionMask::UP));
        assert!(!mask.has_flags(DirectionMask::NORTH + DirectionMask::SOUTH));
        assert!(mask.has_any_flags(DirectionMask::NORTH + DirectionMask::SOUTH));
        assert!(!mask.has_any_flags(DirectionMask::EMPTY));
        assert!(mask.has_flags(DirectionMask::EMPTY));
    }

    #[test]
    fn vertical_and_horizontal_classification() {
        assert!(DirectionMask::VERTICALS.is_vertical());
        assert!(DirectionMask::HORIZONTALS.is_horizontal());
        assert!(!DirectionMask::EMPTY.is_vertical());
        assert!(!DirectionMask::EMPTY.is_horizontal());
        assert!(!DirectionMask::FULL.is_horizontal());
    }

    #[test]
    fn relative_aliases() {
        assert_eq!(DirectionMask::FRONT, DirectionMask::NORTH);
        assert_eq!(DirectionMask::RIGHT, DirectionMask::EAST);
        assert!(DirectionMask::WEST.has_relative(RelativeRotationDirection::Left));
        assert_eq!(
            DirectionMask::of_relatives(&[
                RelativeRotationDirection::Back,
                RelativeRotationDirection::Down,
            ]),
            DirectionMask::SOUTH + DirectionMask::DOWN
        );
    }

    #[test]
    fn listing_is_in_index_order() {
        let mask = DirectionMask::of_all(&[East, Up, North]);
        assert_eq!(mask.directions(), &[Up, North, East]);
        assert!(DirectionMask::EMPTY.directions().is_empty());
        assert_eq!(DirectionMask::FULL.directions(), &Direction::ALL);
    }

    #[test]
    fn clockwise_rotates_horizontals_only() {
        let mask = DirectionMask::of_all(&[North, Up]);
        assert_eq!(mask.clockwise(), DirectionMask::of_all(&[East, Up]));
        assert_eq!(mask.counter_clockwise(), DirectionMask::of_all(&[West, Up]));
    }

    #[test]
    fn two_steps_keeps_verticals_but_opposite_does_not() {
        let mask = DirectionMask::of_all(&[North, Up]);
        assert_eq!(mask.clockwise_steps(2), DirectionMask::of_all(&[South, Up]));
        assert_eq!(mask.counter_clockwise_steps(2), DirectionMask::of_all(&[South, Up]));
        assert_eq!(mask.opposite(), DirectionMask::of_all(&[South, Down]));
    }

    #[test]
    fn steps_reduce_modulo_four() {
        let mask = DirectionMask::of_all(&[North, West, Down]);
        assert_eq!(mask.clockwise_steps(5), mask.clockwise());
        assert_eq!(mask.clockwise_steps(3), mask.counter_clockwise());
        assert_eq!(mask.counter_clockwise_steps(7), mask.clockwise());
    }

    #[test]
    fn match_finds_quarter_turns() {
        let mask = DirectionMask::of_all(&[North, East]);
        let target = DirectionMask::of_all(&[South, West]);
        assert_eq!(mask.match_clockwise(target), Some(2));
        assert_eq!(mask.match_clockwise(DirectionMask::of_all(&[East, South])), Some(1));
        assert_eq!(
            mask.match_counter_clockwise(DirectionMask::of_all(&[East, South])),
            Some(3)
        );
        assert_eq!(mask.match_clockwise(DirectionMask::of_all(&[North, South])), None);
        assert_eq!(mask.match_clockwise(mask + DirectionMask::UP), None);
    }

    #[test]
    fn transformed_filtered_passes_rejected_through() {
        let mask = DirectionMask::of_all(&[North, Up]);
        let flipped = mask.transformed_filtered(Direction::opposite, Direction::is_vertical);
        assert_eq!(flipped, DirectionMask::of_all(&[North, Down]));
        assert_eq!(mask.transformed(Direction::opposite), mask.opposite());
        assert_eq!(DirectionMask::EMPTY.transformed(Direction::opposite), DirectionMask::EMPTY);
    }

    #[test]
    fn perpendicular_excludes_axis() {
        let p = DirectionMask::perpendicular(Up);
        assert_eq!(p, DirectionMask::HORIZONTALS);
        let p = DirectionMask::perpendicular(North);
        assert_eq!(p, DirectionMask::of_all(&[East, West, Up, Down]));
    }

    #[test]
    fn algebra_is_pure() {
        let a = DirectionMask::NORTH + South;
        let b = a - North;
        assert_eq!(a, DirectionMask::of_all(&[North, South]));
        assert_eq!(b, DirectionMask::SOUTH);
        assert_eq!(a | DirectionMask::UP, a + Up);
        assert_eq!(a.minus(DirectionMask::FULL), DirectionMask::EMPTY);
    }

    #[test]
    fn display_lists_directions() {
        let mask = DirectionMask::of_all(&[North, Up]);
        assert_eq!(mask.to_string(), "{ Up North }");
        assert_eq!(DirectionMask::EMPTY.to_string(), "{ }");
    }
}
