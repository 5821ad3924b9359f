//! World-space primitives: axis directions, facing-relative directions,
//! placement rotations and block positions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from space operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceError {
    #[error("placement facing must be horizontal, got {0:?}")]
    VerticalFacing(Direction),
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the six axis-aligned directions.
///
/// Discriminants follow the host's 3D data value order, which is also the
/// enumeration order of every direction listing in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Down = 0,
    Up = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl Direction {
    /// All six directions, in index order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// The four horizontal directions, in index order.
    pub const HORIZONTALS: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(index: usize) -> Option<Direction> {
        if index < 6 { Some(Self::ALL[index]) } else { None }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// Rotate a quarter turn clockwise around the vertical axis (seen from above).
    /// Vertical directions map to themselves.
    pub const fn clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            vertical => vertical,
        }
    }

    /// Rotate a quarter turn counter-clockwise around the vertical axis.
    /// Vertical directions map to themselves.
    pub const fn counter_clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            vertical => vertical,
        }
    }

    pub const fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    pub const fn is_horizontal(self) -> bool {
        !self.is_vertical()
    }

    /// Unit offset `(dx, dy, dz)`. North is -z, East is +x, Up is +y.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// The direction whose unit offset is exactly `(dx, dy, dz)`.
    pub fn from_offset(dx: i32, dy: i32, dz: i32) -> Option<Direction> {
        Self::ALL.into_iter().find(|d| d.offset() == (dx, dy, dz))
    }

    /// The facing-relative direction this direction aliases when facing North.
    pub const fn relative_alias(self) -> RelativeRotationDirection {
        match self {
            Direction::Down => RelativeRotationDirection::Down,
            Direction::Up => RelativeRotationDirection::Up,
            Direction::North => RelativeRotationDirection::Front,
            Direction::South => RelativeRotationDirection::Back,
            Direction::West => RelativeRotationDirection::Left,
            Direction::East => RelativeRotationDirection::Right,
        }
    }

    /// Number of clockwise quarter turns from North. Verticals have none.
    const fn horizontal_steps(self) -> Option<u8> {
        match self {
            Direction::North => Some(0),
            Direction::East => Some(1),
            Direction::South => Some(2),
            Direction::West => Some(3),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RelativeRotationDirection
// ---------------------------------------------------------------------------

/// A direction expressed relative to a placed object's facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeRotationDirection {
    Front,
    Back,
    Left,
    Right,
    Up,
    Down,
}

impl RelativeRotationDirection {
    pub const ALL: [RelativeRotationDirection; 6] = [
        RelativeRotationDirection::Front,
        RelativeRotationDirection::Back,
        RelativeRotationDirection::Left,
        RelativeRotationDirection::Right,
        RelativeRotationDirection::Up,
        RelativeRotationDirection::Down,
    ];

    /// The absolute direction this relative direction aliases when facing North.
    pub const fn direction_alias(self) -> Direction {
        match self {
            RelativeRotationDirection::Front => Direction::North,
            RelativeRotationDirection::Back => Direction::South,
            RelativeRotationDirection::Left => Direction::West,
            RelativeRotationDirection::Right => Direction::East,
            RelativeRotationDirection::Up => Direction::Up,
            RelativeRotationDirection::Down => Direction::Down,
        }
    }

    pub const fn is_vertical(self) -> bool {
        matches!(
            self,
            RelativeRotationDirection::Up | RelativeRotationDirection::Down
        )
    }
}

// ---------------------------------------------------------------------------
// PlacementRotation
// ---------------------------------------------------------------------------

/// Maps between world-absolute and facing-relative directions for an object
/// placed with a horizontal facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementRotation {
    facing: Direction,
    steps: u8,
}

impl PlacementRotation {
    pub fn new(facing: Direction) -> Result<Self, SpaceError> {
        let steps = facing
            .horizontal_steps()
            .ok_or(SpaceError::VerticalFacing(facing))?;
        Ok(Self { facing, steps })
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    /// Absolute direction of `relative` for this facing. Up and Down never rotate.
    pub fn absolute_from_relative(&self, relative: RelativeRotationDirection) -> Direction {
        let mut direction = relative.direction_alias();
        for _ in 0..self.steps {
            direction = direction.clockwise();
        }
        direction
    }

    /// Facing-relative direction of `absolute`. Inverse of
    /// [`absolute_from_relative`](Self::absolute_from_relative).
    pub fn relative_from_absolute(&self, absolute: Direction) -> RelativeRotationDirection {
        let mut direction = absolute;
        for _ in 0..self.steps {
            direction = direction.counter_clockwise();
        }
        direction.relative_alias()
    }
}

impl Default for PlacementRotation {
    fn default() -> Self {
        Self {
            facing: Direction::North,
            steps: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// Integer block position in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent position in `direction`.
    pub fn offset(&self, direction: Direction) -> BlockPos {
        let (dx, dy, dz) = direction.offset();
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The direction from `self` to an adjacent `other`, if they touch face to face.
    pub fn direction_to(&self, other: &BlockPos) -> Option<Direction> {
        Direction::from_offset(other.x - self.x, other.y - self.y, other.z - self.z)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
