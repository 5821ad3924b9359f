use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use uuid::Uuid;

use crate::space::{BlockPos, Direction};

new_key_type! {
    /// Identifies a cell in a graph manager's cell arena.
    pub struct CellId;

    /// Identifies a component inside a [`Netlist`](crate::electrical::Netlist).
    pub struct ComponentId;
}

/// Identifies a cell graph. This is the identity a host persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// A fresh random id.
    pub fn new_v4() -> Self {
        GraphId(Uuid::new_v4())
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies a cell type (provider) in the [`CellRegistry`](crate::cell::CellRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellTypeId(pub u32);

/// Identifies a world (level). Each world owns an independent graph manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub u32);

/// Identifies a cell by its block position and the face it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub block: BlockPos,
    pub face: Direction,
}

impl CellPos {
    pub const fn new(block: BlockPos, face: Direction) -> Self {
        Self { block, face }
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}) {:?}",
            self.block.x, self.block.y, self.block.z, self.face
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn graph_ids_are_unique() {
        let a = GraphId::new_v4();
        let b = GraphId::new_v4();
        assert_ne!(a, b);
    }

    #[test]
    fn cell_pos_distinguishes_faces() {
        let block = BlockPos::new(1, 2, 3);
        let up = CellPos::new(block, Direction::Up);
        let north = CellPos::new(block, Direction::North);
        assert_ne!(up, north);

        let mut map = HashMap::new();
        map.insert(up, "up");
        map.insert(north, "north");
        assert_eq!(map[&up], "up");
        assert_eq!(up.to_string(), "(1, 2, 3) Up");
    }
}
