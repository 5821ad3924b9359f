//! Property-based tests for graph connectivity.
//!
//! Random placement/removal sequences on a small grid must always leave
//! every graph equal to exactly one connected component of the cell edges.

use std::collections::HashMap;
use std::sync::Arc;

use cellgrid_core::cell::CellProvider;
use cellgrid_core::container::ContainerMap;
use cellgrid_core::graph::GraphError;
use cellgrid_core::id::CellId;
use cellgrid_core::manager::CellGraphManager;
use cellgrid_core::space::{BlockPos, Direction};
use cellgrid_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum GridOp {
    Place {
        x: i32,
        z: i32,
        junction: bool,
        facing: Direction,
    },
    Remove {
        x: i32,
        z: i32,
    },
}

fn arb_ops(size: i32, max_ops: usize) -> impl Strategy<Value = Vec<GridOp>> {
    let facing = prop::sample::select(Direction::HORIZONTALS.to_vec());
    proptest::collection::vec(
        prop_oneof![
            3 => (0..size, 0..size, any::<bool>(), facing).prop_map(|(x, z, junction, facing)| {
                GridOp::Place { x, z, junction, facing }
            }),
            1 => (0..size, 0..size).prop_map(|(x, z)| GridOp::Remove { x, z }),
        ],
        1..=max_ops,
    )
}

struct Grid {
    host: ContainerMap,
    manager: CellGraphManager,
    cells: HashMap<BlockPos, CellId>,
    line: Arc<dyn CellProvider>,
    junction: Arc<dyn CellProvider>,
}

impl Grid {
    fn new() -> Self {
        Self {
            host: ContainerMap::new(),
            manager: CellGraphManager::new(),
            cells: HashMap::new(),
            line: line_provider(),
            junction: junction_provider(2),
        }
    }

    fn apply(&mut self, op: &GridOp) -> Result<(), GraphError> {
        match *op {
            GridOp::Place { x, z, junction, facing } => {
                let pos = BlockPos::new(x, 0, z);
                if self.cells.contains_key(&pos) {
                    return Ok(());
                }
                let provider = if junction { &self.junction } else { &self.line };
                let (id, _) =
                    self.host
                        .place_block(&mut self.manager, pos, facing, provider.clone())?;
                self.cells.insert(pos, id);
            }
            GridOp::Remove { x, z } => {
                let pos = BlockPos::new(x, 0, z);
                if self.cells.remove(&pos).is_some() {
                    self.host.destroy_block(&mut self.manager, pos)?;
                }
            }
        }
        Ok(())
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Every graph is one connected component and edges never cross graphs.
    #[test]
    fn graphs_are_connected_components(ops in arb_ops(5, 60)) {
        let mut grid = Grid::new();
        for op in &ops {
            grid.apply(op).unwrap();
            if let Err(msg) = check_invariants(&grid.manager) {
                prop_assert!(false, "after {:?}: {}", op, msg);
            }
        }
        prop_assert_eq!(grid.manager.cell_count(), grid.cells.len());
        prop_assert_eq!(grid.host.len(), grid.cells.len());
    }

    /// Edges only join face-adjacent cells, and every graph has a circuit.
    #[test]
    fn edges_join_adjacent_cells(ops in arb_ops(4, 40)) {
        let mut grid = Grid::new();
        for op in &ops {
            grid.apply(op).unwrap();
        }
        for (_, cell) in grid.manager.cells() {
            for neighbor in cell.neighbors() {
                let other = grid.manager.cell(neighbor).unwrap();
                let direction = cell.pos().block.direction_to(&other.pos().block);
                prop_assert!(direction.is_some_and(Direction::is_horizontal));
            }
        }
        for graph in grid.manager.graphs() {
            let circuit = graph.circuit();
            prop_assert!(circuit.is_some());
            prop_assert_eq!(circuit.unwrap().component_count(), graph.len());
        }
    }

    /// Removing everything leaves no graphs behind.
    #[test]
    fn clearing_the_grid_discards_all_graphs(ops in arb_ops(4, 30)) {
        let mut grid = Grid::new();
        for op in &ops {
            grid.apply(op).unwrap();
        }
        let placed: Vec<BlockPos> = grid.cells.keys().copied().collect();
        for pos in placed {
            grid.apply(&GridOp::Remove { x: pos.x, z: pos.z }).unwrap();
        }
        prop_assert_eq!(grid.manager.graph_count(), 0);
        prop_assert_eq!(grid.manager.cell_count(), 0);
    }
}
