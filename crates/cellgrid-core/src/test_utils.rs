//! Cell providers and placement helpers for tests and benches.
//!
//! Compiled for unit tests and for dependents enabling the `test-utils`
//! feature.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::cell::{BasicCellProvider, CellProvider};
use crate::container::ContainerMap;
use crate::electrical::{
    Circuit, Component, ElectricalComponentInfo, ElectricalConnections, ElectricalObject,
    GroundObject, ResistorObject,
};
use crate::graph::GraphError;
use crate::id::{CellId, CellTypeId, ComponentId, GraphId};
use crate::manager::CellGraphManager;
use crate::mask::DirectionMask;
use crate::object::{SimulationObject, SimulationObjectSet};
use crate::space::{BlockPos, Direction};
use crate::thermal::{ThermalBody, ThermalMassObject};

// ===========================================================================
// Providers
// ===========================================================================

/// A resistor cell connectable on its Left and Right sides.
pub fn resistor_provider(type_id: u32, name: &str) -> BasicCellProvider {
    BasicCellProvider::new(
        CellTypeId(type_id),
        name,
        DirectionMask::LEFT + DirectionMask::RIGHT,
        || {
            Ok(SimulationObjectSet::single(SimulationObject::electrical(
                ResistorObject::default(),
            )))
        },
    )
}

/// The resistor provider most tests place in lines.
pub fn line_provider() -> Arc<dyn CellProvider> {
    Arc::new(resistor_provider(1, "line_resistor"))
}

/// A single-node cell connectable on all four horizontal sides.
pub fn junction_provider(type_id: u32) -> Arc<dyn CellProvider> {
    Arc::new(BasicCellProvider::new(
        CellTypeId(type_id),
        format!("junction_{type_id}"),
        DirectionMask::HORIZONTALS,
        || {
            Ok(SimulationObjectSet::single(SimulationObject::electrical(
                GroundObject::new(),
            )))
        },
    ))
}

/// A junction that also carries a thermal mass at `temperature`.
pub fn hot_junction_provider(type_id: u32, temperature: f64) -> Arc<dyn CellProvider> {
    Arc::new(BasicCellProvider::new(
        CellTypeId(type_id),
        format!("hot_junction_{type_id}"),
        DirectionMask::HORIZONTALS,
        move || {
            SimulationObjectSet::new(vec![
                SimulationObject::electrical(GroundObject::new()),
                SimulationObject::thermal(ThermalMassObject::new(ThermalBody {
                    mass: 10.0,
                    temperature,
                    conductance: 2.0,
                })?),
            ])
        },
    ))
}

/// A two-pin resistor that accepts neighbours on all four horizontal sides,
/// so placement has to enforce its capacity.
pub fn four_way_resistor_provider(type_id: u32) -> Arc<dyn CellProvider> {
    Arc::new(BasicCellProvider::new(
        CellTypeId(type_id),
        format!("four_way_resistor_{type_id}"),
        DirectionMask::HORIZONTALS,
        || {
            Ok(SimulationObjectSet::single(SimulationObject::electrical(
                ResistorObject::default(),
            )))
        },
    ))
}

/// Registers a component but never offers it to neighbours, so any graph
/// where it has a connection fails to build.
#[derive(Debug)]
pub struct UnwiredObject {
    component: Option<ComponentId>,
    connections: ElectricalConnections,
}

impl UnwiredObject {
    pub fn new() -> Self {
        Self {
            component: None,
            connections: ElectricalConnections::new(4),
        }
    }
}

impl Default for UnwiredObject {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectricalObject for UnwiredObject {
    fn connections(&self) -> &ElectricalConnections {
        &self.connections
    }

    fn connections_mut(&mut self) -> &mut ElectricalConnections {
        &mut self.connections
    }

    fn offer_component(&self, _neighbor: CellId) -> Option<ElectricalComponentInfo> {
        None
    }

    fn recreate_components(&mut self) {
        self.component = None;
    }

    fn register_components(&mut self, circuit: &mut dyn Circuit) {
        self.component = Some(circuit.add_component(Component::Ground));
    }
}

/// A junction-shaped cell carrying an [`UnwiredObject`].
pub fn unwired_provider(type_id: u32) -> Arc<dyn CellProvider> {
    Arc::new(BasicCellProvider::new(
        CellTypeId(type_id),
        format!("unwired_{type_id}"),
        DirectionMask::HORIZONTALS,
        || {
            Ok(SimulationObjectSet::single(SimulationObject::electrical(
                UnwiredObject::new(),
            )))
        },
    ))
}

// ===========================================================================
// Placement helpers
// ===========================================================================

/// Place `len` blocks eastwards from `start`, all facing north.
pub fn place_line(
    host: &mut ContainerMap,
    manager: &mut CellGraphManager,
    provider: &Arc<dyn CellProvider>,
    start: BlockPos,
    len: i32,
) -> Result<Vec<CellId>, GraphError> {
    (0..len)
        .map(|i| {
            let pos = BlockPos::new(start.x + i, start.y, start.z);
            host.place_block(manager, pos, Direction::North, provider.clone())
                .map(|(id, _)| id)
        })
        .collect()
}

/// The graph of `cell`. Panics if the cell is missing or graph-less.
pub fn graph_of(manager: &CellGraphManager, cell: CellId) -> GraphId {
    manager
        .cell(cell)
        .expect("cell exists")
        .graph()
        .expect("cell is in a graph")
}

// ===========================================================================
// Invariant checks
// ===========================================================================

/// Verify the structural invariants of every cell and graph.
///
/// - edges are symmetric and never cross graphs;
/// - every cell's graph exists and lists it;
/// - every graph is non-empty and exactly one connected component.
pub fn check_invariants(manager: &CellGraphManager) -> Result<(), String> {
    for (id, cell) in manager.cells() {
        let graph_id = cell.graph().ok_or(format!("{id:?} has no graph"))?;
        let graph = manager
            .graph(graph_id)
            .map_err(|e| format!("{id:?}: {e}"))?;
        if !graph.contains(id) {
            return Err(format!("{graph_id} does not list {id:?}"));
        }
        for neighbor in cell.neighbors() {
            let other = manager
                .cell(neighbor)
                .map_err(|e| format!("{id:?} -> {e}"))?;
            if !other.is_connected_to(id) {
                return Err(format!("edge {id:?} -> {neighbor:?} is one-sided"));
            }
            if other.graph() != Some(graph_id) {
                return Err(format!("edge {id:?} -> {neighbor:?} crosses graphs"));
            }
        }
    }

    for graph in manager.graphs() {
        let Some(&start) = graph.cells().first() else {
            return Err(format!("{} is empty", graph.id()));
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let cell = manager.cell(current).map_err(|e| e.to_string())?;
            for neighbor in cell.neighbors() {
                if seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        if seen.len() != graph.len() {
            return Err(format!(
                "{} is disconnected: reached {} of {}",
                graph.id(),
                seen.len(),
                graph.len()
            ));
        }
    }
    Ok(())
}
