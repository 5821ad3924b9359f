//! Cell graphs: maximal connected sets of cells sharing one circuit.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cell::{CellArena, RegistryError};
use crate::electrical::{ElectricalError, Netlist};
use crate::id::{CellId, CellPos, GraphId};
use crate::object::{ObjectSetError, SimulationObjectMut, SimulationObjectType};
use crate::profiling::TickRateSampler;
use crate::space::{BlockPos, SpaceError};
use crate::thermal::ThermalNetwork;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("graph not found: {0}")]
    GraphNotFound(GraphId),
    #[error("cell not found: {0:?}")]
    CellNotFound(CellId),
    #[error("no cell at {pos} in graph {graph}")]
    CellNotInGraph { graph: GraphId, pos: CellPos },
    #[error("cell {0:?} is already part of a graph")]
    AlreadyInGraph(CellId),
    #[error("no container at {0:?}")]
    ContainerNotFound(BlockPos),
    #[error("container at {0:?} already exists")]
    ContainerOccupied(BlockPos),
    #[error(transparent)]
    Objects(#[from] ObjectSetError),
    #[error(transparent)]
    Electrical(#[from] ElectricalError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Space(#[from] SpaceError),
}

// ---------------------------------------------------------------------------
// CellGraph
// ---------------------------------------------------------------------------

/// A connected component of cells and the circuit assembled from them.
///
/// Membership is tracked here; the cells themselves live in the manager's
/// [`CellArena`]. The circuit is `None` until the first successful build and
/// after a failed one.
#[derive(Debug)]
pub struct CellGraph {
    id: GraphId,
    cells: Vec<CellId>,
    members: HashSet<CellId>,
    positions: HashMap<CellPos, CellId>,
    circuit: Option<Netlist>,
    thermal: ThermalNetwork,
    sampler: TickRateSampler,
    spent_time: Duration,
}

impl CellGraph {
    pub fn new(id: GraphId) -> Self {
        Self {
            id,
            cells: Vec::new(),
            members: HashSet::new(),
            positions: HashMap::new(),
            circuit: None,
            thermal: ThermalNetwork::new(),
            sampler: TickRateSampler::new(),
            spent_time: Duration::ZERO,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Member cells, in the order they joined.
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.members.contains(&cell)
    }

    pub fn cell_at(&self, pos: CellPos) -> Option<CellId> {
        self.positions.get(&pos).copied()
    }

    pub(crate) fn add_cell(&mut self, cell: CellId, pos: CellPos) {
        if self.members.insert(cell) {
            self.cells.push(cell);
            self.positions.insert(pos, cell);
        }
    }

    pub(crate) fn remove_cell(&mut self, cell: CellId, pos: CellPos) {
        if self.members.remove(&cell) {
            self.cells.retain(|c| *c != cell);
        }
        self.positions.remove(&pos);
    }

    /// The assembled circuit, handed to the external solver.
    pub fn circuit(&self) -> Option<&Netlist> {
        self.circuit.as_ref()
    }

    pub fn thermal(&self) -> &ThermalNetwork {
        &self.thermal
    }

    /// Wall time spent in the most recent [`step`](Self::step).
    pub fn spent_time(&self) -> Duration {
        self.spent_time
    }

    /// Steps per second since the previous sample.
    pub fn sample_tick_rate(&mut self) -> f64 {
        self.sampler.sample()
    }

    /// Rebuild the circuit and thermal network from the current membership.
    ///
    /// Every object's connections are re-gathered first; then all electrical
    /// objects register fresh components; only after that does any object
    /// wire its pins. On error the graph is left without a circuit.
    pub fn build(&mut self, cells: &mut CellArena) -> Result<(), GraphError> {
        self.circuit = None;
        self.thermal = ThermalNetwork::new();

        match self.assemble(cells) {
            Ok((circuit, thermal)) => {
                self.circuit = Some(circuit);
                self.thermal = thermal;
                Ok(())
            }
            Err(err) => {
                warn!(graph = %self.id, error = %err, "circuit rebuild failed");
                Err(err)
            }
        }
    }

    fn assemble(&self, cells: &mut CellArena) -> Result<(Netlist, ThermalNetwork), GraphError> {
        for &id in &self.cells {
            let cell = cells.get(id).ok_or(GraphError::CellNotFound(id))?;
            let with = |object_type| -> Vec<CellId> {
                cell.neighbors()
                    .filter(|n| {
                        cells
                            .get(*n)
                            .is_some_and(|c| c.objects().has_object(object_type))
                    })
                    .collect()
            };
            let electrical = with(SimulationObjectType::Electrical);
            let thermal = with(SimulationObjectType::Thermal);

            let cell = cells.get_mut(id).ok_or(GraphError::CellNotFound(id))?;
            cell.objects_mut().process_mut(|object| match object {
                SimulationObjectMut::Electrical(obj) => {
                    let connections = obj.connections_mut();
                    connections.clear();
                    electrical.iter().try_for_each(|n| connections.add(*n))
                }
                SimulationObjectMut::Thermal(obj) => {
                    let neighbors = obj.neighbors_mut();
                    neighbors.clear();
                    neighbors.extend_from_slice(&thermal);
                    Ok(())
                }
            })?;
        }

        let mut circuit = Netlist::new();
        for &id in &self.cells {
            let cell = cells.get_mut(id).ok_or(GraphError::CellNotFound(id))?;
            if let Ok(obj) = cell.objects_mut().electrical_mut() {
                obj.recreate_components();
                obj.register_components(&mut circuit);
            }
        }

        for &id in &self.cells {
            let cell = cells.get(id).ok_or(GraphError::CellNotFound(id))?;
            if let Ok(obj) = cell.objects().electrical() {
                obj.build(id, &mut circuit, &*cells)?;
            }
        }

        let mut thermal = ThermalNetwork::new();
        for &id in &self.cells {
            let cell = cells.get(id).ok_or(GraphError::CellNotFound(id))?;
            if let Ok(obj) = cell.objects().thermal() {
                for &neighbor in obj.neighbors() {
                    thermal.add_edge(id, neighbor);
                }
            }
        }

        Ok((circuit, thermal))
    }

    /// Advance the graph's own simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64, cells: &mut CellArena) {
        let start = Instant::now();
        self.thermal.step(dt, cells);
        self.sampler.record_update();
        self.spent_time = start.elapsed();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
