//! Cell containers: the host-side objects that own cells in the world.
//!
//! A container knows where its cells sit and which neighbouring containers
//! may hold connection candidates. Discovery runs through two calls on the
//! neighbour: [`CellContainer::query`] finds the remote cell facing us, and
//! [`CellContainer::probe_connection_candidate`] lets it accept or refuse.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cell::CellProvider;
use crate::connection::CellConnectionManager;
use crate::graph::GraphError;
use crate::id::{CellId, CellPos, GraphId};
use crate::manager::{CellGraphManager, RemovedCell, TopologyChange};
use crate::space::{BlockPos, Direction, PlacementRotation, RelativeRotationDirection};

/// Face occupied by the cell of a [`BlockCellContainer`].
pub const BLOCK_CELL_FACE: Direction = Direction::Up;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// A cell inside a container, and the face it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellInfo {
    pub cell: CellId,
    pub face: Direction,
}

/// Asks a container for the cell on `surface` reachable from `connection_face`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellQuery {
    /// The side of the queried container the request arrives from.
    pub connection_face: Direction,
    pub surface: Direction,
}

/// An accepted connection candidate found during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellNeighborInfo {
    pub neighbor: CellInfo,
    pub neighbor_container: BlockPos,
    /// Direction of the neighbour, relative to the querying container.
    pub source_direction: RelativeRotationDirection,
    /// Direction of the querying cell, relative to the neighbour's container.
    pub neighbor_direction: RelativeRotationDirection,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A world object owning one or more cells.
pub trait CellContainer: fmt::Debug {
    fn cells(&self) -> Vec<CellInfo>;

    /// The cell answering `query`, if any.
    fn query(&self, query: CellQuery) -> Option<CellInfo>;

    /// Connection candidates of `cell`, already accepted by both sides.
    fn query_neighbors(&self, cell: &CellInfo, host: &dyn ContainerHost) -> Vec<CellNeighborInfo>;

    /// Whether `cell` accepts a connection arriving from absolute `direction`,
    /// and under which relative direction it would record it.
    fn probe_connection_candidate(
        &self,
        cell: &CellInfo,
        direction: Direction,
    ) -> Option<RelativeRotationDirection>;

    fn record_connection(
        &mut self,
        cell: &CellInfo,
        direction: RelativeRotationDirection,
        neighbor: &CellInfo,
    );

    fn record_deleted_connection(&mut self, cell: &CellInfo, direction: RelativeRotationDirection);

    /// The graph membership of one of this container's cells changed.
    fn topology_changed(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Resolves containers by block position.
pub trait ContainerHost {
    fn container(&self, pos: BlockPos) -> Option<&dyn CellContainer>;

    fn container_mut(&mut self, pos: BlockPos) -> Option<&mut dyn CellContainer>;
}

// ---------------------------------------------------------------------------
// BlockCellContainer
// ---------------------------------------------------------------------------

/// A full block holding a single cell on its [`BLOCK_CELL_FACE`].
///
/// Only the four horizontal neighbours are considered. Connection rules are
/// evaluated in the block's own frame through its [`PlacementRotation`].
#[derive(Debug)]
pub struct BlockCellContainer {
    pos: BlockPos,
    rotation: PlacementRotation,
    provider: Arc<dyn CellProvider>,
    cell: Option<CellId>,
    connections: Vec<RelativeRotationDirection>,
    needs_save: bool,
}

impl BlockCellContainer {
    pub fn new(pos: BlockPos, rotation: PlacementRotation, provider: Arc<dyn CellProvider>) -> Self {
        Self {
            pos,
            rotation,
            provider,
            cell: None,
            connections: Vec::new(),
            needs_save: false,
        }
    }

    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    pub fn rotation(&self) -> PlacementRotation {
        self.rotation
    }

    pub fn provider(&self) -> &Arc<dyn CellProvider> {
        &self.provider
    }

    pub fn cell(&self) -> Option<CellId> {
        self.cell
    }

    pub fn set_cell(&mut self, cell: Option<CellId>) {
        self.cell = cell;
    }

    pub fn cell_pos(&self) -> CellPos {
        CellPos::new(self.pos, BLOCK_CELL_FACE)
    }

    /// Relative directions of the connections recorded so far.
    pub fn connections(&self) -> &[RelativeRotationDirection] {
        &self.connections
    }

    /// Set by [`topology_changed`](CellContainer::topology_changed); the
    /// host must persist the cell's graph id again.
    pub fn needs_save(&self) -> bool {
        self.needs_save
    }

    pub fn mark_saved(&mut self) {
        self.needs_save = false;
    }

    fn info(&self) -> Option<CellInfo> {
        Some(CellInfo {
            cell: self.cell?,
            face: BLOCK_CELL_FACE,
        })
    }

    /// The relative direction of absolute `direction`, if the provider
    /// accepts connections from it.
    fn accepted(&self, direction: Direction) -> Option<RelativeRotationDirection> {
        let relative = self.rotation.relative_from_absolute(direction);
        self.provider.can_connect_from(relative).then_some(relative)
    }

    fn owns(&self, cell: &CellInfo) -> bool {
        self.cell == Some(cell.cell) && cell.face == BLOCK_CELL_FACE
    }
}

impl CellContainer for BlockCellContainer {
    fn cells(&self) -> Vec<CellInfo> {
        self.info().into_iter().collect()
    }

    fn query(&self, query: CellQuery) -> Option<CellInfo> {
        if query.surface != BLOCK_CELL_FACE {
            return None;
        }
        self.accepted(query.connection_face)?;
        self.info()
    }

    fn query_neighbors(&self, cell: &CellInfo, host: &dyn ContainerHost) -> Vec<CellNeighborInfo> {
        let mut found = Vec::new();
        if !self.owns(cell) {
            return found;
        }

        for direction in Direction::HORIZONTALS {
            let Some(source_direction) = self.accepted(direction) else {
                continue;
            };
            let neighbor_pos = self.pos.offset(direction);
            let Some(remote) = host.container(neighbor_pos) else {
                continue;
            };
            let Some(remote_cell) = remote.query(CellQuery {
                connection_face: direction.opposite(),
                surface: BLOCK_CELL_FACE,
            }) else {
                continue;
            };
            let Some(neighbor_direction) =
                remote.probe_connection_candidate(&remote_cell, direction.opposite())
            else {
                continue;
            };
            found.push(CellNeighborInfo {
                neighbor: remote_cell,
                neighbor_container: neighbor_pos,
                source_direction,
                neighbor_direction,
            });
        }
        found
    }

    fn probe_connection_candidate(
        &self,
        cell: &CellInfo,
        direction: Direction,
    ) -> Option<RelativeRotationDirection> {
        if !self.owns(cell) {
            return None;
        }
        self.accepted(direction)
    }

    fn record_connection(
        &mut self,
        cell: &CellInfo,
        direction: RelativeRotationDirection,
        neighbor: &CellInfo,
    ) {
        if !self.connections.contains(&direction) {
            self.connections.push(direction);
        }
        debug!(pos = ?self.pos, cell = ?cell.cell, neighbor = ?neighbor.cell, ?direction, "recorded connection");
    }

    fn record_deleted_connection(&mut self, cell: &CellInfo, direction: RelativeRotationDirection) {
        self.connections.retain(|d| *d != direction);
        debug!(pos = ?self.pos, cell = ?cell.cell, ?direction, "deleted connection");
    }

    fn topology_changed(&mut self) {
        self.needs_save = true;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// ContainerMap
// ---------------------------------------------------------------------------

/// A [`ContainerHost`] keyed by block position. Also drives the block
/// lifecycle: placement, destruction, load and unload.
#[derive(Debug, Default)]
pub struct ContainerMap {
    containers: HashMap<BlockPos, Box<dyn CellContainer>>,
}

impl ContainerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pos: BlockPos, container: Box<dyn CellContainer>) -> Result<(), GraphError> {
        if self.containers.contains_key(&pos) {
            return Err(GraphError::ContainerOccupied(pos));
        }
        self.containers.insert(pos, container);
        Ok(())
    }

    pub fn remove(&mut self, pos: BlockPos) -> Option<Box<dyn CellContainer>> {
        self.containers.remove(&pos)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// The block container at `pos`, if that is what is there.
    pub fn block(&self, pos: BlockPos) -> Option<&BlockCellContainer> {
        self.containers.get(&pos)?.as_any().downcast_ref()
    }

    pub fn block_mut(&mut self, pos: BlockPos) -> Option<&mut BlockCellContainer> {
        self.containers.get_mut(&pos)?.as_any_mut().downcast_mut()
    }

    /// Place a block cell: create the cell, register the container, then
    /// connect it to every accepting neighbour. On error nothing of the
    /// placement remains.
    pub fn place_block(
        &mut self,
        manager: &mut CellGraphManager,
        pos: BlockPos,
        facing: Direction,
        provider: Arc<dyn CellProvider>,
    ) -> Result<(CellId, TopologyChange), GraphError> {
        if self.containers.contains_key(&pos) {
            return Err(GraphError::ContainerOccupied(pos));
        }
        let rotation = PlacementRotation::new(facing)?;
        let mut container = BlockCellContainer::new(pos, rotation, provider);
        let cell = container.provider().create(container.cell_pos())?;
        let id = manager.insert_cell(cell);
        manager.container_loaded(id, pos)?;
        container.set_cell(Some(id));
        self.containers.insert(pos, Box::new(container));

        let info = CellInfo {
            cell: id,
            face: BLOCK_CELL_FACE,
        };
        match CellConnectionManager::connect(manager, self, pos, info) {
            Ok(change) => Ok((id, change)),
            Err(err) => {
                // Undo the placement, including edges recorded on neighbours.
                let _ = CellConnectionManager::destroy(manager, self, pos, info);
                self.containers.remove(&pos);
                Err(err)
            }
        }
    }

    /// Destroy the block at `pos` together with its cell.
    pub fn destroy_block(
        &mut self,
        manager: &mut CellGraphManager,
        pos: BlockPos,
    ) -> Result<RemovedCell, GraphError> {
        let cell = self
            .block(pos)
            .ok_or(GraphError::ContainerNotFound(pos))?
            .cell()
            .ok_or(GraphError::ContainerNotFound(pos))?;
        let info = CellInfo {
            cell,
            face: BLOCK_CELL_FACE,
        };
        let removed = CellConnectionManager::destroy(manager, self, pos, info);
        if removed.is_ok() || manager.cell(cell).is_err() {
            self.containers.remove(&pos);
        }
        removed
    }

    /// Re-attach a persisted block to its cell after a world load.
    ///
    /// The host persisted only `graph`; the cell is found by position and its
    /// provider through the registry-resolved `provider`.
    pub fn load_block(
        &mut self,
        manager: &mut CellGraphManager,
        pos: BlockPos,
        facing: Direction,
        provider: Arc<dyn CellProvider>,
        graph: GraphId,
    ) -> Result<CellId, GraphError> {
        let rotation = PlacementRotation::new(facing)?;
        let mut container = BlockCellContainer::new(pos, rotation, provider);
        let cell = manager.load_cell(graph, container.cell_pos())?;
        manager.container_loaded(cell, pos)?;
        container.set_cell(Some(cell));
        for edge in manager.cell(cell)?.edges() {
            container.connections.push(edge.direction);
        }
        self.insert(pos, Box::new(container))?;
        Ok(cell)
    }

    /// Drop the block at `pos` on chunk unload. The cell stays in its graph.
    pub fn unload_block(
        &mut self,
        manager: &mut CellGraphManager,
        pos: BlockPos,
    ) -> Result<(), GraphError> {
        let container = self
            .containers
            .remove(&pos)
            .ok_or(GraphError::ContainerNotFound(pos))?;
        for info in container.cells() {
            manager.container_unloaded(info.cell)?;
        }
        Ok(())
    }
}

impl ContainerHost for ContainerMap {
    fn container(&self, pos: BlockPos) -> Option<&dyn CellContainer> {
        self.containers.get(&pos).map(|c| c.as_ref())
    }

    fn container_mut(&mut self, pos: BlockPos) -> Option<&mut dyn CellContainer> {
        match self.containers.get_mut(&pos) {
            Some(container) => {
                let container: &mut dyn CellContainer = container.as_mut();
                Some(container)
            }
            None => None,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
