//! Placement and removal of cells, from container discovery to graph rebuild.

use std::collections::BTreeSet;

use tracing::debug;

use crate::container::{CellInfo, ContainerHost};
use crate::graph::GraphError;
use crate::manager::{CellGraphManager, RemovedCell, TopologyChange};
use crate::space::BlockPos;

/// Connects newly placed cells and disconnects destroyed ones.
///
/// The container notifications are driven from here so that containers never
/// need access to the graph manager.
pub struct CellConnectionManager;

impl CellConnectionManager {
    /// Connect a cell that was just added to `manager` and to the container
    /// at `container`.
    ///
    /// Neighbour discovery runs through the container, so only candidates
    /// accepted by both sides become edges. A candidate that would exceed
    /// either cell's connection capacity is skipped before anything is
    /// recorded. Both containers record each new connection, then the cell
    /// joins, creates or merges graphs and the result is rebuilt.
    pub fn connect(
        manager: &mut CellGraphManager,
        host: &mut dyn ContainerHost,
        container: BlockPos,
        cell: CellInfo,
    ) -> Result<TopologyChange, GraphError> {
        let neighbors = host
            .container(container)
            .ok_or(GraphError::ContainerNotFound(container))?
            .query_neighbors(&cell, &*host);

        for found in &neighbors {
            if !manager.can_connect(cell.cell, found.neighbor.cell)? {
                debug!(
                    cell = ?cell.cell,
                    neighbor = ?found.neighbor.cell,
                    "skipped candidate at connection capacity"
                );
                continue;
            }
            let added = manager.connect_cells(
                cell.cell,
                found.source_direction,
                found.neighbor.cell,
                found.neighbor_direction,
            )?;
            if !added {
                continue;
            }
            if let Some(local) = host.container_mut(container) {
                local.record_connection(&cell, found.source_direction, &found.neighbor);
            }
            if let Some(remote) = host.container_mut(found.neighbor_container) {
                remote.record_connection(&found.neighbor, found.neighbor_direction, &cell);
            }
        }

        let change = manager.attach(cell.cell)?;
        Self::notify_topology(manager, host, &change);
        Ok(change)
    }

    /// Disconnect and remove a cell whose container is being destroyed.
    ///
    /// Former neighbours' containers are told which connection they lost.
    /// Graph splitting and rebuilding happen in the manager. Once the cell is
    /// removed this no longer fails.
    pub fn destroy(
        manager: &mut CellGraphManager,
        host: &mut dyn ContainerHost,
        container: BlockPos,
        cell: CellInfo,
    ) -> Result<RemovedCell, GraphError> {
        if host.container(container).is_none() {
            return Err(GraphError::ContainerNotFound(container));
        }

        let removed = manager.remove_cell(cell.cell)?;

        for &(neighbor, direction) in &removed.deleted_edges {
            let Ok(neighbor_cell) = manager.cell(neighbor) else {
                continue;
            };
            let info = CellInfo {
                cell: neighbor,
                face: neighbor_cell.pos().face,
            };
            if let Some(remote) = neighbor_cell
                .container()
                .and_then(|pos| host.container_mut(pos))
            {
                remote.record_deleted_connection(&info, direction);
                remote.topology_changed();
            }
        }

        Self::notify_topology(manager, host, &removed.change);
        Ok(removed)
    }

    /// Tell every loaded container with a cell in a changed graph.
    fn notify_topology(
        manager: &CellGraphManager,
        host: &mut dyn ContainerHost,
        change: &TopologyChange,
    ) {
        let mut containers = BTreeSet::new();
        for graph in change.graphs.iter().filter_map(|id| manager.graph(*id).ok()) {
            for &cell in graph.cells() {
                if let Some(pos) = manager.cells().get(cell).and_then(|c| c.container()) {
                    containers.insert(pos);
                }
            }
        }
        for pos in containers {
            if let Some(container) = host.container_mut(pos) {
                container.topology_changed();
            }
        }
    }
}
