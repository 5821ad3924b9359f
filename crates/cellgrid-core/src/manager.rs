//! Per-world graph managers and the world registry.
//!
//! A [`CellGraphManager`] owns every cell of one world in a slotmap arena and
//! every graph built from them. It implements the graph side of placement and
//! removal: joining, merging and splitting graphs and rebuilding their
//! circuits. Container notification is layered on top by
//! [`CellConnectionManager`](crate::connection::CellConnectionManager).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cell::{Cell, CellArena, CellEdge};
use crate::config::CellgridConfig;
use crate::dirty::DirtyTracker;
use crate::graph::{CellGraph, GraphError};
use crate::id::{CellId, CellPos, GraphId, WorldId};
use crate::object::SimulationObjectType;
use crate::profiling::{SimulationStats, StatsSnapshot};
use crate::space::{BlockPos, RelativeRotationDirection};

// ---------------------------------------------------------------------------
// Topology change reports
// ---------------------------------------------------------------------------

/// Graphs touched by one placement or removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyChange {
    /// Live graphs whose membership changed and which were rebuilt.
    pub graphs: Vec<GraphId>,
    /// Graphs that no longer exist (merged away, split or emptied).
    pub removed: Vec<GraphId>,
    /// Live graphs whose rebuild failed. They stay in `graphs` and keep no
    /// circuit until a later rebuild succeeds.
    pub failed: Vec<(GraphId, GraphError)>,
}

impl TopologyChange {
    pub fn is_built(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A cell taken out of the manager, with the edges its neighbours lost.
#[derive(Debug)]
pub struct RemovedCell {
    pub cell: Cell,
    /// Each former neighbour and the direction (relative to the neighbour)
    /// under which it had recorded the removed cell.
    pub deleted_edges: Vec<(CellId, RelativeRotationDirection)>,
    pub change: TopologyChange,
}

// ---------------------------------------------------------------------------
// CellGraphManager
// ---------------------------------------------------------------------------

/// All cells and graphs of one world.
#[derive(Debug, Default)]
pub struct CellGraphManager {
    cells: CellArena,
    graphs: BTreeMap<GraphId, CellGraph>,
    dirty: DirtyTracker,
}

impl CellGraphManager {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Cells --------------------------------------------------------------

    /// Store a new cell. It belongs to no graph until [`attach`](Self::attach).
    pub fn insert_cell(&mut self, cell: Cell) -> CellId {
        self.cells.insert(cell)
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell, GraphError> {
        self.cells.get(id).ok_or(GraphError::CellNotFound(id))
    }

    pub fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell, GraphError> {
        self.cells.get_mut(id).ok_or(GraphError::CellNotFound(id))
    }

    pub fn cells(&self) -> &CellArena {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Record a connection on both cells. Returns false if they were already
    /// connected.
    pub fn connect_cells(
        &mut self,
        a: CellId,
        a_direction: RelativeRotationDirection,
        b: CellId,
        b_direction: RelativeRotationDirection,
    ) -> Result<bool, GraphError> {
        if !self.cells.contains_key(b) {
            return Err(GraphError::CellNotFound(b));
        }
        let added = self.cell_mut(a)?.add_edge(CellEdge {
            neighbor: b,
            direction: a_direction,
        });
        self.cell_mut(b)?.add_edge(CellEdge {
            neighbor: a,
            direction: b_direction,
        });
        if added {
            debug!(?a, ?b, ?a_direction, ?b_direction, "recorded cell edge");
        }
        Ok(added)
    }

    /// Whether an edge between `a` and `b` fits the connection capacity of
    /// both cells. Only the electrical domain is bounded.
    pub fn can_connect(&self, a: CellId, b: CellId) -> Result<bool, GraphError> {
        let (cell_a, cell_b) = (self.cell(a)?, self.cell(b)?);
        if cell_a.is_connected_to(b) {
            return Ok(true);
        }
        let electrical = SimulationObjectType::Electrical;
        if !cell_a.objects().has_object(electrical) || !cell_b.objects().has_object(electrical) {
            return Ok(true);
        }
        Ok(self.has_electrical_capacity(cell_a) && self.has_electrical_capacity(cell_b))
    }

    fn has_electrical_capacity(&self, cell: &Cell) -> bool {
        let Ok(object) = cell.objects().electrical() else {
            return true;
        };
        let used = cell
            .neighbors()
            .filter(|n| {
                self.cells
                    .get(*n)
                    .is_some_and(|c| c.objects().has_object(SimulationObjectType::Electrical))
            })
            .count();
        used < object.max_connections()
    }

    /// Host hook: the cell's container was loaded at `container`.
    pub fn container_loaded(&mut self, cell: CellId, container: BlockPos) -> Result<(), GraphError> {
        self.cell_mut(cell)?.on_container_loaded(container);
        Ok(())
    }

    /// Host hook: the cell's container was unloaded. The cell stays alive.
    pub fn container_unloaded(&mut self, cell: CellId) -> Result<(), GraphError> {
        self.cell_mut(cell)?.on_container_unloaded();
        Ok(())
    }

    /// Recover a persisted cell from its graph id and position.
    pub fn load_cell(&self, graph: GraphId, pos: CellPos) -> Result<CellId, GraphError> {
        let found = self.graph(graph).inspect_err(|_| {
            warn!(%graph, %pos, "loading cell of a missing graph");
        })?;
        found
            .cell_at(pos)
            .ok_or(GraphError::CellNotInGraph { graph, pos })
    }

    // -- Graphs -------------------------------------------------------------

    pub fn add_graph(&mut self, graph: CellGraph) {
        self.dirty.mark_graph(graph.id());
        self.graphs.insert(graph.id(), graph);
    }

    pub fn remove_graph(&mut self, id: GraphId) -> Option<CellGraph> {
        let graph = self.graphs.remove(&id)?;
        self.dirty.mark_removed(id);
        Some(graph)
    }

    pub fn contains(&self, id: GraphId) -> bool {
        self.graphs.contains_key(&id)
    }

    pub fn graph(&self, id: GraphId) -> Result<&CellGraph, GraphError> {
        self.graphs.get(&id).ok_or(GraphError::GraphNotFound(id))
    }

    pub fn graph_mut(&mut self, id: GraphId) -> Result<&mut CellGraph, GraphError> {
        self.graphs.get_mut(&id).ok_or(GraphError::GraphNotFound(id))
    }

    /// The graph holding a cell at `pos`, if any.
    pub fn graph_at(&self, pos: CellPos) -> Option<GraphId> {
        self.graphs
            .values()
            .find(|g| g.cell_at(pos).is_some())
            .map(CellGraph::id)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &CellGraph> {
        self.graphs.values()
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Number of undirected edges among the members of a graph.
    pub fn edge_count(&self, id: GraphId) -> Result<usize, GraphError> {
        let graph = self.graph(id)?;
        let ends: usize = graph
            .cells()
            .iter()
            .filter_map(|c| self.cells.get(*c))
            .map(|c| c.edges().len())
            .sum();
        Ok(ends / 2)
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn dirty_mut(&mut self) -> &mut DirtyTracker {
        &mut self.dirty
    }

    /// Rebuild one graph's circuit from its current membership.
    pub fn rebuild(&mut self, id: GraphId) -> Result<(), GraphError> {
        let graph = self.graphs.get_mut(&id).ok_or(GraphError::GraphNotFound(id))?;
        graph.build(&mut self.cells)
    }

    /// Rebuild `id` as part of a topology change. A failure is recorded in
    /// `change`; the membership change stays applied.
    fn rebuild_into(&mut self, id: GraphId, change: &mut TopologyChange) {
        if let Err(err) = self.rebuild(id) {
            change.failed.push((id, err));
        }
        change.graphs.push(id);
    }

    // -- Topology -----------------------------------------------------------

    /// Put a connected but graph-less cell into a graph.
    ///
    /// With no neighbouring graph a new one is created; with one the cell
    /// joins it; with several the graph holding the most cells absorbs the
    /// others. The resulting graph is rebuilt once; a failed rebuild is
    /// reported in [`TopologyChange::failed`].
    pub fn attach(&mut self, cell: CellId) -> Result<TopologyChange, GraphError> {
        let this = self.cell(cell)?;
        if this.has_graph() {
            return Err(GraphError::AlreadyInGraph(cell));
        }
        let pos = this.pos();

        let mut touched: Vec<GraphId> = Vec::new();
        for neighbor in this.neighbors() {
            if let Some(graph) = self.cells.get(neighbor).and_then(Cell::graph) {
                if !touched.contains(&graph) {
                    touched.push(graph);
                }
            }
        }

        let mut change = TopologyChange::default();
        let target = match touched.as_slice() {
            [] => {
                let graph = CellGraph::new(GraphId::new_v4());
                let id = graph.id();
                debug!(graph = %id, "created graph");
                self.add_graph(graph);
                id
            }
            [single] => *single,
            _ => {
                let mut survivor = touched[0];
                let mut largest = self.graph(survivor)?.len();
                for &candidate in &touched[1..] {
                    let len = self.graph(candidate)?.len();
                    if len > largest {
                        survivor = candidate;
                        largest = len;
                    }
                }
                for &absorbed in touched.iter().filter(|g| **g != survivor) {
                    self.merge_into(absorbed, survivor)?;
                    change.removed.push(absorbed);
                }
                survivor
            }
        };

        let graph = self.graphs.get_mut(&target).ok_or(GraphError::GraphNotFound(target))?;
        graph.add_cell(cell, pos);
        self.cell_mut(cell)?.set_graph(Some(target));
        self.dirty.mark_graph(target);

        self.rebuild_into(target, &mut change);
        Ok(change)
    }

    fn merge_into(&mut self, absorbed: GraphId, survivor: GraphId) -> Result<(), GraphError> {
        let from = self
            .graphs
            .remove(&absorbed)
            .ok_or(GraphError::GraphNotFound(absorbed))?;
        self.dirty.mark_removed(absorbed);
        let into = self
            .graphs
            .get_mut(&survivor)
            .ok_or(GraphError::GraphNotFound(survivor))?;

        for &id in from.cells() {
            let cell = self.cells.get_mut(id).ok_or(GraphError::CellNotFound(id))?;
            cell.set_graph(Some(survivor));
            into.add_cell(id, cell.pos());
        }
        debug!(from = %absorbed, into = %survivor, cells = from.len(), "merged graphs");
        Ok(())
    }

    /// Remove a cell and every edge to it.
    ///
    /// An emptied graph is discarded. A graph left disconnected is split into
    /// one fresh graph per connected component and the original id is
    /// retired. Every surviving affected graph is rebuilt; failures land in
    /// [`TopologyChange::failed`]. Errors are only returned before anything
    /// was changed.
    pub fn remove_cell(&mut self, id: CellId) -> Result<RemovedCell, GraphError> {
        if let Some(graph) = self.cell(id)?.graph() {
            if !self.graphs.contains_key(&graph) {
                return Err(GraphError::GraphNotFound(graph));
            }
        }
        let cell = self.cells.remove(id).ok_or(GraphError::CellNotFound(id))?;

        let mut deleted_edges = Vec::new();
        for edge in cell.edges() {
            if let Some(neighbor) = self.cells.get_mut(edge.neighbor) {
                if let Some(back) = neighbor.remove_edge(id) {
                    debug!(cell = ?edge.neighbor, removed = ?id, direction = ?back.direction, "deleted cell edge");
                    deleted_edges.push((edge.neighbor, back.direction));
                }
            }
        }

        let mut change = TopologyChange::default();
        if let Some(graph_id) = cell.graph() {
            let members = match self.graphs.get_mut(&graph_id) {
                Some(graph) => {
                    graph.remove_cell(id, cell.pos());
                    graph.cells().to_vec()
                }
                None => Vec::new(),
            };

            if members.is_empty() {
                self.remove_graph(graph_id);
                debug!(graph = %graph_id, "discarded empty graph");
                change.removed.push(graph_id);
            } else {
                self.split(graph_id, &members, &mut change);
            }
        }

        Ok(RemovedCell {
            cell,
            deleted_edges,
            change,
        })
    }

    /// Re-partition the remaining `members` of `id`. Every component gets its
    /// graph before any of them is rebuilt.
    fn split(&mut self, id: GraphId, members: &[CellId], change: &mut TopologyChange) {
        let components = self.components_of(members);
        if components.len() <= 1 {
            self.dirty.mark_graph(id);
            self.rebuild_into(id, change);
            return;
        }

        self.remove_graph(id);
        change.removed.push(id);
        debug!(graph = %id, parts = components.len(), "split graph");

        let mut fresh = Vec::with_capacity(components.len());
        for component in components {
            let mut graph = CellGraph::new(GraphId::new_v4());
            for cell_id in component {
                if let Some(cell) = self.cells.get_mut(cell_id) {
                    cell.set_graph(Some(graph.id()));
                    graph.add_cell(cell_id, cell.pos());
                }
            }
            fresh.push(graph.id());
            self.add_graph(graph);
        }

        for graph in fresh {
            self.rebuild_into(graph, change);
        }
    }

    /// Connected components of `members`, in membership order.
    fn components_of(&self, members: &[CellId]) -> Vec<Vec<CellId>> {
        let index: HashSet<CellId> = members.iter().copied().collect();
        let mut visited: HashSet<CellId> = HashSet::new();
        let mut components = Vec::new();

        for &start in members {
            if !visited.insert(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                component.push(current);
                let Some(cell) = self.cells.get(current) else {
                    continue;
                };
                for neighbor in cell.neighbors() {
                    if index.contains(&neighbor) && visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    // -- Simulation ---------------------------------------------------------

    /// Step every graph by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        for graph in self.graphs.values_mut() {
            graph.step(dt, &mut self.cells);
        }
    }

    /// Sum of every graph's tick rate since the previous sample.
    pub fn sample_tick_rate(&mut self) -> f64 {
        self.graphs.values_mut().map(CellGraph::sample_tick_rate).sum()
    }

    /// Sum of every graph's most recent step time.
    pub fn total_spent_time(&self) -> Duration {
        self.graphs.values().map(CellGraph::spent_time).sum()
    }
}

// ---------------------------------------------------------------------------
// WorldRegistry
// ---------------------------------------------------------------------------

/// One independent [`CellGraphManager`] per world.
#[derive(Debug)]
pub struct WorldRegistry {
    config: CellgridConfig,
    managers: HashMap<WorldId, CellGraphManager>,
    stats: SimulationStats,
}

impl WorldRegistry {
    pub fn new(config: CellgridConfig) -> Self {
        let stats = SimulationStats::new(config.stats.window, config.stats.log_interval);
        Self {
            config,
            managers: HashMap::new(),
            stats,
        }
    }

    pub fn config(&self) -> &CellgridConfig {
        &self.config
    }

    /// The manager of `world`, created on first use.
    pub fn manager(&mut self, world: WorldId) -> &mut CellGraphManager {
        self.managers.entry(world).or_default()
    }

    pub fn get(&self, world: WorldId) -> Option<&CellGraphManager> {
        self.managers.get(&world)
    }

    /// Tear down a world's manager, dropping all of its cells and graphs.
    pub fn unload(&mut self, world: WorldId) -> Option<CellGraphManager> {
        let manager = self.managers.remove(&world)?;
        debug!(?world, graphs = manager.graph_count(), "unloaded world");
        Some(manager)
    }

    pub fn world_count(&self) -> usize {
        self.managers.len()
    }

    /// Step every world by the configured time step and fold the totals into
    /// the rolling statistics. Returns the averages when they were logged.
    pub fn tick(&mut self) -> Option<StatsSnapshot> {
        let dt = self.config.simulation.time_step;
        let start = Instant::now();
        let mut rate = 0.0;
        let mut spent = Duration::ZERO;
        for manager in self.managers.values_mut() {
            manager.step(dt);
            rate += manager.sample_tick_rate();
            spent += manager.total_spent_time();
        }
        debug!(elapsed = ?start.elapsed(), "ticked worlds");
        self.stats.record(rate, spent)
    }
}

impl Default for WorldRegistry {
    fn default() -> Self {
        Self::new(CellgridConfig::default())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electrical::ResistorObject;
    use crate::id::CellTypeId;
    use crate::object::{SimulationObject, SimulationObjectSet};
    use crate::space::Direction;

    fn pos(x: i32, z: i32) -> CellPos {
        CellPos::new(BlockPos::new(x, 0, z), Direction::Up)
    }

    fn resistor(manager: &mut CellGraphManager, at: CellPos) -> CellId {
        manager.insert_cell(Cell::new(
            CellTypeId(1),
            at,
            SimulationObjectSet::single(SimulationObject::electrical(ResistorObject::default())),
        ))
    }

    fn join(manager: &mut CellGraphManager, a: CellId, b: CellId) {
        manager
            .connect_cells(
                a,
                RelativeRotationDirection::Right,
                b,
                RelativeRotationDirection::Left,
            )
            .unwrap();
    }

    /// Place a horizontal line of resistors along x, each attached in order.
    fn line(manager: &mut CellGraphManager, len: i32) -> Vec<CellId> {
        let mut ids: Vec<CellId> = Vec::new();
        for x in 0..len {
            let id = resistor(manager, pos(x, 0));
            if let Some(&prev) = ids.last() {
                join(manager, prev, id);
            }
            manager.attach(id).unwrap();
            ids.push(id);
        }
        ids
    }

    #[test]
    fn lone_cell_gets_new_graph() {
        let mut manager = CellGraphManager::new();
        let a = resistor(&mut manager, pos(0, 0));
        let change = manager.attach(a).unwrap();
        assert_eq!(change.graphs.len(), 1);
        assert!(change.removed.is_empty());
        let graph = manager.cell(a).unwrap().graph().unwrap();
        assert!(manager.contains(graph));
        assert!(manager.dirty().is_graph_dirty(graph));
        assert_eq!(manager.graph_at(pos(0, 0)), Some(graph));
    }

    #[test]
    fn attach_twice_is_rejected() {
        let mut manager = CellGraphManager::new();
        let a = resistor(&mut manager, pos(0, 0));
        manager.attach(a).unwrap();
        assert_eq!(manager.attach(a).unwrap_err(), GraphError::AlreadyInGraph(a));
    }

    #[test]
    fn larger_graph_survives_merge() {
        let mut manager = CellGraphManager::new();
        let left = line(&mut manager, 3);
        let big = manager.cell(left[0]).unwrap().graph().unwrap();

        let lone = resistor(&mut manager, pos(4, 0));
        manager.attach(lone).unwrap();
        let small = manager.cell(lone).unwrap().graph().unwrap();

        let bridge = resistor(&mut manager, pos(3, 0));
        join(&mut manager, left[2], bridge);
        join(&mut manager, bridge, lone);
        let change = manager.attach(bridge).unwrap();

        assert_eq!(change.graphs, vec![big]);
        assert_eq!(change.removed, vec![small]);
        assert!(!manager.contains(small));
        assert_eq!(manager.graph(big).unwrap().len(), 5);
        assert_eq!(manager.cell(lone).unwrap().graph(), Some(big));
        assert_eq!(manager.edge_count(big).unwrap(), 4);
        assert_eq!(manager.graph(big).unwrap().circuit().unwrap().component_count(), 5);
    }

    #[test]
    fn removing_end_keeps_graph() {
        let mut manager = CellGraphManager::new();
        let ids = line(&mut manager, 3);
        let graph = manager.cell(ids[0]).unwrap().graph().unwrap();

        let removed = manager.remove_cell(ids[0]).unwrap();
        assert_eq!(removed.change.graphs, vec![graph]);
        assert_eq!(removed.deleted_edges, vec![(ids[1], RelativeRotationDirection::Left)]);
        assert_eq!(manager.graph(graph).unwrap().len(), 2);
        assert!(!manager.cell(ids[1]).unwrap().is_connected_to(ids[0]));
    }

    #[test]
    fn removing_middle_splits_with_fresh_ids() {
        let mut manager = CellGraphManager::new();
        let ids = line(&mut manager, 3);
        let original = manager.cell(ids[0]).unwrap().graph().unwrap();

        let removed = manager.remove_cell(ids[1]).unwrap();
        assert_eq!(removed.change.removed, vec![original]);
        assert_eq!(removed.change.graphs.len(), 2);
        assert!(!manager.contains(original));
        assert!(manager.dirty().is_graph_removed(original));

        let a = manager.cell(ids[0]).unwrap().graph().unwrap();
        let c = manager.cell(ids[2]).unwrap().graph().unwrap();
        assert_ne!(a, c);
        assert_ne!(a, original);
        assert_eq!(manager.graph(a).unwrap().cells(), &[ids[0]]);
        assert_eq!(manager.graph(c).unwrap().cells(), &[ids[2]]);
    }

    #[test]
    fn removing_last_cell_discards_graph() {
        let mut manager = CellGraphManager::new();
        let a = resistor(&mut manager, pos(0, 0));
        let graph = manager.attach(a).unwrap().graphs[0];
        let removed = manager.remove_cell(a).unwrap();
        assert_eq!(removed.change.removed, vec![graph]);
        assert_eq!(manager.graph_count(), 0);
        assert_eq!(manager.cell_count(), 0);
    }

    #[test]
    fn missing_graph_is_an_error_not_none() {
        let manager = CellGraphManager::new();
        let id = GraphId::new_v4();
        assert_eq!(manager.graph(id).unwrap_err(), GraphError::GraphNotFound(id));
        assert_eq!(manager.graph_at(pos(0, 0)), None);
        assert!(manager.load_cell(id, pos(0, 0)).is_err());
    }

    #[test]
    fn load_cell_finds_member_by_position() {
        let mut manager = CellGraphManager::new();
        let ids = line(&mut manager, 2);
        let graph = manager.cell(ids[1]).unwrap().graph().unwrap();
        assert_eq!(manager.load_cell(graph, pos(1, 0)), Ok(ids[1]));
        assert_eq!(
            manager.load_cell(graph, pos(9, 0)),
            Err(GraphError::CellNotInGraph {
                graph,
                pos: pos(9, 0)
            })
        );
    }

    #[test]
    fn container_hooks_track_back_reference() {
        let mut manager = CellGraphManager::new();
        let a = resistor(&mut manager, pos(0, 0));
        manager.container_loaded(a, BlockPos::new(0, 0, 0)).unwrap();
        assert_eq!(manager.cell(a).unwrap().container(), Some(BlockPos::new(0, 0, 0)));
        manager.container_unloaded(a).unwrap();
        assert_eq!(manager.cell(a).unwrap().container(), None);
        assert!(manager.cell(a).is_ok(), "unloading a container keeps the cell");
    }

    #[test]
    fn worlds_are_independent() {
        let mut worlds = WorldRegistry::default();
        let a = resistor(worlds.manager(WorldId(0)), pos(0, 0));
        worlds.manager(WorldId(0)).attach(a).unwrap();
        worlds.manager(WorldId(1));

        assert_eq!(worlds.world_count(), 2);
        assert_eq!(worlds.get(WorldId(0)).unwrap().graph_count(), 1);
        assert_eq!(worlds.get(WorldId(1)).unwrap().graph_count(), 0);

        assert!(worlds.tick().is_some(), "first tick logs statistics");
        assert!(worlds.unload(WorldId(0)).is_some());
        assert!(worlds.get(WorldId(0)).is_none());
    }
}
