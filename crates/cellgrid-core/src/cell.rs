//! Cells, cell providers and the provider registry.
//!
//! A cell is a positioned simulation unit. Graphs and containers never own
//! cells directly: cells live in the graph manager's arena and everything
//! else refers to them by [`CellId`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use slotmap::SlotMap;

use crate::electrical::{ElectricalLookup, ElectricalObject};
use crate::id::{CellId, CellPos, CellTypeId, GraphId};
use crate::mask::DirectionMask;
use crate::object::{ObjectSetError, SimulationObjectSet};
use crate::space::{BlockPos, RelativeRotationDirection};
use crate::thermal::{ThermalBodies, ThermalBody};

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One connection of a cell, seen from that cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellEdge {
    pub neighbor: CellId,
    /// Direction of the neighbour, relative to this cell's container.
    pub direction: RelativeRotationDirection,
}

/// A positioned simulation unit owning one [`SimulationObjectSet`].
#[derive(Debug)]
pub struct Cell {
    type_id: CellTypeId,
    pos: CellPos,
    objects: SimulationObjectSet,
    graph: Option<GraphId>,
    container: Option<BlockPos>,
    edges: Vec<CellEdge>,
}

impl Cell {
    pub fn new(type_id: CellTypeId, pos: CellPos, objects: SimulationObjectSet) -> Self {
        Self {
            type_id,
            pos,
            objects,
            graph: None,
            container: None,
            edges: Vec::new(),
        }
    }

    pub fn type_id(&self) -> CellTypeId {
        self.type_id
    }

    pub fn pos(&self) -> CellPos {
        self.pos
    }

    pub fn objects(&self) -> &SimulationObjectSet {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut SimulationObjectSet {
        &mut self.objects
    }

    /// The graph this cell belongs to, once connected.
    pub fn graph(&self) -> Option<GraphId> {
        self.graph
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub(crate) fn set_graph(&mut self, graph: Option<GraphId>) {
        self.graph = graph;
    }

    /// Position of the hosting container while it is loaded.
    pub fn container(&self) -> Option<BlockPos> {
        self.container
    }

    pub fn on_container_loaded(&mut self, container: BlockPos) {
        self.container = Some(container);
    }

    pub fn on_container_unloaded(&mut self) {
        self.container = None;
    }

    pub fn edges(&self) -> &[CellEdge] {
        &self.edges
    }

    pub fn neighbors(&self) -> impl Iterator<Item = CellId> + '_ {
        self.edges.iter().map(|e| e.neighbor)
    }

    pub fn is_connected_to(&self, neighbor: CellId) -> bool {
        self.edges.iter().any(|e| e.neighbor == neighbor)
    }

    /// Record an edge. Returns false if the neighbour was already connected.
    pub(crate) fn add_edge(&mut self, edge: CellEdge) -> bool {
        if self.is_connected_to(edge.neighbor) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Remove the edge to `neighbor`, returning it if present.
    pub(crate) fn remove_edge(&mut self, neighbor: CellId) -> Option<CellEdge> {
        let index = self.edges.iter().position(|e| e.neighbor == neighbor)?;
        Some(self.edges.remove(index))
    }
}

/// The manager's cell storage.
pub type CellArena = SlotMap<CellId, Cell>;

impl ElectricalLookup for CellArena {
    fn electrical(&self, cell: CellId) -> Option<&dyn ElectricalObject> {
        self.get(cell)?.objects.electrical().ok()
    }
}

impl ThermalBodies for CellArena {
    fn body(&self, cell: CellId) -> Option<&ThermalBody> {
        Some(self.get(cell)?.objects.thermal().ok()?.body())
    }

    fn body_mut(&mut self, cell: CellId) -> Option<&mut ThermalBody> {
        Some(self.get_mut(cell)?.objects.thermal_mut().ok()?.body_mut())
    }
}

// ---------------------------------------------------------------------------
// CellProvider
// ---------------------------------------------------------------------------

/// Factory and connection policy for one cell type.
pub trait CellProvider: fmt::Debug + Send + Sync {
    fn type_id(&self) -> CellTypeId;

    fn name(&self) -> &str;

    /// Build the simulation objects of a new cell.
    fn create_objects(&self) -> Result<SimulationObjectSet, ObjectSetError>;

    /// Whether a cell of this type accepts a connection from `direction`.
    fn can_connect_from(&self, direction: RelativeRotationDirection) -> bool;

    fn create(&self, pos: CellPos) -> Result<Cell, ObjectSetError> {
        Ok(Cell::new(self.type_id(), pos, self.create_objects()?))
    }
}

type ObjectFactory = dyn Fn() -> Result<SimulationObjectSet, ObjectSetError> + Send + Sync;

/// A provider built from a connectable-direction mask and an object factory.
///
/// The mask holds the absolute aliases of the accepted relative directions,
/// so `DirectionMask::FRONT + DirectionMask::BACK` accepts Front and Back.
pub struct BasicCellProvider {
    type_id: CellTypeId,
    name: String,
    connectable: DirectionMask,
    factory: Box<ObjectFactory>,
}

impl BasicCellProvider {
    pub fn new(
        type_id: CellTypeId,
        name: impl Into<String>,
        connectable: DirectionMask,
        factory: impl Fn() -> Result<SimulationObjectSet, ObjectSetError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_id,
            name: name.into(),
            connectable,
            factory: Box::new(factory),
        }
    }

    pub fn connectable(&self) -> DirectionMask {
        self.connectable
    }
}

impl fmt::Debug for BasicCellProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCellProvider")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("connectable", &self.connectable)
            .finish_non_exhaustive()
    }
}

impl CellProvider for BasicCellProvider {
    fn type_id(&self) -> CellTypeId {
        self.type_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn create_objects(&self) -> Result<SimulationObjectSet, ObjectSetError> {
        (self.factory)()
    }

    fn can_connect_from(&self, direction: RelativeRotationDirection) -> bool {
        self.connectable.has_relative(direction)
    }
}

// ---------------------------------------------------------------------------
// CellRegistry
// ---------------------------------------------------------------------------

/// Errors from provider registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("cell type {0:?} is already registered")]
    DuplicateType(CellTypeId),
    #[error("cell type name '{0}' is already registered")]
    DuplicateName(String),
    #[error("cell type not found: {0:?}")]
    NotFound(CellTypeId),
}

/// Providers by type id. Hosts use it to find the provider of a loaded cell.
#[derive(Debug, Default, Clone)]
pub struct CellRegistry {
    providers: HashMap<CellTypeId, Arc<dyn CellProvider>>,
    names: HashMap<String, CellTypeId>,
}

impl CellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn CellProvider>) -> Result<CellTypeId, RegistryError> {
        let type_id = provider.type_id();
        if self.providers.contains_key(&type_id) {
            return Err(RegistryError::DuplicateType(type_id));
        }
        if self.names.contains_key(provider.name()) {
            return Err(RegistryError::DuplicateName(provider.name().to_string()));
        }
        self.names.insert(provider.name().to_string(), type_id);
        self.providers.insert(type_id, provider);
        Ok(type_id)
    }

    pub fn provider(&self, type_id: CellTypeId) -> Result<&Arc<dyn CellProvider>, RegistryError> {
        self.providers
            .get(&type_id)
            .ok_or(RegistryError::NotFound(type_id))
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn CellProvider>> {
        self.names.get(name).and_then(|id| self.providers.get(id))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electrical::ResistorObject;
    use crate::object::SimulationObject;
    use crate::space::Direction;

    fn resistor_provider(type_id: u32, name: &str) -> BasicCellProvider {
        BasicCellProvider::new(
            CellTypeId(type_id),
            name,
            DirectionMask::FRONT + DirectionMask::BACK,
            || {
                SimulationObjectSet::new(vec![SimulationObject::electrical(
                    ResistorObject::default(),
                )])
            },
        )
    }

    #[test]
    fn provider_creates_cells_at_position() {
        let provider = resistor_provider(0, "resistor");
        let pos = CellPos::new(BlockPos::new(1, 0, 0), Direction::Up);
        let cell = provider.create(pos).unwrap();
        assert_eq!(cell.pos(), pos);
        assert_eq!(cell.type_id(), CellTypeId(0));
        assert!(!cell.has_graph());
        assert!(cell.objects().electrical().is_ok());
    }

    #[test]
    fn provider_policy_follows_mask() {
        let provider = resistor_provider(0, "resistor");
        assert!(provider.can_connect_from(RelativeRotationDirection::Front));
        assert!(provider.can_connect_from(RelativeRotationDirection::Back));
        assert!(!provider.can_connect_from(RelativeRotationDirection::Left));
        assert!(!provider.can_connect_from(RelativeRotationDirection::Up));
    }

    #[test]
    fn failing_factory_propagates() {
        let provider = BasicCellProvider::new(CellTypeId(1), "broken", DirectionMask::FULL, || {
            SimulationObjectSet::new(Vec::new())
        });
        let pos = CellPos::new(BlockPos::default(), Direction::Up);
        assert_eq!(provider.create(pos).unwrap_err(), ObjectSetError::Empty);
    }

    #[test]
    fn edges_are_unique_per_neighbor() {
        let provider = resistor_provider(0, "resistor");
        let mut arena = CellArena::with_key();
        let a = arena.insert(provider.create(CellPos::new(BlockPos::default(), Direction::Up)).unwrap());
        let b = arena.insert(
            provider
                .create(CellPos::new(BlockPos::new(0, 0, 1), Direction::Up))
                .unwrap(),
        );
        let cell = &mut arena[a];
        assert!(cell.add_edge(CellEdge {
            neighbor: b,
            direction: RelativeRotationDirection::Back,
        }));
        assert!(!cell.add_edge(CellEdge {
            neighbor: b,
            direction: RelativeRotationDirection::Front,
        }));
        assert_eq!(cell.edges().len(), 1);
        assert!(cell.remove_edge(b).is_some());
        assert!(cell.remove_edge(b).is_none());
    }

    #[test]
    fn container_reference_is_cleared_on_unload() {
        let provider = resistor_provider(0, "resistor");
        let mut cell = provider
            .create(CellPos::new(BlockPos::default(), Direction::Up))
            .unwrap();
        cell.on_container_loaded(BlockPos::default());
        assert_eq!(cell.container(), Some(BlockPos::default()));
        cell.on_container_unloaded();
        assert_eq!(cell.container(), None);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = CellRegistry::new();
        registry
            .register(Arc::new(resistor_provider(0, "resistor")))
            .unwrap();
        assert_eq!(
            registry.register(Arc::new(resistor_provider(0, "other"))),
            Err(RegistryError::DuplicateType(CellTypeId(0)))
        );
        assert_eq!(
            registry.register(Arc::new(resistor_provider(1, "resistor"))),
            Err(RegistryError::DuplicateName("resistor".into()))
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.by_name("resistor").is_some());
        assert!(registry.provider(CellTypeId(7)).is_err());
    }
}
