//! Electrical simulation objects and the circuit boundary.
//!
//! The numeric solver lives outside this crate. Cells only describe topology:
//! each [`ElectricalObject`] registers its components into a [`Circuit`] and
//! then wires their pins to its neighbours' components. [`Netlist`] is the
//! circuit implementation a graph assembles and hands to the solver.
//!
//! # Rebuild protocol
//!
//! Numeric components are not reused across rebuilds. A graph rebuild runs:
//!
//! 1. connections of every object are re-gathered from the cell edges;
//! 2. every object runs [`recreate_components`](ElectricalObject::recreate_components)
//!    then [`register_components`](ElectricalObject::register_components);
//! 3. only then does every object run [`build`](ElectricalObject::build).
//!
//! Building before step 2 finished for the whole graph would wire against
//! components that do not exist yet.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::id::{CellId, ComponentId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by a [`Circuit`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
    #[error("component not found: {0:?}")]
    UnknownComponent(ComponentId),
    #[error("pin {pin} out of range for {component:?} with {pins} pins")]
    PinOutOfRange {
        component: ComponentId,
        pin: usize,
        pins: usize,
    },
}

/// Errors from electrical objects. All of them mean a misconfigured cell type
/// or a broken rebuild order, never a recoverable runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElectricalError {
    #[error("electrical object accepts at most {max} connections")]
    TooManyConnections { max: usize },
    #[error("cell {cell:?} offered no component towards {neighbor:?}")]
    NoOffer { cell: CellId, neighbor: CellId },
    #[error("neighbour {0:?} has no electrical object")]
    MissingNeighbor(CellId),
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}

// ---------------------------------------------------------------------------
// Components and circuits
// ---------------------------------------------------------------------------

/// A numeric circuit component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    /// Two pins, resistance in ohms.
    Resistor { resistance: f64 },
    /// Two pins, potential of pin 1 over pin 0 in volts.
    VoltageSource { potential: f64 },
    /// One pin held at 0 V.
    Ground,
}

impl Component {
    pub fn pin_count(&self) -> usize {
        match self {
            Component::Resistor { .. } | Component::VoltageSource { .. } => 2,
            Component::Ground => 1,
        }
    }
}

/// One pin of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin {
    pub component: ComponentId,
    pub pin: usize,
}

/// A pin-to-pin connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wire {
    pub a: Pin,
    pub b: Pin,
}

/// The circuit aggregate components register into and get wired through.
pub trait Circuit {
    fn add_component(&mut self, component: Component) -> ComponentId;

    fn connect(
        &mut self,
        a: ComponentId,
        a_pin: usize,
        b: ComponentId,
        b_pin: usize,
    ) -> Result<(), CircuitError>;
}

/// Topology of an assembled circuit: components and the wires between their pins.
#[derive(Debug, Default)]
pub struct Netlist {
    components: SlotMap<ComponentId, Component>,
    wires: Vec<Wire>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components.iter()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn check_pin(&self, component: ComponentId, pin: usize) -> Result<(), CircuitError> {
        let pins = self
            .components
            .get(component)
            .ok_or(CircuitError::UnknownComponent(component))?
            .pin_count();
        if pin >= pins {
            return Err(CircuitError::PinOutOfRange {
                component,
                pin,
                pins,
            });
        }
        Ok(())
    }

    /// Group every pin into electrical nets (pins joined by wires).
    /// Each inner vector is sorted; nets are ordered by their first pin.
    pub fn nets(&self) -> Vec<Vec<Pin>> {
        let mut sets = self.pin_sets();
        let mut slots: HashMap<usize, usize> = HashMap::new();
        let mut nets: Vec<Vec<Pin>> = Vec::new();
        for i in 0..sets.pins.len() {
            let root = sets.find(i);
            let pin = sets.pins[i];
            match slots.get(&root) {
                Some(&slot) => nets[slot].push(pin),
                None => {
                    slots.insert(root, nets.len());
                    nets.push(vec![pin]);
                }
            }
        }
        for net in &mut nets {
            net.sort();
        }
        nets.sort();
        nets
    }

    /// True if both pins are on the same net.
    pub fn are_connected(&self, a: Pin, b: Pin) -> bool {
        let mut sets = self.pin_sets();
        match (sets.index.get(&a).copied(), sets.index.get(&b).copied()) {
            (Some(a), Some(b)) => sets.find(a) == sets.find(b),
            _ => false,
        }
    }

    fn pin_sets(&self) -> PinSets {
        let pins: Vec<Pin> = self
            .components
            .iter()
            .flat_map(|(component, c)| (0..c.pin_count()).map(move |pin| Pin { component, pin }))
            .collect();
        let index: HashMap<Pin, usize> = pins.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        let mut sets = PinSets {
            parent: (0..pins.len()).collect(),
            pins,
            index,
        };
        for wire in &self.wires {
            if let (Some(&a), Some(&b)) = (sets.index.get(&wire.a), sets.index.get(&wire.b)) {
                sets.union(a, b);
            }
        }
        sets
    }
}

/// Union-find over the pins of one netlist.
struct PinSets {
    pins: Vec<Pin>,
    index: HashMap<Pin, usize>,
    parent: Vec<usize>,
}

impl PinSets {
    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

impl Circuit for Netlist {
    fn add_component(&mut self, component: Component) -> ComponentId {
        self.components.insert(component)
    }

    fn connect(
        &mut self,
        a: ComponentId,
        a_pin: usize,
        b: ComponentId,
        b_pin: usize,
    ) -> Result<(), CircuitError> {
        self.check_pin(a, a_pin)?;
        self.check_pin(b, b_pin)?;

        let a = Pin {
            component: a,
            pin: a_pin,
        };
        let b = Pin {
            component: b,
            pin: b_pin,
        };
        // Both sides of an edge wire it; keep one copy.
        let duplicate = self
            .wires
            .iter()
            .any(|w| (w.a == a && w.b == b) || (w.a == b && w.b == a));
        if !duplicate {
            self.wires.push(Wire { a, b });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// The neighbours an electrical object is connected to. The position of a
/// neighbour in the list is the pin bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectricalConnections {
    max: usize,
    neighbors: Vec<CellId>,
}

impl ElectricalConnections {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            neighbors: Vec::with_capacity(max),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Record a neighbour. Adding a neighbour already present is a no-op.
    pub fn add(&mut self, neighbor: CellId) -> Result<(), ElectricalError> {
        if self.neighbors.contains(&neighbor) {
            return Ok(());
        }
        if self.neighbors.len() >= self.max {
            return Err(ElectricalError::TooManyConnections { max: self.max });
        }
        self.neighbors.push(neighbor);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.neighbors.clear();
    }

    pub fn index_of(&self, neighbor: CellId) -> Option<usize> {
        self.neighbors.iter().position(|n| *n == neighbor)
    }

    pub fn iter(&self) -> impl Iterator<Item = CellId> + '_ {
        self.neighbors.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ElectricalObject
// ---------------------------------------------------------------------------

/// The component and pin an object binds to one of its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectricalComponentInfo {
    pub component: ComponentId,
    pub pin: usize,
}

/// Resolves the electrical object of a neighbouring cell during a build.
pub trait ElectricalLookup {
    fn electrical(&self, cell: CellId) -> Option<&dyn ElectricalObject>;
}

/// The electrical part of a cell.
pub trait ElectricalObject: fmt::Debug {
    fn connections(&self) -> &ElectricalConnections;

    fn connections_mut(&mut self) -> &mut ElectricalConnections;

    /// Declared connection capacity.
    fn max_connections(&self) -> usize {
        self.connections().max()
    }

    /// The component and pin bound to `neighbor`. Pure; `None` before
    /// registration or for a cell that is not a recorded connection.
    fn offer_component(&self, neighbor: CellId) -> Option<ElectricalComponentInfo>;

    /// Drop handles from the previous circuit and prepare fresh components
    /// from the configured parameters.
    fn recreate_components(&mut self);

    /// Add this object's components to `circuit`.
    fn register_components(&mut self, circuit: &mut dyn Circuit);

    /// Wire every recorded connection. Both sides must be registered.
    fn build(
        &self,
        this: CellId,
        circuit: &mut dyn Circuit,
        lookup: &dyn ElectricalLookup,
    ) -> Result<(), ElectricalError> {
        for neighbor in self.connections().iter() {
            let local = self
                .offer_component(neighbor)
                .ok_or(ElectricalError::NoOffer {
                    cell: this,
                    neighbor,
                })?;
            let remote = lookup
                .electrical(neighbor)
                .ok_or(ElectricalError::MissingNeighbor(neighbor))?
                .offer_component(this)
                .ok_or(ElectricalError::NoOffer {
                    cell: neighbor,
                    neighbor: this,
                })?;
            circuit.connect(local.component, local.pin, remote.component, remote.pin)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resistor
// ---------------------------------------------------------------------------

/// A single resistor. At most two connections, one per pin.
#[derive(Debug, Clone)]
pub struct ResistorObject {
    resistance: f64,
    resistor: Option<ComponentId>,
    connections: ElectricalConnections,
}

impl ResistorObject {
    pub fn new(resistance: f64) -> Self {
        Self {
            resistance,
            resistor: None,
            connections: ElectricalConnections::new(2),
        }
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    /// Takes effect on the next circuit rebuild.
    pub fn set_resistance(&mut self, resistance: f64) {
        self.resistance = resistance;
    }

    pub fn resistor(&self) -> Option<ComponentId> {
        self.resistor
    }
}

impl Default for ResistorObject {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ElectricalObject for ResistorObject {
    fn connections(&self) -> &ElectricalConnections {
        &self.connections
    }

    fn connections_mut(&mut self) -> &mut ElectricalConnections {
        &mut self.connections
    }

    fn offer_component(&self, neighbor: CellId) -> Option<ElectricalComponentInfo> {
        Some(ElectricalComponentInfo {
            component: self.resistor?,
            pin: self.connections.index_of(neighbor)?,
        })
    }

    fn recreate_components(&mut self) {
        self.resistor = None;
    }

    fn register_components(&mut self, circuit: &mut dyn Circuit) {
        self.resistor = Some(circuit.add_component(Component::Resistor {
            resistance: self.resistance,
        }));
    }
}

// ---------------------------------------------------------------------------
// Voltage source
// ---------------------------------------------------------------------------

/// An ideal two-pin voltage source.
#[derive(Debug, Clone)]
pub struct VoltageSourceObject {
    potential: f64,
    source: Option<ComponentId>,
    connections: ElectricalConnections,
}

impl VoltageSourceObject {
    pub fn new(potential: f64) -> Self {
        Self {
            potential,
            source: None,
            connections: ElectricalConnections::new(2),
        }
    }

    pub fn potential(&self) -> f64 {
        self.potential
    }

    /// Takes effect on the next circuit rebuild.
    pub fn set_potential(&mut self, potential: f64) {
        self.potential = potential;
    }
}

impl ElectricalObject for VoltageSourceObject {
    fn connections(&self) -> &ElectricalConnections {
        &self.connections
    }

    fn connections_mut(&mut self) -> &mut ElectricalConnections {
        &mut self.connections
    }

    fn offer_component(&self, neighbor: CellId) -> Option<ElectricalComponentInfo> {
        Some(ElectricalComponentInfo {
            component: self.source?,
            pin: self.connections.index_of(neighbor)?,
        })
    }

    fn recreate_components(&mut self) {
        self.source = None;
    }

    fn register_components(&mut self, circuit: &mut dyn Circuit) {
        self.source = Some(circuit.add_component(Component::VoltageSource {
            potential: self.potential,
        }));
    }
}

// ---------------------------------------------------------------------------
// Ground
// ---------------------------------------------------------------------------

/// A ground reference. Every neighbour binds to its single pin.
#[derive(Debug, Clone)]
pub struct GroundObject {
    ground: Option<ComponentId>,
    connections: ElectricalConnections,
}

impl GroundObject {
    pub fn new() -> Self {
        Self {
            ground: None,
            connections: ElectricalConnections::new(4),
        }
    }
}

impl Default for GroundObject {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectricalObject for GroundObject {
    fn connections(&self) -> &ElectricalConnections {
        &self.connections
    }

    fn connections_mut(&mut self) -> &mut ElectricalConnections {
        &mut self.connections
    }

    fn offer_component(&self, neighbor: CellId) -> Option<ElectricalComponentInfo> {
        self.connections.index_of(neighbor)?;
        Some(ElectricalComponentInfo {
            component: self.ground?,
            pin: 0,
        })
    }

    fn recreate_components(&mut self) {
        self.ground = None;
    }

    fn register_components(&mut self, circuit: &mut dyn Circuit) {
        self.ground = Some(circuit.add_component(Component::Ground));
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::collections::HashMap;

    fn cell_ids(count: usize) -> Vec<CellId> {
        let mut sm = SlotMap::<CellId, ()>::with_key();
        (0..count).map(|_| sm.insert(())).collect()
    }

    struct Lookup<'a>(HashMap<CellId, &'a dyn ElectricalObject>);

    impl ElectricalLookup for Lookup<'_> {
        fn electrical(&self, cell: CellId) -> Option<&dyn ElectricalObject> {
            self.0.get(&cell).copied()
        }
    }

    #[test]
    fn connections_enforce_capacity() {
        let ids = cell_ids(3);
        let mut connections = ElectricalConnections::new(2);
        connections.add(ids[0]).unwrap();
        connections.add(ids[1]).unwrap();
        assert_eq!(
            connections.add(ids[2]),
            Err(ElectricalError::TooManyConnections { max: 2 })
        );
        // Re-adding a known neighbour is not a new connection.
        assert!(connections.add(ids[0]).is_ok());
        assert_eq!(connections.len(), 2);
        assert_eq!(connections.index_of(ids[1]), Some(1));
    }

    #[test]
    fn offer_requires_registration_and_connection() {
        let ids = cell_ids(2);
        let mut resistor = ResistorObject::new(10.0);
        resistor.connections_mut().add(ids[1]).unwrap();
        assert_eq!(resistor.offer_component(ids[1]), None);

        let mut netlist = Netlist::new();
        resistor.recreate_components();
        resistor.register_components(&mut netlist);
        let offer = resistor.offer_component(ids[1]).unwrap();
        assert_eq!(offer.pin, 0);
        assert_eq!(resistor.offer_component(ids[1]), Some(offer));
        assert_eq!(resistor.offer_component(ids[0]), None);
        assert_eq!(
            netlist.component(offer.component),
            Some(&Component::Resistor { resistance: 10.0 })
        );
    }

    #[test]
    fn recreate_drops_stale_handles() {
        let mut resistor = ResistorObject::default();
        let mut netlist = Netlist::new();
        resistor.register_components(&mut netlist);
        assert!(resistor.resistor().is_some());
        resistor.recreate_components();
        assert!(resistor.resistor().is_none());
    }

    #[test]
    fn build_wires_two_resistors() {
        let ids = cell_ids(2);
        let mut a = ResistorObject::new(1.0);
        let mut b = ResistorObject::new(2.0);
        a.connections_mut().add(ids[1]).unwrap();
        b.connections_mut().add(ids[0]).unwrap();

        let mut netlist = Netlist::new();
        for obj in [&mut a as &mut dyn ElectricalObject, &mut b] {
            obj.recreate_components();
            obj.register_components(&mut netlist);
        }

        let lookup = Lookup(HashMap::from([
            (ids[0], &a as &dyn ElectricalObject),
            (ids[1], &b as &dyn ElectricalObject),
        ]));
        a.build(ids[0], &mut netlist, &lookup).unwrap();
        b.build(ids[1], &mut netlist, &lookup).unwrap();

        assert_eq!(netlist.component_count(), 2);
        assert_eq!(netlist.wires().len(), 1, "both sides wire the same edge once");
        let pa = Pin {
            component: a.resistor().unwrap(),
            pin: 0,
        };
        let pb = Pin {
            component: b.resistor().unwrap(),
            pin: 0,
        };
        assert!(netlist.are_connected(pa, pb));
        assert!(!netlist.are_connected(pa, Pin { pin: 1, ..pa }));
        assert!(!netlist.are_connected(pa, Pin { pin: 7, ..pb }), "unknown pin");
        // 4 pins, one wire: 3 nets.
        assert_eq!(netlist.nets().len(), 3);
    }

    #[test]
    fn build_before_neighbor_registration_fails() {
        let ids = cell_ids(2);
        let mut a = ResistorObject::new(1.0);
        let mut b = ResistorObject::new(1.0);
        a.connections_mut().add(ids[1]).unwrap();
        b.connections_mut().add(ids[0]).unwrap();

        let mut netlist = Netlist::new();
        a.register_components(&mut netlist);

        let lookup = Lookup(HashMap::from([(ids[1], &b as &dyn ElectricalObject)]));
        assert_eq!(
            a.build(ids[0], &mut netlist, &lookup),
            Err(ElectricalError::NoOffer {
                cell: ids[1],
                neighbor: ids[0]
            })
        );
        assert!(netlist.wires().is_empty());
    }

    #[test]
    fn ground_binds_every_neighbor_to_pin_zero() {
        let ids = cell_ids(3);
        let mut ground = GroundObject::new();
        ground.connections_mut().add(ids[1]).unwrap();
        ground.connections_mut().add(ids[2]).unwrap();
        let mut netlist = Netlist::new();
        ground.register_components(&mut netlist);
        assert_eq!(ground.offer_component(ids[2]).map(|o| o.pin), Some(0));
        assert_eq!(ground.offer_component(ids[0]), None);
    }

    #[test]
    fn netlist_rejects_bad_pins() {
        let mut netlist = Netlist::new();
        let ground = netlist.add_component(Component::Ground);
        let source = netlist.add_component(Component::VoltageSource { potential: 5.0 });
        assert_eq!(
            netlist.connect(ground, 1, source, 0),
            Err(CircuitError::PinOutOfRange {
                component: ground,
                pin: 1,
                pins: 1
            })
        );
        assert!(netlist.connect(ground, 0, source, 0).is_ok());
    }
}
