//! Thermal simulation objects.
//!
//! Each thermal object owns one lumped body. Bodies of connected cells
//! exchange heat once per graph step across every thermal edge.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::CellId;

/// A thermal body whose parameters cannot be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ThermalError {
    #[error("thermal mass must be positive and finite")]
    InvalidMass,
    #[error("temperature must be finite and not below 0 K")]
    InvalidTemperature,
    #[error("conductance must be finite and not negative")]
    InvalidConductance,
}

/// A lumped thermal mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalBody {
    /// Heat capacity in J/K. Must be positive.
    pub mass: f64,
    /// Temperature in kelvin.
    pub temperature: f64,
    /// Conductance towards a neighbour in W/K.
    pub conductance: f64,
}

impl ThermalBody {
    pub fn validate(&self) -> Result<(), ThermalError> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(ThermalError::InvalidMass);
        }
        if !(self.temperature.is_finite() && self.temperature >= 0.0) {
            return Err(ThermalError::InvalidTemperature);
        }
        if !(self.conductance.is_finite() && self.conductance >= 0.0) {
            return Err(ThermalError::InvalidConductance);
        }
        Ok(())
    }

    /// Stored energy relative to 0 K.
    pub fn energy(&self) -> f64 {
        self.mass * self.temperature
    }
}

/// The thermal part of a cell.
pub trait ThermalObject: fmt::Debug {
    fn body(&self) -> &ThermalBody;

    fn body_mut(&mut self) -> &mut ThermalBody;

    /// Cells this body exchanges heat with. Re-gathered on every rebuild.
    fn neighbors(&self) -> &[CellId];

    fn neighbors_mut(&mut self) -> &mut Vec<CellId>;
}

/// A plain thermal mass.
#[derive(Debug, Clone)]
pub struct ThermalMassObject {
    body: ThermalBody,
    neighbors: Vec<CellId>,
}

impl ThermalMassObject {
    pub fn new(body: ThermalBody) -> Result<Self, ThermalError> {
        body.validate()?;
        Ok(Self {
            body,
            neighbors: Vec::new(),
        })
    }
}

impl ThermalObject for ThermalMassObject {
    fn body(&self) -> &ThermalBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut ThermalBody {
        &mut self.body
    }

    fn neighbors(&self) -> &[CellId] {
        &self.neighbors
    }

    fn neighbors_mut(&mut self) -> &mut Vec<CellId> {
        &mut self.neighbors
    }
}

// ---------------------------------------------------------------------------
// ThermalNetwork
// ---------------------------------------------------------------------------

/// Access to the thermal bodies of a graph's cells.
pub trait ThermalBodies {
    fn body(&self, cell: CellId) -> Option<&ThermalBody>;
    fn body_mut(&mut self, cell: CellId) -> Option<&mut ThermalBody>;
}

/// Undirected heat-exchange edges of one graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThermalNetwork {
    edges: Vec<(CellId, CellId)>,
}

impl ThermalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge. Either orientation of an existing edge is ignored.
    pub fn add_edge(&mut self, a: CellId, b: CellId) {
        let edge = if a <= b { (a, b) } else { (b, a) };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn edges(&self) -> &[(CellId, CellId)] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Exchange heat across every edge for `dt` seconds.
    ///
    /// Flows are computed from the temperatures at the start of the step and
    /// applied together, so total energy is conserved. An edge transfers at
    /// most its equalising heat divided by the larger edge count of its two
    /// bodies, so no body moves past the temperatures of all its neighbours.
    pub fn step(&self, dt: f64, bodies: &mut dyn ThermalBodies) {
        let mut degree: HashMap<CellId, usize> = HashMap::new();
        for &(a, b) in &self.edges {
            *degree.entry(a).or_default() += 1;
            *degree.entry(b).or_default() += 1;
        }

        let mut flows = Vec::with_capacity(self.edges.len());
        for &(a, b) in &self.edges {
            let (Some(body_a), Some(body_b)) = (bodies.body(a), bodies.body(b)) else {
                continue;
            };
            let delta = body_a.temperature - body_b.temperature;
            let conductance = body_a.conductance.min(body_b.conductance);
            let heat = conductance * delta * dt;
            let count = |id| degree.get(&id).copied().unwrap_or(1);
            let shared = count(a).max(count(b)) as f64;
            let equalising =
                delta * body_a.mass * body_b.mass / (body_a.mass + body_b.mass) / shared;
            let heat = if heat.abs() > equalising.abs() {
                equalising
            } else {
                heat
            };
            flows.push((a, b, heat));
        }

        for (a, b, heat) in flows {
            if let Some(body) = bodies.body_mut(a) {
                body.temperature -= heat / body.mass;
            }
            if let Some(body) = bodies.body_mut(b) {
                body.temperature += heat / body.mass;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::collections::HashMap;

    struct Bodies(HashMap<CellId, ThermalBody>);

    impl ThermalBodies for Bodies {
        fn body(&self, cell: CellId) -> Option<&ThermalBody> {
            self.0.get(&cell)
        }

        fn body_mut(&mut self, cell: CellId) -> Option<&mut ThermalBody> {
            self.0.get_mut(&cell)
        }
    }

    fn body(mass: f64, temperature: f64) -> ThermalBody {
        ThermalBody {
            mass,
            temperature,
            conductance: 10.0,
        }
    }

    #[test]
    fn edges_are_deduplicated() {
        let mut sm = SlotMap::<CellId, ()>::with_key();
        let (a, b) = (sm.insert(()), sm.insert(()));
        let mut network = ThermalNetwork::new();
        network.add_edge(a, b);
        network.add_edge(b, a);
        assert_eq!(network.edges().len(), 1);
    }

    #[test]
    fn heat_flows_hot_to_cold_and_conserves_energy() {
        let mut sm = SlotMap::<CellId, ()>::with_key();
        let (a, b) = (sm.insert(()), sm.insert(()));
        let mut bodies = Bodies(HashMap::from([(a, body(100.0, 400.0)), (b, body(50.0, 300.0))]));
        let before = bodies.0.values().map(ThermalBody::energy).sum::<f64>();

        let mut network = ThermalNetwork::new();
        network.add_edge(a, b);
        network.step(0.05, &mut bodies);

        assert!(bodies.0[&a].temperature < 400.0);
        assert!(bodies.0[&b].temperature > 300.0);
        let after = bodies.0.values().map(ThermalBody::energy).sum::<f64>();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn invalid_bodies_are_rejected() {
        assert_eq!(
            ThermalMassObject::new(body(0.0, 400.0)).unwrap_err(),
            ThermalError::InvalidMass
        );
        assert_eq!(
            ThermalMassObject::new(body(-1.0, 400.0)).unwrap_err(),
            ThermalError::InvalidMass
        );
        assert_eq!(
            ThermalMassObject::new(body(f64::NAN, 400.0)).unwrap_err(),
            ThermalError::InvalidMass
        );
        assert_eq!(
            ThermalMassObject::new(body(1.0, f64::INFINITY)).unwrap_err(),
            ThermalError::InvalidTemperature
        );
        let leaky = ThermalBody {
            conductance: -2.0,
            ..body(1.0, 300.0)
        };
        assert_eq!(leaky.validate(), Err(ThermalError::InvalidConductance));
        assert!(ThermalMassObject::new(body(1.0, 300.0)).is_ok());
    }

    #[test]
    fn light_body_with_many_neighbours_does_not_overshoot() {
        let mut sm = SlotMap::<CellId, ()>::with_key();
        let (hot, left, right) = (sm.insert(()), sm.insert(()), sm.insert(()));
        let mut bodies = Bodies(HashMap::from([
            (hot, body(1.0, 400.0)),
            (left, body(1.0, 300.0)),
            (right, body(1.0, 300.0)),
        ]));

        let mut network = ThermalNetwork::new();
        network.add_edge(hot, left);
        network.add_edge(hot, right);
        network.step(1000.0, &mut bodies);

        let t = |id| bodies.0[&id].temperature;
        assert!(t(hot) >= t(left));
        assert!(t(hot) >= t(right));
        assert!((t(hot) + t(left) + t(right) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn large_step_does_not_overshoot() {
        let mut sm = SlotMap::<CellId, ()>::with_key();
        let (a, b) = (sm.insert(()), sm.insert(()));
        let mut bodies = Bodies(HashMap::from([(a, body(1.0, 400.0)), (b, body(1.0, 300.0))]));

        let mut network = ThermalNetwork::new();
        network.add_edge(a, b);
        network.step(1000.0, &mut bodies);

        assert!((bodies.0[&a].temperature - 350.0).abs() < 1e-9);
        assert!((bodies.0[&b].temperature - 350.0).abs() < 1e-9);
    }
}
