//! Serde data file structs for cell type definitions.
//!
//! These structs define the on-disk format of `cells.{ron,toml,json}`. They
//! are deserialized by the loader and turned into
//! [`DataCellProvider`](crate::provider::DataCellProvider)s.

use cellgrid_core::electrical::{GroundObject, ResistorObject, VoltageSourceObject};
use cellgrid_core::object::SimulationObject;
use cellgrid_core::space::RelativeRotationDirection;
use cellgrid_core::thermal::{ThermalBody, ThermalError, ThermalMassObject};
use serde::Deserialize;

/// A cell type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct CellTypeData {
    pub name: String,
    /// Relative sides accepting connections. Empty means the cell never
    /// connects.
    #[serde(default)]
    pub connectable: Vec<RelativeRotationDirection>,
    pub objects: Vec<ObjectData>,
}

/// One simulation object of a cell type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum ObjectData {
    Resistor {
        #[serde(default = "default_resistance")]
        resistance: f64,
    },
    VoltageSource {
        potential: f64,
    },
    Ground,
    ThermalMass {
        mass: f64,
        #[serde(default = "default_temperature")]
        temperature: f64,
        conductance: f64,
    },
}

fn default_resistance() -> f64 {
    1.0
}

/// Room temperature in kelvin.
fn default_temperature() -> f64 {
    293.15
}

impl ObjectData {
    /// A fresh simulation object with these parameters. Thermal parameters
    /// are validated here.
    pub fn instantiate(&self) -> Result<SimulationObject, ThermalError> {
        let object = match *self {
            ObjectData::Resistor { resistance } => {
                SimulationObject::electrical(ResistorObject::new(resistance))
            }
            ObjectData::VoltageSource { potential } => {
                SimulationObject::electrical(VoltageSourceObject::new(potential))
            }
            ObjectData::Ground => SimulationObject::electrical(GroundObject::new()),
            ObjectData::ThermalMass {
                mass,
                temperature,
                conductance,
            } => SimulationObject::thermal(ThermalMassObject::new(ThermalBody {
                mass,
                temperature,
                conductance,
            })?),
        };
        Ok(object)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
