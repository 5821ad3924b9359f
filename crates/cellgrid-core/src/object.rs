//! Per-cell simulation objects, one per simulation domain.
//!
//! The set of domains is closed. A [`SimulationObjectSet`] holds at most one
//! object per domain and is fixed once constructed.

use serde::{Deserialize, Serialize};

use crate::electrical::ElectricalObject;
use crate::thermal::{ThermalError, ThermalObject};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Misconfigured object sets. These are programmer errors in a cell type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectSetError {
    #[error("tried to create an empty simulation object set")]
    Empty,
    #[error("duplicate {0:?} object in simulation object set")]
    Duplicate(SimulationObjectType),
    #[error("tried to get {0:?} object that was never registered")]
    Missing(SimulationObjectType),
    #[error(transparent)]
    Thermal(#[from] ThermalError),
}

// ---------------------------------------------------------------------------
// Types and masks
// ---------------------------------------------------------------------------

/// A simulation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationObjectType {
    Electrical,
    Thermal,
}

impl SimulationObjectType {
    /// Every domain, in processing order.
    pub const ALL: [SimulationObjectType; 2] =
        [SimulationObjectType::Electrical, SimulationObjectType::Thermal];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A set of simulation domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SimulationObjectMask(u8);

impl SimulationObjectMask {
    pub const EMPTY: SimulationObjectMask = SimulationObjectMask(0);

    pub const fn of(object_type: SimulationObjectType) -> Self {
        SimulationObjectMask(object_type.bit())
    }

    pub const fn has_flag(self, object_type: SimulationObjectType) -> bool {
        self.0 & object_type.bit() != 0
    }

    pub const fn plus(self, object_type: SimulationObjectType) -> Self {
        SimulationObjectMask(self.0 | object_type.bit())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Domains in this mask, in processing order.
    pub fn iter(self) -> impl Iterator<Item = SimulationObjectType> {
        SimulationObjectType::ALL
            .into_iter()
            .filter(move |t| self.has_flag(*t))
    }
}

// ---------------------------------------------------------------------------
// SimulationObject
// ---------------------------------------------------------------------------

/// A simulation object tagged with its domain.
#[derive(Debug)]
pub enum SimulationObject {
    Electrical(Box<dyn ElectricalObject>),
    Thermal(Box<dyn ThermalObject>),
}

impl SimulationObject {
    pub fn electrical(object: impl ElectricalObject + 'static) -> Self {
        SimulationObject::Electrical(Box::new(object))
    }

    pub fn thermal(object: impl ThermalObject + 'static) -> Self {
        SimulationObject::Thermal(Box::new(object))
    }

    pub fn object_type(&self) -> SimulationObjectType {
        match self {
            SimulationObject::Electrical(_) => SimulationObjectType::Electrical,
            SimulationObject::Thermal(_) => SimulationObjectType::Thermal,
        }
    }
}

/// Borrowed view of one present object, handed to [`SimulationObjectSet::process`].
#[derive(Debug)]
pub enum SimulationObjectRef<'a> {
    Electrical(&'a dyn ElectricalObject),
    Thermal(&'a dyn ThermalObject),
}

/// Mutable view of one present object, handed to [`SimulationObjectSet::process_mut`].
#[derive(Debug)]
pub enum SimulationObjectMut<'a> {
    Electrical(&'a mut dyn ElectricalObject),
    Thermal(&'a mut dyn ThermalObject),
}

// ---------------------------------------------------------------------------
// SimulationObjectSet
// ---------------------------------------------------------------------------

/// The simulation objects of one cell, at most one per domain.
#[derive(Debug)]
pub struct SimulationObjectSet {
    electrical: Option<Box<dyn ElectricalObject>>,
    thermal: Option<Box<dyn ThermalObject>>,
    mask: SimulationObjectMask,
}

impl SimulationObjectSet {
    pub fn new(objects: Vec<SimulationObject>) -> Result<Self, ObjectSetError> {
        if objects.is_empty() {
            return Err(ObjectSetError::Empty);
        }

        let mut set = SimulationObjectSet {
            electrical: None,
            thermal: None,
            mask: SimulationObjectMask::EMPTY,
        };

        for object in objects {
            let object_type = object.object_type();
            if set.mask.has_flag(object_type) {
                return Err(ObjectSetError::Duplicate(object_type));
            }
            match object {
                SimulationObject::Electrical(obj) => set.electrical = Some(obj),
                SimulationObject::Thermal(obj) => set.thermal = Some(obj),
            }
            set.mask = set.mask.plus(object_type);
        }

        Ok(set)
    }

    /// A set holding a single object.
    pub fn single(object: SimulationObject) -> Self {
        let mask = SimulationObjectMask::of(object.object_type());
        let (electrical, thermal) = match object {
            SimulationObject::Electrical(obj) => (Some(obj), None),
            SimulationObject::Thermal(obj) => (None, Some(obj)),
        };
        SimulationObjectSet {
            electrical,
            thermal,
            mask,
        }
    }

    pub fn mask(&self) -> SimulationObjectMask {
        self.mask
    }

    pub fn has_object(&self, object_type: SimulationObjectType) -> bool {
        self.mask.has_flag(object_type)
    }

    pub fn object(
        &self,
        object_type: SimulationObjectType,
    ) -> Result<SimulationObjectRef<'_>, ObjectSetError> {
        match object_type {
            SimulationObjectType::Electrical => {
                self.electrical().map(SimulationObjectRef::Electrical)
            }
            SimulationObjectType::Thermal => self.thermal().map(SimulationObjectRef::Thermal),
        }
    }

    pub fn electrical(&self) -> Result<&dyn ElectricalObject, ObjectSetError> {
        self.electrical
            .as_deref()
            .ok_or(ObjectSetError::Missing(SimulationObjectType::Electrical))
    }

    pub fn electrical_mut(&mut self) -> Result<&mut dyn ElectricalObject, ObjectSetError> {
        match self.electrical.as_mut() {
            Some(obj) => {
                let obj: &mut dyn ElectricalObject = obj.as_mut();
                Ok(obj)
            }
            None => Err(ObjectSetError::Missing(SimulationObjectType::Electrical)),
        }
    }

    pub fn thermal(&self) -> Result<&dyn ThermalObject, ObjectSetError> {
        self.thermal
            .as_deref()
            .ok_or(ObjectSetError::Missing(SimulationObjectType::Thermal))
    }

    pub fn thermal_mut(&mut self) -> Result<&mut dyn ThermalObject, ObjectSetError> {
        match self.thermal.as_mut() {
            Some(obj) => {
                let obj: &mut dyn ThermalObject = obj.as_mut();
                Ok(obj)
            }
            None => Err(ObjectSetError::Missing(SimulationObjectType::Thermal)),
        }
    }

    /// Visit every present object in processing order.
    pub fn process(&self, mut f: impl FnMut(SimulationObjectRef<'_>)) {
        if let Some(obj) = self.electrical.as_deref() {
            f(SimulationObjectRef::Electrical(obj));
        }
        if let Some(obj) = self.thermal.as_deref() {
            f(SimulationObjectRef::Thermal(obj));
        }
    }

    /// Visit every present object mutably, in processing order. Stops at the
    /// first error.
    pub fn process_mut<E>(
        &mut self,
        mut f: impl FnMut(SimulationObjectMut<'_>) -> Result<(), E>,
    ) -> Result<(), E> {
        if let Some(obj) = self.electrical.as_mut() {
            let obj: &mut dyn ElectricalObject = obj.as_mut();
            f(SimulationObjectMut::Electrical(obj))?;
        }
        if let Some(obj) = self.thermal.as_mut() {
            let obj: &mut dyn ThermalObject = obj.as_mut();
            f(SimulationObjectMut::Thermal(obj))?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electrical::{GroundObject, ResistorObject};
    use crate::thermal::{ThermalBody, ThermalMassObject};

    fn thermal_mass() -> ThermalMassObject {
        ThermalMassObject::new(ThermalBody {
            mass: 1.0,
            temperature: 293.0,
            conductance: 1.0,
        })
        .unwrap()
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(
            SimulationObjectSet::new(Vec::new()).unwrap_err(),
            ObjectSetError::Empty
        );
    }

    #[test]
    fn duplicate_electrical_is_rejected() {
        let err = SimulationObjectSet::new(vec![
            SimulationObject::electrical(ResistorObject::default()),
            SimulationObject::electrical(GroundObject::new()),
        ])
        .unwrap_err();
        assert_eq!(err, ObjectSetError::Duplicate(SimulationObjectType::Electrical));
    }

    #[test]
    fn missing_domain_is_reported() {
        let set =
            SimulationObjectSet::new(vec![SimulationObject::electrical(ResistorObject::default())])
                .unwrap();
        assert!(set.has_object(SimulationObjectType::Electrical));
        assert!(!set.has_object(SimulationObjectType::Thermal));
        assert!(set.electrical().is_ok());
        assert_eq!(
            set.thermal().unwrap_err(),
            ObjectSetError::Missing(SimulationObjectType::Thermal)
        );
        assert!(set.object(SimulationObjectType::Thermal).is_err());
    }

    #[test]
    fn process_visits_in_domain_order() {
        let set = SimulationObjectSet::new(vec![
            SimulationObject::thermal(thermal_mass()),
            SimulationObject::electrical(ResistorObject::default()),
        ])
        .unwrap();

        let mut visited = Vec::new();
        set.process(|obj| {
            visited.push(match obj {
                SimulationObjectRef::Electrical(_) => SimulationObjectType::Electrical,
                SimulationObjectRef::Thermal(_) => SimulationObjectType::Thermal,
            })
        });
        assert_eq!(visited, SimulationObjectType::ALL.to_vec());
        assert_eq!(set.mask().iter().collect::<Vec<_>>(), visited);
    }

    #[test]
    fn process_skips_absent_domains() {
        let mut set = SimulationObjectSet::single(SimulationObject::thermal(thermal_mass()));
        let mut count = 0;
        set.process_mut(|obj| {
            if let SimulationObjectMut::Thermal(t) = obj {
                t.body_mut().temperature = 500.0;
            }
            count += 1;
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(set.thermal().unwrap().body().temperature, 500.0);
    }
}
