//! Cell providers defined by data files.

use cellgrid_core::cell::CellProvider;
use cellgrid_core::id::CellTypeId;
use cellgrid_core::mask::DirectionMask;
use cellgrid_core::object::{ObjectSetError, SimulationObjectSet};
use cellgrid_core::space::RelativeRotationDirection;

use crate::schema::{CellTypeData, ObjectData};

/// A [`CellProvider`] whose policy and objects come from a [`CellTypeData`].
#[derive(Debug, Clone)]
pub struct DataCellProvider {
    type_id: CellTypeId,
    name: String,
    connectable: DirectionMask,
    objects: Vec<ObjectData>,
}

impl DataCellProvider {
    /// Build a provider, rejecting definitions whose object list cannot form
    /// a valid set.
    pub fn new(type_id: CellTypeId, data: CellTypeData) -> Result<Self, ObjectSetError> {
        let provider = Self {
            type_id,
            name: data.name,
            connectable: DirectionMask::of_relatives(&data.connectable),
            objects: data.objects,
        };
        provider.create_objects()?;
        Ok(provider)
    }

    pub fn connectable(&self) -> DirectionMask {
        self.connectable
    }

    pub fn objects(&self) -> &[ObjectData] {
        &self.objects
    }
}

impl CellProvider for DataCellProvider {
    fn type_id(&self) -> CellTypeId {
        self.type_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn create_objects(&self) -> Result<SimulationObjectSet, ObjectSetError> {
        let objects = self
            .objects
            .iter()
            .map(ObjectData::instantiate)
            .collect::<Result<Vec<_>, _>>()?;
        SimulationObjectSet::new(objects)
    }

    fn can_connect_from(&self, direction: RelativeRotationDirection) -> bool {
        self.connectable.has_relative(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_core::object::SimulationObjectType;
    use cellgrid_core::thermal::ThermalError;

    fn data(objects: Vec<ObjectData>) -> CellTypeData {
        CellTypeData {
            name: "test".into(),
            connectable: vec![RelativeRotationDirection::Front, RelativeRotationDirection::Up],
            objects,
        }
    }

    #[test]
    fn provider_follows_definition() {
        let provider = DataCellProvider::new(
            CellTypeId(4),
            data(vec![
                ObjectData::Ground,
                ObjectData::ThermalMass {
                    mass: 1.0,
                    temperature: 300.0,
                    conductance: 1.0,
                },
            ]),
        )
        .unwrap();
        assert_eq!(provider.type_id(), CellTypeId(4));
        assert!(provider.can_connect_from(RelativeRotationDirection::Front));
        assert!(provider.can_connect_from(RelativeRotationDirection::Up));
        assert!(!provider.can_connect_from(RelativeRotationDirection::Back));

        let set = provider.create_objects().unwrap();
        assert!(set.has_object(SimulationObjectType::Electrical));
        assert!(set.has_object(SimulationObjectType::Thermal));
    }

    #[test]
    fn invalid_object_lists_are_rejected() {
        assert_eq!(
            DataCellProvider::new(CellTypeId(0), data(Vec::new())).unwrap_err(),
            ObjectSetError::Empty
        );
        assert_eq!(
            DataCellProvider::new(
                CellTypeId(0),
                data(vec![ObjectData::Ground, ObjectData::Resistor { resistance: 2.0 }])
            )
            .unwrap_err(),
            ObjectSetError::Duplicate(SimulationObjectType::Electrical)
        );
        assert_eq!(
            DataCellProvider::new(
                CellTypeId(0),
                data(vec![ObjectData::ThermalMass {
                    mass: 0.0,
                    temperature: 400.0,
                    conductance: 1.0,
                }])
            )
            .unwrap_err(),
            ObjectSetError::Thermal(ThermalError::InvalidMass)
        );
    }
}
