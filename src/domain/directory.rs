use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::meter::{MeterReading, MeterRole};
use super::types::{BuildingId, MeterId};

/// Building record as provided by the building directory collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    #[serde(default)]
    pub name: String,
    /// A group building represents a complex; its members are listed in `group_buildings`
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub group_buildings: Vec<BuildingId>,
}

impl Building {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: BuildingId::new(id),
            name: name.into(),
            is_group: false,
            group_buildings: Vec::new(),
        }
    }

    pub fn complex(id: impl Into<String>, name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            id: BuildingId::new(id),
            name: name.into(),
            is_group: true,
            group_buildings: members.iter().map(|m| BuildingId::from(*m)).collect(),
        }
    }
}

/// Read-only view over buildings and complex membership
#[derive(Debug, Clone, Default)]
pub struct BuildingDirectory {
    buildings: Vec<Building>,
}

impl BuildingDirectory {
    pub fn new(buildings: Vec<Building>) -> Self {
        Self { buildings }
    }

    pub fn get(&self, id: &BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| &b.id == id)
    }

    /// Buildings that carry meters (everything that is not a group)
    pub fn physical_buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.iter().filter(|b| !b.is_group)
    }

    /// The first complex whose membership lists `id`
    pub fn complex_of(&self, id: &BuildingId) -> Option<&Building> {
        self.buildings
            .iter()
            .find(|b| b.is_group && b.group_buildings.contains(id))
    }

    /// Other members of the building's complex, in membership order
    ///
    /// Returns an empty list for buildings outside any complex.
    pub fn siblings_of(&self, id: &BuildingId) -> Vec<BuildingId> {
        let Some(complex) = self.complex_of(id) else {
            return Vec::new();
        };

        let mut siblings: Vec<BuildingId> = Vec::with_capacity(complex.group_buildings.len());
        for member in &complex.group_buildings {
            if member != id && !siblings.contains(member) {
                siblings.push(member.clone());
            }
        }
        siblings
    }
}

/// Meter record as provided by the meter directory collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterInfo {
    pub meter_id: MeterId,
    pub building_id: BuildingId,
    pub role: MeterRole,
}

/// `meter_id -> (building_id, role)` lookup used to pre-filter readings
#[derive(Debug, Clone, Default)]
pub struct MeterDirectory {
    meters: HashMap<MeterId, MeterInfo>,
}

impl MeterDirectory {
    pub fn new(meters: impl IntoIterator<Item = MeterInfo>) -> Self {
        Self {
            meters: meters
                .into_iter()
                .map(|m| (m.meter_id.clone(), m))
                .collect(),
        }
    }

    pub fn get(&self, meter_id: &MeterId) -> Option<&MeterInfo> {
        self.meters.get(meter_id)
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Readings that belong to `building`, with building and role taken from the directory
    ///
    /// Readings from meters the directory does not know are dropped.
    pub fn readings_for(&self, building: &BuildingId, readings: &[MeterReading]) -> Vec<MeterReading> {
        readings
            .iter()
            .filter_map(|r| {
                let info = self.meters.get(&r.meter_id)?;
                if &info.building_id != building {
                    return None;
                }
                let mut reading = r.clone();
                reading.building_id = info.building_id.clone();
                reading.role = info.role;
                Some(reading)
            })
            .collect()
    }
}
