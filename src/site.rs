//! Site files: building directory, meter directory and raw readings in one JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{
    Building, BuildingDirectory, MeterDirectory, MeterId, MeterInfo, MeterReading, SourceTag,
};
use crate::error::FlowError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFile {
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default)]
    pub meters: Vec<MeterInfo>,
    #[serde(default)]
    pub readings: Vec<MeterReading>,
}

impl SiteFile {
    pub async fn load(path: &Path) -> Result<Self, FlowError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| FlowError::SiteIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| FlowError::SiteParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn building_directory(&self) -> BuildingDirectory {
        BuildingDirectory::new(self.buildings.clone())
    }

    pub fn meter_directory(&self) -> MeterDirectory {
        MeterDirectory::new(self.meters.clone())
    }
}

/// Latest sample per meter and direction, plus the newest timestamp among them
///
/// Meters are sampled independently, so "the current instant" is the newest
/// sample of each meter side. Returns `None` for an empty list.
pub fn latest_per_meter(readings: &[MeterReading]) -> Option<(DateTime<Utc>, Vec<MeterReading>)> {
    let mut latest: HashMap<(&MeterId, SourceTag), &MeterReading> = HashMap::new();
    let mut order: Vec<(&MeterId, SourceTag)> = Vec::new();

    for reading in readings {
        let key = (&reading.meter_id, reading.source_tag);
        let newer = latest
            .get(&key)
            .map(|existing| reading.timestamp > existing.timestamp);
        match newer {
            Some(false) => {}
            Some(true) => {
                latest.insert(key, reading);
            }
            None => {
                order.push(key);
                latest.insert(key, reading);
            }
        }
    }

    let selected: Vec<MeterReading> = order
        .iter()
        .filter_map(|key| latest.get(key).map(|r| (*r).clone()))
        .collect();
    let instant = selected.iter().map(|r| r.timestamp).max()?;
    Some((instant, selected))
}
