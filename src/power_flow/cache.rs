use parking_lot::RwLock;
use std::collections::HashMap;

use super::model::{decompose, FlowResult};
use super::snapshot::BuildingSnapshot;
use crate::domain::BuildingId;

/// Exact bit pattern of a snapshot plus the charging argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlowKey {
    building_id: BuildingId,
    snapshot_bits: [u64; 5],
    charging_bits: u64,
}

impl FlowKey {
    fn new(building_id: &BuildingId, snapshot: &BuildingSnapshot, charging_kw: f64) -> Self {
        Self {
            building_id: building_id.clone(),
            snapshot_bits: [
                snapshot.total_import_kw.to_bits(),
                snapshot.total_export_kw.to_bits(),
                snapshot.solar_import_kw.to_bits(),
                snapshot.solar_export_kw.to_bits(),
                snapshot.charging_kw.to_bits(),
            ],
            charging_bits: charging_kw.to_bits(),
        }
    }
}

/// Memoised decompositions for one sampling instant
///
/// `decompose` is pure, so a hit returns exactly what a fresh call would.
#[derive(Debug, Default)]
pub struct FlowCache {
    entries: RwLock<HashMap<FlowKey, FlowResult>>,
}

impl FlowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_decompose(
        &self,
        building_id: &BuildingId,
        snapshot: &BuildingSnapshot,
        charging_kw: f64,
    ) -> FlowResult {
        let key = FlowKey::new(building_id, snapshot, charging_kw);
        if let Some(hit) = self.entries.read().get(&key) {
            return *hit;
        }

        let flow = decompose(snapshot, charging_kw);
        self.entries.write().insert(key, flow);
        flow
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
