use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use super::snapshot::{aggregate, BuildingSnapshot};
use crate::domain::{MeterId, MeterReading, MeterRole, SourceTag};

/// Canonical per-meter record for one sampling instant
///
/// The import and export samples of a bidirectional meter are folded into one
/// record; a missing side is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub meter_id: MeterId,
    pub role: MeterRole,
    pub import_kw: f64,
    pub export_kw: f64,
}

impl NormalizedReading {
    fn empty(meter_id: MeterId, role: MeterRole) -> Self {
        Self {
            meter_id,
            role,
            import_kw: 0.0,
            export_kw: 0.0,
        }
    }

    /// Net power through the meter (positive = import)
    pub fn net_import_kw(&self) -> f64 {
        self.import_kw - self.export_kw
    }
}

/// Fold raw samples into one record per meter, in order of first appearance
///
/// Unusable samples (negative or non-finite) count as missing and add nothing.
/// Chargers have no export direction, so every charger sample is import.
pub fn normalize_meters(readings: &[MeterReading]) -> Vec<NormalizedReading> {
    let mut records: Vec<NormalizedReading> = Vec::new();
    let mut index: HashMap<&MeterId, usize> = HashMap::new();

    for reading in readings {
        let slot = *index.entry(&reading.meter_id).or_insert_with(|| {
            records.push(NormalizedReading::empty(reading.meter_id.clone(), reading.role));
            records.len() - 1
        });

        let power = reading.power();
        if !power.is_usable_sample() {
            trace!(
                meter_id = %reading.meter_id,
                power_w = reading.power_w,
                "dropping unusable sample"
            );
            continue;
        }

        let record = &mut records[slot];
        let kw = power.as_kilowatts();
        match (reading.role.is_bidirectional(), reading.source_tag) {
            (true, SourceTag::Export) => record.export_kw += kw,
            _ => record.import_kw += kw,
        }
    }

    records
}

/// Normalize one building's readings for one instant into its snapshot
pub fn normalize(readings: &[MeterReading]) -> BuildingSnapshot {
    aggregate(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(meter: &str, role: MeterRole, power_w: f64, tag: SourceTag) -> MeterReading {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        MeterReading::new(meter, "b1", role, power_w, tag, ts)
    }

    #[test]
    fn test_pairs_import_and_export_of_one_meter() {
        let records = normalize_meters(&[
            reading("grid", MeterRole::TotalGrid, 1200.0, SourceTag::Import),
            reading("pv", MeterRole::Solar, 3000.0, SourceTag::Export),
            reading("grid", MeterRole::TotalGrid, 200.0, SourceTag::Export),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].meter_id, MeterId::from("grid"));
        assert_eq!(records[0].import_kw, 1.2);
        assert_eq!(records[0].export_kw, 0.2);
        assert!((records[0].net_import_kw() - 1.0).abs() < 1e-12);
        assert_eq!(records[1].import_kw, 0.0);
        assert_eq!(records[1].export_kw, 3.0);
    }

    #[test]
    fn test_charger_export_tag_counts_as_import() {
        let records = normalize_meters(&[reading(
            "evse",
            MeterRole::Charger,
            7400.0,
            SourceTag::Export,
        )]);
        assert_eq!(records[0].import_kw, 7.4);
        assert_eq!(records[0].export_kw, 0.0);
    }

    #[test]
    fn test_unusable_samples_contribute_zero() {
        let records = normalize_meters(&[
            reading("grid", MeterRole::TotalGrid, f64::NAN, SourceTag::Import),
            reading("grid", MeterRole::TotalGrid, -300.0, SourceTag::Export),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].import_kw, 0.0);
        assert_eq!(records[0].export_kw, 0.0);
    }

    #[test]
    fn test_normalize_empty_is_all_zero() {
        assert_eq!(normalize(&[]), BuildingSnapshot::default());
    }

    #[test]
    fn test_normalize_folds_like_aggregate() {
        let readings = [
            reading("grid", MeterRole::TotalGrid, 500.0, SourceTag::Import),
            reading("grid", MeterRole::TotalGrid, 1500.0, SourceTag::Export),
            reading("pv", MeterRole::Solar, 2500.0, SourceTag::Export),
            reading("pv", MeterRole::Solar, 40.0, SourceTag::Import),
            reading("evse", MeterRole::Charger, 3700.0, SourceTag::Import),
            reading("heat", MeterRole::Heating, 900.0, SourceTag::Import),
        ];

        let snapshot = normalize(&readings);
        assert_eq!(snapshot, aggregate(&readings));
        assert_eq!(
            snapshot,
            BuildingSnapshot::from_normalized(&normalize_meters(&readings))
        );
        assert_eq!(snapshot.total_export_kw, 1.5);
        assert_eq!(snapshot.charging_kw, 3.7);
    }
}
