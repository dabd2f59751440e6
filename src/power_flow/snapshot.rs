use serde::{Deserialize, Serialize};
use std::fmt;

use super::normalize::{normalize_meters, NormalizedReading};
use crate::domain::{MeterReading, MeterRole};

/// Per-building meter totals at a single sampling instant
///
/// Every field is a sum of non-negative samples, so all are >= 0. Roles without
/// meters contribute 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    /// Import side of the total grid meter(s) (kW)
    pub total_import_kw: f64,

    /// Export side of the total grid meter(s) (kW)
    pub total_export_kw: f64,

    /// Import side of the solar meter(s), e.g. inverter standby draw at night (kW)
    pub solar_import_kw: f64,

    /// Export side of the solar meter(s), i.e. PV production (kW)
    pub solar_export_kw: f64,

    /// EV charger draw (kW)
    pub charging_kw: f64,
}

impl BuildingSnapshot {
    pub fn new(
        total_import_kw: f64,
        total_export_kw: f64,
        solar_import_kw: f64,
        solar_export_kw: f64,
        charging_kw: f64,
    ) -> Self {
        Self {
            total_import_kw,
            total_export_kw,
            solar_import_kw,
            solar_export_kw,
            charging_kw,
        }
    }

    /// Sum per-meter records by role; heating, apartment and other meters are ignored
    pub fn from_normalized(records: &[NormalizedReading]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            match r.role {
                MeterRole::TotalGrid => {
                    acc.total_import_kw += r.import_kw;
                    acc.total_export_kw += r.export_kw;
                }
                MeterRole::Solar => {
                    acc.solar_import_kw += r.import_kw;
                    acc.solar_export_kw += r.export_kw;
                }
                MeterRole::Charger => acc.charging_kw += r.import_kw,
                MeterRole::Heating | MeterRole::Other | MeterRole::Apartment => {}
            }
            acc
        })
    }

    /// Net grid flow (positive = import, negative = export)
    pub fn grid_net_kw(&self) -> f64 {
        self.total_import_kw - self.total_export_kw
    }

    /// Net solar flow (positive = producing, negative = drawing)
    pub fn solar_net_kw(&self) -> f64 {
        self.solar_export_kw - self.solar_import_kw
    }
}

impl fmt::Display for BuildingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BuildingSnapshot {{ Grid: +{:.2}/-{:.2}kW, Solar: +{:.2}/-{:.2}kW, Charging: {:.2}kW }}",
            self.total_import_kw,
            self.total_export_kw,
            self.solar_import_kw,
            self.solar_export_kw,
            self.charging_kw,
        )
    }
}

/// Sum one building's readings for one instant into its snapshot
///
/// Pure fold; no state is kept between calls.
pub fn aggregate(readings: &[MeterReading]) -> BuildingSnapshot {
    BuildingSnapshot::from_normalized(&normalize_meters(readings))
}
