use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::snapshot::BuildingSnapshot;

// Loads below this are treated as zero when computing ratios
const MIN_LOAD_THRESHOLD_KW: f64 = 0.01;

/// Which branch of the decomposition produced a [`FlowResult`]
///
/// Selected in this order: export is judged by the net grid meter alone,
/// never by whether solar on its own is net positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRegime {
    /// Solar producing and the building exporting at the grid boundary
    SolarExporting,
    /// Solar producing, grid still covering the rest of demand
    SolarImporting,
    /// No net solar production; demand is grid-sourced
    GridOnly,
    /// No net solar production yet the grid meter shows export (unmetered generation)
    ExportWithoutSolar,
}

impl FlowRegime {
    pub fn select(solar_production_kw: f64, grid_net_kw: f64) -> Self {
        if solar_production_kw > 0.0 {
            if grid_net_kw < 0.0 {
                FlowRegime::SolarExporting
            } else {
                FlowRegime::SolarImporting
            }
        } else if grid_net_kw < 0.0 {
            FlowRegime::ExportWithoutSolar
        } else {
            FlowRegime::GridOnly
        }
    }

    pub fn is_exporting(&self) -> bool {
        matches!(self, FlowRegime::SolarExporting | FlowRegime::ExportWithoutSolar)
    }
}

/// Decomposition of one building's power flow at one instant
///
/// Conservation:
/// - importing: `actual_house_consumption_kw = solar_to_house_kw + grid_to_house_kw + charging_kw`
/// - exporting with solar: `solar_to_house_kw + solar_to_grid_kw = solar_production_kw`
///   and `actual_house_consumption_kw = solar_to_house_kw + charging_kw`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub regime: FlowRegime,

    /// Solar export minus solar import (positive = surplus, negative = drawing)
    pub solar_net_kw: f64,
    pub solar_production_kw: f64,
    /// Solar-side draw, e.g. inverters at night
    pub solar_consumption_kw: f64,

    /// Grid import minus grid export (positive = importing, negative = exporting)
    pub grid_net_kw: f64,

    pub charging_kw: f64,
    pub actual_house_consumption_kw: f64,
    pub solar_to_house_kw: f64,
    pub solar_to_grid_kw: f64,
    pub grid_to_house_kw: f64,

    /// Export at the grid boundary the solar meter cannot account for
    pub unattributed_export_kw: f64,
}

impl FlowResult {
    /// Decompose using the snapshot's own charger total
    pub fn from_snapshot(snapshot: &BuildingSnapshot) -> Self {
        decompose(snapshot, snapshot.charging_kw)
    }

    /// Share of house consumption covered by on-site solar (0-1)
    pub fn self_sufficiency_ratio(&self) -> f64 {
        if self.actual_house_consumption_kw < MIN_LOAD_THRESHOLD_KW {
            return 0.0;
        }
        (self.solar_to_house_kw / self.actual_house_consumption_kw).clamp(0.0, 1.0)
    }

    /// Share of solar production consumed on site (0-1)
    pub fn self_consumption_ratio(&self) -> f64 {
        if self.solar_production_kw < MIN_LOAD_THRESHOLD_KW {
            return 0.0;
        }
        (self.solar_to_house_kw / self.solar_production_kw).clamp(0.0, 1.0)
    }

    /// Grid import available for sharing (0 when exporting)
    pub fn grid_import_kw(&self) -> f64 {
        self.grid_net_kw.max(0.0)
    }
}

impl fmt::Display for FlowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlowResult {{ {:?}, House: {:.2}kW (Solar: {:.2}kW, Grid: {:.2}kW, EV: {:.2}kW), Solar->Grid: {:.2}kW, Grid net: {:.2}kW }}",
            self.regime,
            self.actual_house_consumption_kw,
            self.solar_to_house_kw,
            self.grid_to_house_kw,
            self.charging_kw,
            self.solar_to_grid_kw,
            self.grid_net_kw,
        )
    }
}

/// Decompose a building snapshot into solar- and grid-covered shares
///
/// `charging_kw` is authoritative over `snapshot.charging_kw`; unusable values
/// (negative, NaN) count as no charging. Total and deterministic: the all-zero
/// snapshot yields an all-zero result.
pub fn decompose(snapshot: &BuildingSnapshot, charging_kw: f64) -> FlowResult {
    let charging_kw = if charging_kw.is_finite() && charging_kw > 0.0 {
        charging_kw
    } else {
        0.0
    };

    let solar_net_kw = snapshot.solar_net_kw();
    let solar_production_kw = solar_net_kw.max(0.0);
    let solar_consumption_kw = (-solar_net_kw).max(0.0);
    let grid_net_kw = snapshot.grid_net_kw();

    let regime = FlowRegime::select(solar_production_kw, grid_net_kw);

    let mut solar_to_house_kw = 0.0;
    let mut solar_to_grid_kw = 0.0;
    let mut grid_to_house_kw = 0.0;
    let mut unattributed_export_kw = 0.0;

    let actual_house_consumption_kw = match regime {
        FlowRegime::SolarExporting => {
            let export_kw = -grid_net_kw;
            // Export beyond metered production came from somewhere else
            solar_to_grid_kw = export_kw.min(solar_production_kw);
            solar_to_house_kw = solar_production_kw - solar_to_grid_kw;
            unattributed_export_kw = export_kw - solar_to_grid_kw;
            solar_to_house_kw + charging_kw
        }
        FlowRegime::SolarImporting => {
            solar_to_house_kw = solar_production_kw;
            grid_to_house_kw = grid_net_kw;
            solar_to_house_kw + grid_to_house_kw + charging_kw
        }
        FlowRegime::GridOnly => {
            // Solar-side draw is served by the grid
            grid_to_house_kw = grid_net_kw + solar_consumption_kw;
            grid_net_kw + charging_kw + solar_consumption_kw
        }
        FlowRegime::ExportWithoutSolar => {
            unattributed_export_kw = -grid_net_kw;
            charging_kw + solar_consumption_kw
        }
    };

    debug!(
        ?regime,
        solar_net_kw,
        grid_net_kw,
        charging_kw,
        actual_house_consumption_kw,
        "decomposed building flow"
    );

    FlowResult {
        regime,
        solar_net_kw,
        solar_production_kw,
        solar_consumption_kw,
        grid_net_kw,
        charging_kw,
        actual_house_consumption_kw,
        solar_to_house_kw,
        solar_to_grid_kw,
        grid_to_house_kw,
        unattributed_export_kw,
    }
}
