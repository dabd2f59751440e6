//! Complex-level solar sharing estimate.
//!
//! For an importing building inside a complex, estimates how much of its grid
//! draw could have been covered by siblings' exported solar. Nothing here is
//! metered: no measurement proves which building's export reached which
//! building, so the result is a capacity estimate for display. It must not be
//! used as settlement or billing input.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::model::FlowResult;
use crate::domain::BuildingId;

/// One exporting sibling and the solar it sends to the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingContributor {
    pub building_id: BuildingId,
    pub contributed_kw: f64,
}

/// Estimated split of an importing building's grid draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexSharingResult {
    /// Grid import that siblings' export could cover (<= own grid import)
    pub potential_shared_kw: f64,
    /// Grid import left over after sharing
    pub grid_only_kw: f64,
    pub solar_share_pct: f64,
    pub grid_share_pct: f64,
    /// Sum of all exporting siblings' solar-to-grid
    pub total_export_kw: f64,
    /// Exporting siblings, in complex membership order
    pub contributors: Vec<SharingContributor>,
}

/// Estimate how much of `building_id`'s grid import its siblings could cover
///
/// Returns `None` when the building has no flow, is not importing, or no
/// sibling is exporting solar. `complex_members` may include the building
/// itself; it is skipped. Members without a flow contribute nothing.
pub fn estimate_sharing(
    building_id: &BuildingId,
    complex_members: &[BuildingId],
    per_building_flow: &HashMap<BuildingId, FlowResult>,
) -> Option<ComplexSharingResult> {
    let own = per_building_flow.get(building_id)?;
    let grid_net_kw = own.grid_net_kw;
    if grid_net_kw <= 0.0 {
        return None;
    }

    let contributors: Vec<SharingContributor> = complex_members
        .iter()
        .filter(|member| *member != building_id)
        .filter_map(|member| {
            let flow = per_building_flow.get(member)?;
            (flow.solar_to_grid_kw > 0.0).then(|| SharingContributor {
                building_id: member.clone(),
                contributed_kw: flow.solar_to_grid_kw,
            })
        })
        .collect();

    let total_export_kw: f64 = contributors.iter().map(|c| c.contributed_kw).sum();
    if total_export_kw <= 0.0 {
        return None;
    }

    let potential_shared_kw = grid_net_kw.min(total_export_kw);
    let solar_share_pct = potential_shared_kw / grid_net_kw * 100.0;

    debug!(
        building_id = %building_id,
        grid_net_kw,
        total_export_kw,
        potential_shared_kw,
        contributors = contributors.len(),
        "estimated complex sharing"
    );

    Some(ComplexSharingResult {
        potential_shared_kw,
        grid_only_kw: grid_net_kw - potential_shared_kw,
        solar_share_pct,
        grid_share_pct: 100.0 - solar_share_pct,
        total_export_kw,
        contributors,
    })
}
