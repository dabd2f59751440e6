pub mod scheduler;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

pub use scheduler::{
    delay_until_next_boundary, next_boundary, Clock, RefreshHandle, RefreshJob, RefreshScheduler,
    SystemClock, TaskStatus,
};

use crate::domain::{BuildingDirectory, BuildingId, MeterDirectory, MeterReading};
use crate::power_flow::{
    estimate_sharing, normalize, BuildingSnapshot, ComplexSharingResult, FlowCache, FlowResult,
};
use crate::site::{latest_per_meter, SiteFile};

/// Everything the dashboard shows for one building at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingFlowView {
    pub building_id: BuildingId,
    pub timestamp: DateTime<Utc>,
    pub snapshot: BuildingSnapshot,
    pub flow: FlowResult,
    /// Present only for importing buildings in a complex with exporting siblings
    pub sharing: Option<ComplexSharingResult>,
}

/// Runs the pipeline: directory pre-filter, normalize, decompose, complex sharing
pub struct FlowController {
    buildings: BuildingDirectory,
    meters: MeterDirectory,
    cache: FlowCache,
    cached_instant: Mutex<Option<DateTime<Utc>>>,
}

impl FlowController {
    pub fn new(buildings: BuildingDirectory, meters: MeterDirectory) -> Self {
        Self {
            buildings,
            meters,
            cache: FlowCache::new(),
            cached_instant: Mutex::new(None),
        }
    }

    pub fn from_site(site: &SiteFile) -> Self {
        Self::new(site.building_directory(), site.meter_directory())
    }

    pub fn buildings(&self) -> &BuildingDirectory {
        &self.buildings
    }

    pub fn cache(&self) -> &FlowCache {
        &self.cache
    }

    /// Cached flows only ever describe one instant
    fn roll_instant(&self, at: DateTime<Utc>) {
        let mut current = self.cached_instant.lock();
        if *current != Some(at) {
            self.cache.clear();
            *current = Some(at);
        }
    }

    fn snapshot_for(&self, building: &BuildingId, readings: &[MeterReading]) -> BuildingSnapshot {
        normalize(&self.meters.readings_for(building, readings))
    }

    fn flow_for(&self, building: &BuildingId, readings: &[MeterReading]) -> (BuildingSnapshot, FlowResult) {
        let snapshot = self.snapshot_for(building, readings);
        let flow = self
            .cache
            .get_or_decompose(building, &snapshot, snapshot.charging_kw);
        (snapshot, flow)
    }

    /// View of a single building; siblings are decomposed only when sharing applies
    pub fn building_view(
        &self,
        building: &BuildingId,
        readings: &[MeterReading],
        at: DateTime<Utc>,
    ) -> BuildingFlowView {
        self.roll_instant(at);
        let (snapshot, flow) = self.flow_for(building, readings);

        let siblings = self.buildings.siblings_of(building);
        let sharing = if flow.grid_net_kw > 0.0 && !siblings.is_empty() {
            let mut flows: HashMap<BuildingId, FlowResult> = siblings
                .iter()
                .map(|sibling| (sibling.clone(), self.flow_for(sibling, readings).1))
                .collect();
            flows.insert(building.clone(), flow);
            estimate_sharing(building, &siblings, &flows)
        } else {
            None
        };

        BuildingFlowView {
            building_id: building.clone(),
            timestamp: at,
            snapshot,
            flow,
            sharing,
        }
    }

    /// Views of every metered (non-group) building, in directory order
    pub fn site_view(&self, readings: &[MeterReading], at: DateTime<Utc>) -> Vec<BuildingFlowView> {
        self.roll_instant(at);

        let computed: Vec<(BuildingId, BuildingSnapshot, FlowResult)> = self
            .buildings
            .physical_buildings()
            .map(|b| {
                let (snapshot, flow) = self.flow_for(&b.id, readings);
                (b.id.clone(), snapshot, flow)
            })
            .collect();

        let flows: HashMap<BuildingId, FlowResult> = computed
            .iter()
            .map(|(id, _, flow)| (id.clone(), *flow))
            .collect();

        computed
            .into_iter()
            .map(|(building_id, snapshot, flow)| {
                let siblings = self.buildings.siblings_of(&building_id);
                let sharing = if siblings.is_empty() {
                    None
                } else {
                    estimate_sharing(&building_id, &siblings, &flows)
                };
                BuildingFlowView {
                    building_id,
                    timestamp: at,
                    snapshot,
                    flow,
                    sharing,
                }
            })
            .collect()
    }
}

pub type ViewSink = Box<dyn Fn(&[BuildingFlowView]) + Send + Sync>;

/// Reloads a site file at every refresh boundary and hands the computed views to a sink
pub struct SiteRefreshJob {
    path: PathBuf,
    sink: ViewSink,
}

impl SiteRefreshJob {
    pub fn new(path: impl Into<PathBuf>, sink: ViewSink) -> Self {
        Self {
            path: path.into(),
            sink,
        }
    }

    /// Load, pick the latest sample per meter, compute every building
    pub async fn compute(&self) -> Result<Vec<BuildingFlowView>> {
        let site = SiteFile::load(&self.path).await?;
        let controller = FlowController::from_site(&site);
        let Some((instant, readings)) = latest_per_meter(&site.readings) else {
            warn!(path = %self.path.display(), "site file has no readings");
            return Ok(Vec::new());
        };
        Ok(controller.site_view(&readings, instant))
    }
}

#[async_trait]
impl RefreshJob for SiteRefreshJob {
    async fn refresh(&self, boundary: DateTime<Utc>) -> Result<()> {
        let views = self.compute().await?;
        info!(%boundary, buildings = views.len(), "site flows recomputed");
        (self.sink)(&views);
        Ok(())
    }
}
