//! Energy-flow attribution engine
//!
//! Raw meter samples are normalized into a per-building snapshot, decomposed
//! into solar- and grid-covered shares, and, for buildings inside a complex,
//! compared against siblings' exported solar. Every function here is pure and
//! safe to call for many buildings concurrently.

pub mod cache;
pub mod model;
pub mod normalize;
pub mod sharing;
pub mod snapshot;

pub use cache::FlowCache;
pub use model::{decompose, FlowRegime, FlowResult};
pub use normalize::{normalize, normalize_meters, NormalizedReading};
pub use sharing::{estimate_sharing, ComplexSharingResult, SharingContributor};
pub use snapshot::{aggregate, BuildingSnapshot};
