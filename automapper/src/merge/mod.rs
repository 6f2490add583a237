//! Placement of imported segments relative to stored terrain.
//!
//! A segment is anchored by grid ids that already exist exactly once for
//! the tenant. The offset most anchors agree on says where the segment sits
//! in the stored map. Segments without anchors, far from the terrain merged
//! so far, or covering stored coordinates with different content (caves)
//! get their own map.

mod resolver;
mod snapshot;

pub use resolver::{
    resolve, MergePlan, NewMapReason, SegmentDecision, SegmentPlan, CAVE_CONTENT_MATCH_PCT,
    CAVE_OVERLAP_PCT, MIN_PROXIMATE_MATCHES, PROXIMITY_THRESHOLD,
};
pub use snapshot::ExistingGrids;
