//! Per-segment merge decisions.

use super::snapshot::ExistingGrids;
use crate::coord::Coord;
use crate::hmap::Segment;
use crate::store::MapId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Anchor matches a non-dominant segment needs near the merged footprint.
pub const MIN_PROXIMATE_MATCHES: usize = 5;

/// Manhattan distance, in grids, that counts as near the footprint.
pub const PROXIMITY_THRESHOLD: u32 = 10;

/// Coordinate overlap (percent) at or above which a segment may be a cave.
pub const CAVE_OVERLAP_PCT: f64 = 50.0;

/// Content match (percent) below which an overlapping segment is a cave.
pub const CAVE_CONTENT_MATCH_PCT: f64 = 10.0;

/// Why a segment gets its own map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NewMapReason {
    /// No grid of the segment matches a stored grid
    NoAnchors,
    /// Matches exist but lie away from the terrain merged so far
    NotProximate,
    /// Same coordinates as stored terrain with different content
    Cave,
}

impl fmt::Display for NewMapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NewMapReason::NoAnchors => "no anchors",
            NewMapReason::NotProximate => "not proximate",
            NewMapReason::Cave => "cave",
        };
        f.write_str(s)
    }
}

/// Outcome for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentDecision {
    /// Place the segment into `map`, adding `offset` to every grid coordinate
    Merge {
        map: MapId,
        offset: Coord,
        matches: usize,
    },
    /// Create a new map and keep the file's coordinates
    NewMap { reason: NewMapReason },
}

impl SegmentDecision {
    pub fn is_merge(&self) -> bool {
        matches!(self, SegmentDecision::Merge { .. })
    }
}

/// Decision for a segment together with what it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub segment_id: i64,
    pub grid_count: usize,
    pub decision: SegmentDecision,
    /// Percentage of projected grids landing on occupied coordinates
    pub overlap_pct: f64,
    /// Percentage of overlapping grids whose id matches
    pub content_match_pct: f64,
}

/// Merge decisions for every segment of an import, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    pub segments: Vec<SegmentPlan>,
}

impl MergePlan {
    pub fn decision_for(&self, segment_id: i64) -> Option<SegmentDecision> {
        self.segments
            .iter()
            .find(|s| s.segment_id == segment_id)
            .map(|s| s.decision)
    }

    pub fn merge_count(&self) -> usize {
        self.segments.iter().filter(|s| s.decision.is_merge()).count()
    }

    pub fn new_map_count(&self) -> usize {
        self.segments.len() - self.merge_count()
    }

    pub fn count_reason(&self, reason: NewMapReason) -> usize {
        self.segments
            .iter()
            .filter(|s| s.decision == SegmentDecision::NewMap { reason })
            .count()
    }

    pub fn caves(&self) -> usize {
        self.count_reason(NewMapReason::Cave)
    }

    pub fn not_proximate(&self) -> usize {
        self.count_reason(NewMapReason::NotProximate)
    }
}

/// Best `(map, offset)` group of a segment's anchor matches.
#[derive(Debug)]
struct Candidate {
    index: usize,
    segment_id: i64,
    map: MapId,
    offset: Coord,
    /// Stored coordinates of the matches agreeing with `offset`
    anchors: Vec<Coord>,
}

fn find_candidate(index: usize, segment: &Segment, existing: &ExistingGrids) -> Option<Candidate> {
    let mut groups: HashMap<(MapId, Coord), Vec<Coord>> = HashMap::new();
    for grid in &segment.grids {
        if let Some(anchor) = existing.anchor(&grid.id_string()) {
            groups
                .entry((anchor.map, anchor.coord - grid.coord))
                .or_default()
                .push(anchor.coord);
        }
    }

    // most matches, then lowest map id, then smallest offset
    let ((map, offset), anchors) = groups.into_iter().min_by(|(ka, va), (kb, vb)| {
        vb.len().cmp(&va.len()).then(ka.cmp(kb))
    })?;

    Some(Candidate {
        index,
        segment_id: segment.id,
        map,
        offset,
        anchors,
    })
}

fn near_footprint(coord: Coord, footprint: &HashSet<Coord>) -> bool {
    let r = PROXIMITY_THRESHOLD as i32;
    if footprint.len() < ((2 * r + 1) * (2 * r + 1)) as usize {
        return footprint
            .iter()
            .any(|c| c.manhattan(&coord) <= PROXIMITY_THRESHOLD);
    }
    for dx in -r..=r {
        let span = r - dx.abs();
        for dy in -span..=span {
            if footprint.contains(&Coord::new(coord.x + dx, coord.y + dy)) {
                return true;
            }
        }
    }
    false
}

/// Returns `(overlap_pct, content_match_pct)` of a segment projected into `map`.
fn overlap_stats(segment: &Segment, map: MapId, offset: Coord, existing: &ExistingGrids) -> (f64, f64) {
    if segment.is_empty() {
        return (0.0, 0.0);
    }
    let mut overlap = 0usize;
    let mut content = 0usize;
    for grid in &segment.grids {
        if let Some(stored) = existing.grid_at(map, grid.coord + offset) {
            overlap += 1;
            if stored == grid.id_string() {
                content += 1;
            }
        }
    }
    let overlap_pct = overlap as f64 * 100.0 / segment.len() as f64;
    let content_pct = if overlap == 0 {
        0.0
    } else {
        content as f64 * 100.0 / overlap as f64
    };
    (overlap_pct, content_pct)
}

/// Decides for every segment whether it merges into a stored map.
///
/// Candidates are visited in a fixed order: most anchor matches first, ties
/// by ascending segment id. The first one is dominant and always merges.
/// Each later candidate must have [`MIN_PROXIMATE_MATCHES`] anchors within
/// [`PROXIMITY_THRESHOLD`] of the terrain merged into its target map so far,
/// and must not look like a cave.
pub fn resolve(segments: &[Segment], existing: &ExistingGrids) -> MergePlan {
    let mut plans: Vec<SegmentPlan> = segments
        .iter()
        .map(|s| SegmentPlan {
            segment_id: s.id,
            grid_count: s.len(),
            decision: SegmentDecision::NewMap {
                reason: NewMapReason::NoAnchors,
            },
            overlap_pct: 0.0,
            content_match_pct: 0.0,
        })
        .collect();

    let mut candidates: Vec<Candidate> = segments
        .iter()
        .enumerate()
        .filter_map(|(i, s)| find_candidate(i, s, existing))
        .collect();
    candidates.sort_by(|a, b| {
        b.anchors
            .len()
            .cmp(&a.anchors.len())
            .then(a.segment_id.cmp(&b.segment_id))
    });

    let mut footprint: HashMap<MapId, HashSet<Coord>> = HashMap::new();

    for (rank, candidate) in candidates.iter().enumerate() {
        let segment = &segments[candidate.index];
        let (overlap_pct, content_pct) =
            overlap_stats(segment, candidate.map, candidate.offset, existing);
        let plan = &mut plans[candidate.index];
        plan.overlap_pct = overlap_pct;
        plan.content_match_pct = content_pct;

        if rank > 0 {
            let merged = &*footprint.entry(candidate.map).or_default();
            let proximate = candidate
                .anchors
                .iter()
                .filter(|&&c| near_footprint(c, merged))
                .count();
            if proximate < MIN_PROXIMATE_MATCHES {
                debug!(
                    segment_id = candidate.segment_id,
                    matches = candidate.anchors.len(),
                    proximate,
                    "Segment not proximate to merged terrain"
                );
                plan.decision = SegmentDecision::NewMap {
                    reason: NewMapReason::NotProximate,
                };
                continue;
            }
            if overlap_pct >= CAVE_OVERLAP_PCT && content_pct < CAVE_CONTENT_MATCH_PCT {
                debug!(
                    segment_id = candidate.segment_id,
                    overlap_pct,
                    content_pct,
                    "Segment detected as cave"
                );
                plan.decision = SegmentDecision::NewMap {
                    reason: NewMapReason::Cave,
                };
                continue;
            }
        }

        footprint
            .entry(candidate.map)
            .or_default()
            .extend(segment.grids.iter().map(|g| g.coord + candidate.offset));
        plan.decision = SegmentDecision::Merge {
            map: candidate.map,
            offset: candidate.offset,
            matches: candidate.anchors.len(),
        };
    }

    let plan = MergePlan { segments: plans };
    info!(
        segments = plan.segments.len(),
        merges = plan.merge_count(),
        new_maps = plan.new_map_count(),
        caves = plan.caves(),
        not_proximate = plan.not_proximate(),
        "Merge plan resolved"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmap::DecodedGrid;
    use crate::store::GridRecord;

    fn stored(id: i64, map: MapId, x: i32, y: i32) -> GridRecord {
        GridRecord {
            id: id.to_string(),
            map,
            coord: Coord::new(x, y),
            tenant: "t".to_string(),
            next_update: None,
        }
    }

    fn grid(id: i64, segment_id: i64, x: i32, y: i32) -> DecodedGrid {
        DecodedGrid {
            version: 4,
            grid_id: id,
            segment_id,
            mtime: 0,
            coord: Coord::new(x, y),
            tilesets: Vec::new(),
            tiles: Vec::new(),
            zmap: None,
            overlays: Vec::new(),
        }
    }

    fn segment(id: i64, grids: Vec<DecodedGrid>) -> Segment {
        Segment { id, grids }
    }

    /// Map 1 holds a 20×10 block of grids with id `1000 + y*100 + x`.
    fn block_map() -> Vec<GridRecord> {
        let mut rows = Vec::new();
        for y in 0..10 {
            for x in 0..20 {
                rows.push(stored(1000 + y * 100 + x as i64, 1, x, y as i32));
            }
        }
        rows
    }

    #[test]
    fn test_no_anchors_creates_new_map() {
        let existing = ExistingGrids::from_records(block_map());
        let seg = segment(7, vec![grid(1, 7, 0, 0), grid(2, 7, 1, 0)]);
        let plan = resolve(&[seg], &existing);
        assert_eq!(
            plan.decision_for(7),
            Some(SegmentDecision::NewMap {
                reason: NewMapReason::NoAnchors
            })
        );
    }

    #[test]
    fn test_dominant_merges_at_most_common_offset() {
        let existing = ExistingGrids::from_records(block_map());
        // three grids agree on offset (2, 3), one disagrees
        let seg = segment(
            1,
            vec![
                grid(1000 + 3 * 100 + 2, 1, 0, 0),
                grid(1000 + 3 * 100 + 3, 1, 1, 0),
                grid(1000 + 4 * 100 + 2, 1, 0, 1),
                grid(1000 + 9 * 100 + 9, 1, 0, 2),
                grid(1, 1, 5, 5),
            ],
        );
        let plan = resolve(&[seg], &existing);
        assert_eq!(
            plan.decision_for(1),
            Some(SegmentDecision::Merge {
                map: 1,
                offset: Coord::new(2, 3),
                matches: 3
            })
        );
    }

    #[test]
    fn test_dominant_merges_even_when_overlapping() {
        // a single matching segment is never a cave
        let existing = ExistingGrids::from_records(block_map());
        let mut grids = vec![grid(1000, 1, 0, 0)];
        for x in 1..20 {
            grids.push(grid(50_000 + x as i64, 1, x, 0));
        }
        let plan = resolve(&[segment(1, grids)], &existing);
        assert!(plan.decision_for(1).unwrap().is_merge());
    }

    #[test]
    fn test_not_proximate_segment_gets_new_map() {
        let mut rows = Vec::new();
        for x in 0..10 {
            rows.push(stored(100 + x as i64, 1, x, 0));
        }
        // anchors for the second segment: two near, four far away
        rows.push(stored(200, 1, 5, 3));
        rows.push(stored(201, 1, 6, 3));
        for i in 0..4 {
            rows.push(stored(300 + i, 1, 100 + i as i32, 100));
        }
        let existing = ExistingGrids::from_records(rows);

        let dominant = segment(1, (0..10).map(|x| grid(100 + x as i64, 1, x, 0)).collect());
        let offset = Coord::new(3, 4);
        let mut second = vec![
            grid(200, 2, 5 - offset.x, 3 - offset.y),
            grid(201, 2, 6 - offset.x, 3 - offset.y),
        ];
        for i in 0..4 {
            second.push(grid(300 + i, 2, 100 + i as i32 - offset.x, 100 - offset.y));
        }
        let second = segment(2, second);

        let plan = resolve(&[second, dominant], &existing);

        assert!(plan.decision_for(1).unwrap().is_merge());
        assert_eq!(
            plan.decision_for(2),
            Some(SegmentDecision::NewMap {
                reason: NewMapReason::NotProximate
            })
        );
        assert_eq!(plan.not_proximate(), 1);
    }

    #[test]
    fn test_cave_detected_despite_proximity() {
        let existing = ExistingGrids::from_records(block_map());

        // dominant: the whole first row, exact ids
        let dominant = segment(1, (0..20).map(|x| grid(1000 + x as i64, 1, x, 0)).collect());

        // 200 grids: 160 on occupied coordinates, 8 of which carry the stored id
        let mut grids = Vec::new();
        let mut overlapping = 0;
        for y in 1..10 {
            for x in 0..20 {
                if overlapping == 160 {
                    break;
                }
                let id = if overlapping < 8 {
                    1000 + y as i64 * 100 + x as i64
                } else {
                    90_000 + overlapping as i64
                };
                grids.push(grid(id, 2, x, y));
                overlapping += 1;
            }
        }
        for i in 0..40 {
            grids.push(grid(80_000 + i, 2, 40 + i as i32, 0));
        }
        let cave = segment(2, grids);

        let plan = resolve(&[dominant, cave], &existing);

        assert_eq!(
            plan.decision_for(2),
            Some(SegmentDecision::NewMap {
                reason: NewMapReason::Cave
            })
        );
        let stats = plan.segments.iter().find(|s| s.segment_id == 2).unwrap();
        assert!((stats.overlap_pct - 80.0).abs() < 1e-9);
        assert!((stats.content_match_pct - 5.0).abs() < 1e-9);
        assert_eq!(plan.caves(), 1);
    }

    #[test]
    fn test_order_is_by_match_count_then_segment_id() {
        let existing = ExistingGrids::from_records(block_map());
        // segment 9: 6 matches at offset (0,0) on row 0
        let big = segment(9, (0..6).map(|x| grid(1000 + x as i64, 9, x, 0)).collect());
        // segment 3: 5 matches at offset (0,0) on row 1, next to row 0
        let small = segment(3, (0..5).map(|x| grid(1100 + x as i64, 3, x, 1)).collect());

        let plan_a = resolve(&[small.clone(), big.clone()], &existing);
        let plan_b = resolve(&[big, small], &existing);

        assert_eq!(plan_a.decision_for(3), plan_b.decision_for(3));
        assert_eq!(plan_a.decision_for(9), plan_b.decision_for(9));
        assert!(plan_a.decision_for(3).unwrap().is_merge());
        assert_eq!(plan_a.merge_count(), 2);
    }

    #[test]
    fn test_ambiguous_ids_are_ignored() {
        let mut rows = block_map();
        rows.push(stored(1000, 2, 50, 50));
        let existing = ExistingGrids::from_records(rows);
        let seg = segment(1, vec![grid(1000, 1, 0, 0)]);
        let plan = resolve(&[seg], &existing);
        assert_eq!(
            plan.decision_for(1),
            Some(SegmentDecision::NewMap {
                reason: NewMapReason::NoAnchors
            })
        );
    }

    #[test]
    fn test_near_footprint_large_set() {
        let footprint: HashSet<Coord> = (0..1000).map(|x| Coord::new(x, 0)).collect();
        assert!(near_footprint(Coord::new(5, 10), &footprint));
        assert!(!near_footprint(Coord::new(5, 11), &footprint));
        assert!(near_footprint(Coord::new(-4, 6), &footprint));
        assert!(!near_footprint(Coord::new(-5, 6), &footprint));
    }
}
