//! Splitting a lump list into map segments and collecting the tags each map
//! uses.
//!
//! A segment starts at a `MAPxx` marker lump and runs until the next marker.
//! Lumps before the first marker belong to no map and are never read.

use std::collections::HashMap;

use tracing::debug;

use crate::records::{is_sentinel_tag, Field, RecordKind};
use crate::wad::LumpList;

/// Harvested tags per map, keyed by the exact marker name. Repeats are kept
/// so frequently used tags are drawn more often.
pub type TagPools = HashMap<Vec<u8>, Vec<u16>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapLump {
    /// A `MAPxx` marker opening a new segment.
    Marker,
    /// A record lump inside the current segment.
    Records(RecordKind),
}

pub fn is_map_marker(name: &[u8]) -> bool {
    name.len() == 5 && name.starts_with(b"MAP")
}

/// Lumps that matter to a map pass, as `(index, role)` in list order.
/// Anything before the first marker, and any lump that is neither a marker
/// nor a record lump, is skipped.
pub fn walk(lumps: &LumpList) -> impl Iterator<Item = (usize, MapLump)> + '_ {
    let mut in_segment = false;
    lumps.iter().enumerate().filter_map(move |(i, lump)| {
        if is_map_marker(&lump.name) {
            in_segment = true;
            Some((i, MapLump::Marker))
        } else if !in_segment {
            None
        } else {
            RecordKind::from_lump_name(&lump.name).map(|kind| (i, MapLump::Records(kind)))
        }
    })
}

/// Non-sentinel tags of every whole record in `data`.
pub fn record_tags(kind: RecordKind, data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    (0..kind.record_count(data.len()))
        .map(move |i| kind.read(data, i, Field::Tag))
        .filter(|&tag| !is_sentinel_tag(tag))
}

/// Read-only pass building one tag pool per map.
///
/// A marker name seen twice starts its pool over, so both segments end up
/// sharing the pool of the later one.
pub fn harvest_tag_pools(lumps: &LumpList) -> TagPools {
    let mut pools = TagPools::new();
    let mut current: &[u8] = &[];

    for (i, role) in walk(lumps) {
        let lump = &lumps[i];
        match role {
            MapLump::Marker => {
                current = &lump.name;
                pools.insert(lump.name.clone(), Vec::new());
            }
            MapLump::Records(kind) => {
                let pool = pools.entry(current.to_vec()).or_default();
                let before = pool.len();
                pool.extend(record_tags(kind, &lump.data));
                debug!(
                    map = %String::from_utf8_lossy(current),
                    lump = %lump.name_str(),
                    tags = pool.len() - before,
                    "harvested tags"
                );
            }
        }
    }

    pools
}
