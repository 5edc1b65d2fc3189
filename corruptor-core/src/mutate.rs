use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::maps::{walk, MapLump, TagPools};
use crate::records::{is_tag_transfer_special, Field, RecordKind};
use crate::wad::LumpList;

/// Probabilities driving each kind of rewrite. All lie in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationRates {
    /// Chance that a sector's tag is redrawn from the map's tag pool.
    pub sector_tag_prob: f64,
    /// Chance that a linedef's tag is redrawn from the map's tag pool.
    pub linedef_tag_prob: f64,
    /// Extra chance a selected record with tag 0 is retagged anyway.
    pub apply_to_zero_prob: f64,
    /// Chance a sector's special becomes an arbitrary 16-bit value.
    pub sector_special_prob: f64,
    /// Chance a linedef's special is redrawn from the special-code pool.
    pub linedef_special_prob: f64,
    /// Chance a linedef with special 0 is eligible for a new special.
    pub special_zero_prob: f64,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            sector_tag_prob: 0.0,
            linedef_tag_prob: 0.0,
            apply_to_zero_prob: 0.0,
            sector_special_prob: 0.0,
            linedef_special_prob: 0.0,
            special_zero_prob: 1.0,
        }
    }
}

impl MutationRates {
    pub(crate) fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("sector_tag_prob", self.sector_tag_prob),
            ("linedef_tag_prob", self.linedef_tag_prob),
            ("apply_to_zero_prob", self.apply_to_zero_prob),
            ("sector_special_prob", self.sector_special_prob),
            ("linedef_special_prob", self.linedef_special_prob),
            ("special_zero_prob", self.special_zero_prob),
        ]
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MapReport {
    pub name: String,
    pub tag_pool_size: usize,
    pub sectors: usize,
    pub linedefs: usize,
    pub sector_tags_rewritten: usize,
    pub sector_specials_rewritten: usize,
    pub linedef_tags_rewritten: usize,
    pub linedef_specials_rewritten: usize,
    /// Tag rewrites that were selected but had an empty pool to draw from.
    pub tag_rewrites_skipped: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionReport {
    pub seed: Option<u64>,
    pub maps: Vec<MapReport>,
}

impl CorruptionReport {
    /// Sum of one counter across all maps.
    pub fn total(&self, counter: impl Fn(&MapReport) -> usize) -> usize {
        self.maps.iter().map(counter).sum()
    }
}

/// Rewrites tags and specials of map records with a single random source.
pub struct MutationEngine {
    rates: MutationRates,
    specials: Vec<u16>,
    seed: Option<u64>,
    rng: StdRng,
}

impl MutationEngine {
    /// `seed` fixes the random source for reproducible output. It is applied
    /// once here and never again.
    pub fn new(rates: MutationRates, specials: Vec<u16>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rates,
            specials,
            seed,
            rng,
        }
    }

    /// Bernoulli draw. The bounds are exact and consume no randomness.
    fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.rng.gen::<f64>() < probability
        }
    }

    /// Second pass over `lumps`, rewriting SECTORS and LINEDEFS of every map
    /// using the pools built by [`crate::maps::harvest_tag_pools`].
    pub fn mutate(&mut self, lumps: &mut LumpList, pools: &TagPools) -> CorruptionReport {
        let mut report = CorruptionReport {
            seed: self.seed,
            maps: Vec::new(),
        };
        let roles: Vec<(usize, MapLump)> = walk(lumps).collect();
        let mut pool: &[u16] = &[];

        for (i, role) in roles {
            match role {
                MapLump::Marker => {
                    let name = lumps[i].name_str();
                    info!("Processing {name}...");
                    pool = pools.get(&lumps[i].name).map(Vec::as_slice).unwrap_or(&[]);
                    report.maps.push(MapReport {
                        name,
                        tag_pool_size: pool.len(),
                        ..MapReport::default()
                    });
                }
                MapLump::Records(kind) => {
                    // walk() only yields records after a marker.
                    let Some(stats) = report.maps.last_mut() else {
                        continue;
                    };
                    let data = &mut lumps[i].data;
                    if data.len() % kind.record_size() != 0 {
                        warn!(
                            map = %stats.name,
                            lump = ?kind,
                            len = data.len(),
                            "lump size is not a whole number of records, trailing bytes kept"
                        );
                    }
                    match kind {
                        RecordKind::Sector => self.mutate_sectors(data, pool, stats),
                        RecordKind::Linedef => self.mutate_linedefs(data, pool, stats),
                    }
                }
            }
        }

        report
    }

    fn mutate_sectors(&mut self, data: &mut [u8], pool: &[u16], stats: &mut MapReport) {
        let kind = RecordKind::Sector;
        let count = kind.record_count(data.len());
        stats.sectors += count;

        for j in 0..count {
            if self.chance(self.rates.sector_tag_prob) {
                let tag = kind.read(data, j, Field::Tag);
                if tag != 0 || self.chance(self.rates.apply_to_zero_prob) {
                    match pool.choose(&mut self.rng) {
                        Some(&new_tag) => {
                            kind.write(data, j, Field::Tag, new_tag);
                            stats.sector_tags_rewritten += 1;
                        }
                        None => {
                            debug!(map = %stats.name, sector = j, "empty tag pool, tag kept");
                            stats.tag_rewrites_skipped += 1;
                        }
                    }
                }
            }
            if self.chance(self.rates.sector_special_prob) {
                let special: u16 = self.rng.gen();
                kind.write(data, j, Field::Special, special);
                stats.sector_specials_rewritten += 1;
            }
        }
    }

    fn mutate_linedefs(&mut self, data: &mut [u8], pool: &[u16], stats: &mut MapReport) {
        let kind = RecordKind::Linedef;
        let count = kind.record_count(data.len());
        stats.linedefs += count;

        for j in 0..count {
            let special = kind.read(data, j, Field::Special);

            if self.chance(self.rates.linedef_tag_prob) && !is_tag_transfer_special(special) {
                let tag = kind.read(data, j, Field::Tag);
                if tag != 0 || self.chance(self.rates.apply_to_zero_prob) {
                    match pool.choose(&mut self.rng) {
                        Some(&new_tag) => {
                            kind.write(data, j, Field::Tag, new_tag);
                            stats.linedef_tags_rewritten += 1;
                        }
                        None => {
                            debug!(map = %stats.name, linedef = j, "empty tag pool, tag kept");
                            stats.tag_rewrites_skipped += 1;
                        }
                    }
                }
            }

            if (special != 0 || self.chance(self.rates.special_zero_prob))
                && self.chance(self.rates.linedef_special_prob)
            {
                if let Some(&new_special) = self.specials.choose(&mut self.rng) {
                    kind.write(data, j, Field::Special, new_special);
                    stats.linedef_specials_rewritten += 1;
                }
            }
        }
    }
}
