use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub mod maps;
pub mod mutate;
pub mod records;
pub mod specials;
pub mod wad;

pub use mutate::{CorruptionReport, MapReport, MutationEngine, MutationRates};
pub use wad::{Lump, LumpList, WadKind};

/// Where the linedef special pool is read from when no path is given.
pub const DEFAULT_SPECIALS_PATH: &str = "linedefs.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorruptorSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Fixed seed for reproducible output; entropy-seeded when absent.
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub rates: MutationRates,
    /// Linedef special pool; [`DEFAULT_SPECIALS_PATH`] when absent. Only read
    /// when linedef specials can change.
    pub specials_path: Option<PathBuf>,
    #[serde(default)]
    pub output_magic: WadKind,
    /// Optional JSON report of what was rewritten.
    pub report_path: Option<PathBuf>,
}

impl CorruptorSettings {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            seed: None,
            rates: MutationRates::default(),
            specials_path: None,
            output_magic: WadKind::Pwad,
            report_path: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.rates.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(CorruptorError::Config(format!(
                    "{name} must be between 0 and 1 inclusive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CorruptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{}: file not found", path.display())]
    NotFound { path: PathBuf },
    #[error("{filename} is not a WAD file ({reason})")]
    Format { filename: String, reason: String },
    #[error("{}: linedef special list not found", path.display())]
    SpecialsNotFound { path: PathBuf },
    #[error("invalid lump name {name:?} (must be 1-8 bytes)")]
    InvalidLumpName { name: String },
    #[error("cannot write WAD: {0}")]
    ArchiveWrite(String),
    #[error("no lump named {name:?} was found")]
    LumpNotFound { name: String },
    #[error("report serialisation failed: {0}")]
    Report(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CorruptorError>;

fn load_specials(settings: &CorruptorSettings) -> Result<Vec<u16>> {
    if settings.rates.linedef_special_prob <= 0.0 {
        return Ok(Vec::new());
    }

    let path = settings
        .specials_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SPECIALS_PATH));
    let pool = specials::load_special_pool(&path)?;
    if pool.is_empty() {
        return Err(CorruptorError::Config(format!(
            "{} lists no linedef specials to choose from",
            path.display()
        )));
    }
    Ok(pool)
}

/// Load the input WAD, corrupt every map in it and write the result.
pub fn run(settings: CorruptorSettings) -> Result<CorruptionReport> {
    settings.validate()?;
    let specials = load_specials(&settings)?;

    let mut lumps = wad::load(&settings.input_path)?;
    let pools = maps::harvest_tag_pools(&lumps);

    let mut engine = MutationEngine::new(settings.rates.clone(), specials, settings.seed);
    let report = engine.mutate(&mut lumps, &pools);

    wad::save(&settings.output_path, &lumps, settings.output_magic)?;

    info!(
        maps = report.maps.len(),
        sector_tags = report.total(|m| m.sector_tags_rewritten),
        sector_specials = report.total(|m| m.sector_specials_rewritten),
        linedef_tags = report.total(|m| m.linedef_tags_rewritten),
        linedef_specials = report.total(|m| m.linedef_specials_rewritten),
        "wrote {}",
        settings.output_path.display()
    );

    if let Some(report_path) = &settings.report_path {
        fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
    }

    Ok(report)
}
