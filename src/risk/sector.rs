//! Static sector classification for exposure caps.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::exchange::OpenPosition;

/// Sector tag used by the exposure caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Tech,
    Finance,
    Energy,
    /// Index products and anything unmapped
    Broad,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Tech => "tech",
            Sector::Finance => "finance",
            Sector::Energy => "energy",
            Sector::Broad => "broad",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open-position count per sector.
pub type SectorCounts = HashMap<Sector, usize>;

/// Classify a symbol. Unmapped symbols fall into `Broad`.
pub fn sector_of(symbol: &str) -> Sector {
    match symbol {
        "AAPL" | "MSFT" | "NVDA" | "AMD" | "META" | "GOOGL" | "TSLA" | "QQQ" | "XLK" => {
            Sector::Tech
        }
        "BAC" | "XLF" => Sector::Finance,
        "XLE" => Sector::Energy,
        _ => Sector::Broad,
    }
}

/// Count open positions per sector.
pub fn sector_counts(positions: &[OpenPosition]) -> SectorCounts {
    let mut counts = SectorCounts::new();
    for position in positions {
        *counts.entry(sector_of(&position.symbol)).or_insert(0) += 1;
    }
    counts
}
