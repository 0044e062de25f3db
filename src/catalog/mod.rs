pub mod types;

use serde::{Deserialize, Serialize};

pub use types::{RowSet, Value};

/// Named partition of non-key attributes in the column store. Every
/// attribute belongs to exactly one group, and each group keeps a single
/// live value per attribute per row key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnGroup {
    /// Identity attributes: the observation year, entity metadata.
    Basic,
    /// Agricultural surplus measures (kg per square km).
    Surplus,
    /// Emission measures (kg per square km).
    Emission,
}

impl ColumnGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnGroup::Basic => "cf_basic",
            ColumnGroup::Surplus => "cf_surplus",
            ColumnGroup::Emission => "cf_emission",
        }
    }

    /// Groups holding numeric measures, in scan order. Identity attributes
    /// live in `Basic` and are not part of a trend.
    pub fn measure_groups() -> [ColumnGroup; 2] {
        [ColumnGroup::Surplus, ColumnGroup::Emission]
    }
}

impl std::fmt::Display for ColumnGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known attribute qualifiers within the column groups.
pub mod qualifiers {
    pub const YEAR: &str = "year";
    pub const N_SURPLUS: &str = "n_ag_surplus_kgsqkm";
    pub const P_SURPLUS: &str = "p_ag_surplus_kgsqkm";
    pub const N_EMISSION: &str = "n_emis_total_kgsqkm";
    pub const P_EMISSION: &str = "p_emis_total_kgsqkm";
}
