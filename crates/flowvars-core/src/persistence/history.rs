use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Nivel de historial del engine. El orden de las variantes es significativo:
/// `None < Activity < Audit < Full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryLevel {
    None,
    Activity,
    #[default]
    Audit,
    Full,
}

impl HistoryLevel {
    /// Nivel mínimo a partir del cual se registran actualizaciones de variables.
    pub const VARIABLE_TRACKING: HistoryLevel = HistoryLevel::Audit;

    pub fn records_variable_updates(&self) -> bool {
        *self >= Self::VARIABLE_TRACKING
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryLevel::None => "none",
            HistoryLevel::Activity => "activity",
            HistoryLevel::Audit => "audit",
            HistoryLevel::Full => "full",
        }
    }
}

impl fmt::Display for HistoryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(HistoryLevel::None),
            "activity" => Ok(HistoryLevel::Activity),
            "audit" => Ok(HistoryLevel::Audit),
            "full" => Ok(HistoryLevel::Full),
            other => Err(format!("unknown history level '{other}'")),
        }
    }
}
