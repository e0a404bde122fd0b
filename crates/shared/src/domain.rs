use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(CallId);

/// Severity attached to worker log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// The seven charts of the fallback figure set, in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartName {
    WhiteHist,
    PbHist,
    Overdue,
    PpYear,
    Dow,
    PairsHeatmap,
    SumSpread,
}

impl ChartName {
    pub const ALL: [ChartName; 7] = [
        ChartName::WhiteHist,
        ChartName::PbHist,
        ChartName::Overdue,
        ChartName::PpYear,
        ChartName::Dow,
        ChartName::PairsHeatmap,
        ChartName::SumSpread,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChartName::WhiteHist => "white_hist",
            ChartName::PbHist => "pb_hist",
            ChartName::Overdue => "overdue",
            ChartName::PpYear => "pp_year",
            ChartName::Dow => "dow",
            ChartName::PairsHeatmap => "pairs_heatmap",
            ChartName::SumSpread => "sum_spread",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|chart| chart.as_str() == raw)
    }
}

impl fmt::Display for ChartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSource {
    Accelerated,
    PureScript,
}
