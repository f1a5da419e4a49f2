//! Severity levels and level thresholds

use super::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 1,
    Debug = 2,
    #[default]
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            Level::Trace => BrightBlack,
            Level::Debug => Blue,
            Level::Info => Green,
            Level::Warn => Yellow,
            Level::Error => Red,
            Level::Fatal => BrightRed,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for Level {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            _ => Err(PipelineError::InvalidLevel(s.to_string())),
        }
    }
}

/// Minimum severity a logger lets through.
///
/// `All` enables every level and `Off` disables every level; the remaining
/// variants mirror [`Level`] one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub enum LevelFilter {
    All = 0,
    Trace = 1,
    Debug = 2,
    #[default]
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
    Off = 7,
}

impl LevelFilter {
    /// Whether an event at `level` passes this threshold
    #[inline]
    pub fn allows(self, level: Level) -> bool {
        level as u8 >= self as u8
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            LevelFilter::All => "ALL",
            LevelFilter::Off => "OFF",
            LevelFilter::Trace => "TRACE",
            LevelFilter::Debug => "DEBUG",
            LevelFilter::Info => "INFO",
            LevelFilter::Warn => "WARN",
            LevelFilter::Error => "ERROR",
            LevelFilter::Fatal => "FATAL",
        }
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LevelFilter::Trace,
            Level::Debug => LevelFilter::Debug,
            Level::Info => LevelFilter::Info,
            Level::Warn => LevelFilter::Warn,
            Level::Error => LevelFilter::Error,
            Level::Fatal => LevelFilter::Fatal,
        }
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for LevelFilter {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALL" => Ok(LevelFilter::All),
            "OFF" | "NONE" => Ok(LevelFilter::Off),
            _ => s.parse::<Level>().map(LevelFilter::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_bounds() {
        for level in Level::ALL {
            assert!(LevelFilter::All.allows(level));
            assert!(!LevelFilter::Off.allows(level));
        }
    }

    #[test]
    fn test_filter_threshold() {
        assert!(!LevelFilter::Warn.allows(Level::Info));
        assert!(LevelFilter::Warn.allows(Level::Warn));
        assert!(LevelFilter::Warn.allows(Level::Fatal));
    }

    #[test]
    fn test_parse() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("off".parse::<LevelFilter>().unwrap(), LevelFilter::Off);
        assert_eq!(" Debug ".parse::<LevelFilter>().unwrap(), LevelFilter::Debug);
        assert!(matches!(
            "loud".parse::<Level>(),
            Err(PipelineError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&LevelFilter::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let parsed: LevelFilter = serde_json::from_str("\"off\"").unwrap();
        assert_eq!(parsed, LevelFilter::Off);
    }
}
