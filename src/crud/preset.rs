use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Named caching behaviour for a CRUD screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePreset {
    /// Operational data edited by many users at once.
    FrequentlyChanging,
    #[default]
    OccasionallyChanging,
    /// Catalogs such as identity document types.
    RarelyChanging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub stale_time: Duration,
    pub refetch_on_window_focus: bool,
    pub refetch_on_mount: bool,
    pub refetch_on_reconnect: bool,
    pub optimistic_updates: bool,
}

/// Events that may cause a cached list to be fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefetchTrigger {
    WindowFocus,
    Mount,
    Reconnect,
}

impl CachePreset {
    pub const ALL: [CachePreset; 3] = [
        CachePreset::FrequentlyChanging,
        CachePreset::OccasionallyChanging,
        CachePreset::RarelyChanging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePreset::FrequentlyChanging => "frequently-changing",
            CachePreset::OccasionallyChanging => "occasionally-changing",
            CachePreset::RarelyChanging => "rarely-changing",
        }
    }

    pub fn settings(&self) -> CacheSettings {
        match self {
            CachePreset::FrequentlyChanging => CacheSettings {
                stale_time: Duration::from_secs(30),
                refetch_on_window_focus: true,
                refetch_on_mount: true,
                refetch_on_reconnect: true,
                optimistic_updates: false,
            },
            CachePreset::OccasionallyChanging => CacheSettings {
                stale_time: Duration::from_secs(5 * 60),
                refetch_on_window_focus: false,
                refetch_on_mount: true,
                refetch_on_reconnect: true,
                optimistic_updates: true,
            },
            CachePreset::RarelyChanging => CacheSettings {
                stale_time: Duration::from_secs(30 * 60),
                refetch_on_window_focus: false,
                refetch_on_mount: false,
                refetch_on_reconnect: true,
                optimistic_updates: true,
            },
        }
    }
}

impl CacheSettings {
    pub fn refetches_on(&self, trigger: RefetchTrigger) -> bool {
        match trigger {
            RefetchTrigger::WindowFocus => self.refetch_on_window_focus,
            RefetchTrigger::Mount => self.refetch_on_mount,
            RefetchTrigger::Reconnect => self.refetch_on_reconnect,
        }
    }
}

impl FromStr for CachePreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CachePreset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == s.trim())
            .ok_or_else(|| AppError::configuration(format!("unknown cache preset `{s}`")))
    }
}

impl std::fmt::Display for CachePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for preset in CachePreset::ALL {
            assert_eq!(preset.as_str().parse::<CachePreset>().expect("known name"), preset);
            let json = serde_json::to_string(&preset).expect("serializable");
            assert_eq!(json, format!("\"{}\"", preset.as_str()));
        }
    }

    #[test]
    fn volatile_data_is_never_optimistic() {
        let settings = CachePreset::FrequentlyChanging.settings();
        assert!(!settings.optimistic_updates);
        assert!(settings.refetches_on(RefetchTrigger::WindowFocus));
        assert!(CachePreset::RarelyChanging.settings().stale_time > settings.stale_time);
        assert!(!CachePreset::RarelyChanging.settings().refetches_on(RefetchTrigger::Mount));
    }
}
