use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5500";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection and input settings, read from `STUDY_PLANNER_*` variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannerConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub debounce_ms: i64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debounce_ms: planner_core::model::DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl PlannerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank or unparsable values fall back to defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let base_url = lookup("STUDY_PLANNER_API_URL")
            .filter(|v| !v.trim().is_empty())
            .map_or(defaults.base_url, |v| v.trim().to_owned());
        let timeout = lookup("STUDY_PLANNER_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(defaults.timeout, Duration::from_secs);
        let debounce_ms = lookup("STUDY_PLANNER_DEBOUNCE_MS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|ms| *ms >= 0)
            .unwrap_or(defaults.debounce_ms);
        Self {
            base_url,
            timeout,
            debounce_ms,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_and_falls_back() {
        let vars: HashMap<&str, &str> = [
            ("STUDY_PLANNER_API_URL", "https://planner.example/"),
            ("STUDY_PLANNER_TIMEOUT_SECS", "zero"),
            ("STUDY_PLANNER_DEBOUNCE_MS", "250"),
        ]
        .into_iter()
        .collect();
        let config = PlannerConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.base_url, "https://planner.example/");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(
            config.endpoint("/api/plans"),
            "https://planner.example/api/plans"
        );
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(PlannerConfig::from_lookup(|_| None), PlannerConfig::default());
    }
}
