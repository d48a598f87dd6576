//! Run fingerprint
//!
//! An auditable record of which providers served a request, emitted on every
//! response so a plan's trust level can be assessed after the fact.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunMode {
    Realtime,
    #[default]
    Degraded,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realtime => write!(f, "REALTIME"),
            Self::Degraded => write!(f, "DEGRADED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub run_mode: RunMode,
    pub poi_provider: String,
    pub route_provider: String,
    pub llm_provider: String,
    pub strict_external_data: bool,
    pub env_source: String,
    pub trace_id: String,
}

impl RunFingerprint {
    /// A request ran realtime only when both map-backed providers served it
    /// and the LLM was not in template mode.
    pub fn compute_run_mode(poi_provider: &str, route_provider: &str, llm_provider: &str) -> RunMode {
        let degraded = poi_provider != "mapreal"
            || route_provider != "real"
            || llm_provider == "template"
            || route_provider.contains("fallback");
        if degraded {
            RunMode::Degraded
        } else {
            RunMode::Realtime
        }
    }
}

impl Default for RunFingerprint {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Degraded,
            poi_provider: "curated".to_string(),
            route_provider: "fixture".to_string(),
            llm_provider: "template".to_string(),
            strict_external_data: false,
            env_source: ".env".to_string(),
            trace_id: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_realtime_requires_all_providers() {
        assert_eq!(
            RunFingerprint::compute_run_mode("mapreal", "real", "openai"),
            RunMode::Realtime
        );
        assert_eq!(
            RunFingerprint::compute_run_mode("curated", "real", "openai"),
            RunMode::Degraded
        );
        assert_eq!(
            RunFingerprint::compute_run_mode("mapreal", "fixture", "openai"),
            RunMode::Degraded
        );
        assert_eq!(
            RunFingerprint::compute_run_mode("mapreal", "real", "template"),
            RunMode::Degraded
        );
    }

    #[test]
    fn test_fingerprint_round_trip() {
        let fp = RunFingerprint {
            trace_id: "abc123".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&fp).unwrap();
        let back: RunFingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }
}
