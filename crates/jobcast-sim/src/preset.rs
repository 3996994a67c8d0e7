use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("preset '{name}' not found, available presets: {available:?}")]
    PresetNotFound { name: String, available: Vec<String> },

    #[error("preset '{name}' is invalid: {source}")]
    InvalidPreset {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("preset io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

fn default_agent_delay() -> [u64; 2] {
    [1000, 3000]
}

fn default_phase_delay() -> [u64; 2] {
    [500, 2000]
}

/// One agent inside a phase: a named sequence of task status messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique identifier within the phase
    pub id: String,
    /// Display name used in status messages
    pub name: String,
    /// Task status messages emitted in order
    pub tasks: Vec<String>,
    /// Min/max delay in ms between task updates
    #[serde(default = "default_agent_delay")]
    pub delay_range_ms: [u64; 2],
}

/// One ordered phase of a workflow, with the agents it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub id: String,
    pub name: String,
    /// Min/max delay in ms around phase transitions
    #[serde(default = "default_phase_delay")]
    pub delay_range_ms: [u64; 2],
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

/// Complete workflow definition loaded from a preset file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPreset {
    pub name: String,
    /// What this workflow simulates
    pub description: String,
    /// Ordered list of phases
    pub phases: Vec<PhaseConfig>,
}

impl WorkflowPreset {
    pub fn agent_count(&self) -> usize {
        self.phases.iter().map(|p| p.agents.len()).sum()
    }
}

/// Directory-backed store of `{name}.json` workflow presets
pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the presets bundled with this crate
    pub fn bundled() -> Self {
        Self::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("presets"))
    }

    /// Load and validate a preset by name (without the `.json` extension)
    pub fn load(&self, name: &str) -> Result<WorkflowPreset> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(SimError::PresetNotFound {
                name: name.to_string(),
                available: self.list(),
            });
        }

        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|source| SimError::InvalidPreset {
            name: name.to_string(),
            source,
        })
    }

    /// Names of every preset in the store, sorted
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().map(|s| s.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_presets_load() {
        let store = PresetStore::bundled();
        let names = store.list();
        assert!(names.contains(&"simple_pipeline".to_string()));
        assert!(names.contains(&"deep_research".to_string()));

        let preset = store.load("simple_pipeline").unwrap();
        assert_eq!(preset.name, "simple_pipeline");
        assert!(!preset.phases.is_empty());
    }

    #[test]
    fn test_unknown_preset_lists_available() {
        let store = PresetStore::bundled();
        let err = store.load("does-not-exist").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("does-not-exist"));
        assert!(message.contains("simple_pipeline"));
    }

    #[test]
    fn test_defaults_applied_when_omitted() {
        let preset: WorkflowPreset = serde_json::from_str(
            r#"{
                "name": "minimal",
                "description": "one phase, one agent",
                "phases": [
                    {
                        "id": "p1",
                        "name": "Phase One",
                        "agents": [
                            {"id": "a1", "name": "Agent One", "tasks": ["working"]}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(preset.phases[0].delay_range_ms, [500, 2000]);
        assert_eq!(preset.phases[0].agents[0].delay_range_ms, [1000, 3000]);
        assert_eq!(preset.agent_count(), 1);
    }
}
