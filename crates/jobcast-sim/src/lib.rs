//! Preset-driven workflow simulator.
//!
//! Loads JSON workflow presets (phases, agents, tasks) and replays them
//! against a job's [`jobcast_events::EventSink`] with randomized, scalable
//! timing. Useful for exercising event backends and progress UIs without a
//! live model.

pub mod engine;
pub mod preset;

pub use engine::{SimulationRunResult, WorkflowSimulator};
pub use preset::{AgentConfig, PhaseConfig, PresetStore, Result, SimError, WorkflowPreset};
