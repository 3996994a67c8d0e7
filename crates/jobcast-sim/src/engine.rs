use std::time::{Duration, Instant};

use jobcast_events::JobContext;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::preset::{AgentConfig, PhaseConfig, WorkflowPreset};

/// Statistics from one completed simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRunResult {
    pub preset_name: String,
    pub phases_completed: usize,
    pub agents_executed: u64,
    pub total_events: u64,
    pub elapsed_seconds: f64,
}

/// Executes workflow presets against a job's event sink with randomized
/// timing, simulating a multi-agent run.
///
/// Every step write counts toward `total_events`. Sink failures are logged
/// and skipped; a simulation never aborts because the backend dropped a
/// write.
pub struct WorkflowSimulator {
    job: JobContext,
    timing_multiplier: f64,
    event_count: u64,
    agents_executed: u64,
}

impl WorkflowSimulator {
    /// `timing_multiplier` scales every delay: 0.5 runs twice as fast,
    /// 2.0 twice as slow, 0.0 disables sleeping entirely.
    pub fn new(job: JobContext, timing_multiplier: f64) -> Self {
        Self {
            job,
            timing_multiplier,
            event_count: 0,
            agents_executed: 0,
        }
    }

    /// Run a workflow preset to completion
    pub async fn run(&mut self, preset: &WorkflowPreset) -> SimulationRunResult {
        let started = Instant::now();
        self.event_count = 0;
        self.agents_executed = 0;

        info!(preset = %preset.name, phases = preset.phases.len(), "starting workflow simulation");

        let workflow_step_id = format!("workflow:{}", preset.name);
        self.emit(
            &workflow_step_id,
            &format!("Starting workflow: {}", preset.description),
            false,
        )
        .await;

        for phase in &preset.phases {
            self.execute_phase(phase).await;
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.emit(
            &workflow_step_id,
            &format!("Workflow completed in {elapsed:.1}s"),
            true,
        )
        .await;

        SimulationRunResult {
            preset_name: preset.name.clone(),
            phases_completed: preset.phases.len(),
            agents_executed: self.agents_executed,
            total_events: self.event_count,
            elapsed_seconds: elapsed,
        }
    }

    async fn execute_phase(&mut self, phase: &PhaseConfig) {
        let phase_step_id = format!("phase:{}", phase.id);

        self.emit(&phase_step_id, &format!("{} started", phase.name), false)
            .await;
        self.random_delay(phase.delay_range_ms).await;

        for agent in &phase.agents {
            self.execute_agent(&phase.id, agent).await;
        }

        self.random_delay(phase.delay_range_ms).await;
        self.emit(&phase_step_id, &format!("{} completed", phase.name), true)
            .await;
    }

    async fn execute_agent(&mut self, phase_id: &str, agent: &AgentConfig) {
        let agent_step_id = format!("agent:{phase_id}:{}", agent.id);

        self.emit(&agent_step_id, &format!("{} started", agent.name), false)
            .await;

        for (i, task) in agent.tasks.iter().enumerate() {
            self.random_delay(agent.delay_range_ms).await;
            let task_step_id = format!("{agent_step_id}:task-{}", i + 1);
            self.emit(&task_step_id, task, false).await;
            self.emit(&task_step_id, task, true).await;
        }

        self.random_delay(agent.delay_range_ms).await;
        self.emit(&agent_step_id, &format!("{} completed", agent.name), true)
            .await;
        self.agents_executed += 1;
    }

    async fn emit(&mut self, step_id: &str, message: &str, finished: bool) {
        self.event_count += 1;
        let result = if finished {
            self.job.sink.step_finished(step_id, message).await
        } else {
            self.job.sink.step_started(step_id, message).await
        };
        if let Err(e) = result {
            warn!(step_id, error = %e, "event sink write failed");
        }
    }

    async fn random_delay(&self, delay_range_ms: [u64; 2]) {
        if self.timing_multiplier <= 0.0 {
            return;
        }
        // The rng handle is not Send, so the draw stays out of the await.
        let drawn_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(delay_range_ms[0]..=delay_range_ms[1])
        };
        let scaled = (drawn_ms as f64 * self.timing_multiplier).round() as u64;
        tokio::time::sleep(Duration::from_millis(scaled)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jobcast_events::{MemorySink, StepPhase};

    use super::*;
    use crate::preset::PresetStore;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[tokio::test]
    async fn test_event_count_matches_sink_writes() {
        init_tracing();
        let preset = PresetStore::bundled().load("simple_pipeline").unwrap();

        let sink = Arc::new(MemorySink::new());
        let mut simulator = WorkflowSimulator::new(JobContext::new(sink.clone()), 0.0);
        let result = simulator.run(&preset).await;

        assert_eq!(result.preset_name, "simple_pipeline");
        assert_eq!(result.phases_completed, preset.phases.len());
        assert_eq!(result.agents_executed as usize, preset.agent_count());
        assert_eq!(result.total_events as usize, sink.len().await);
    }

    #[tokio::test]
    async fn test_emission_order_wraps_phases_and_agents() {
        init_tracing();
        let preset: WorkflowPreset = serde_json::from_str(
            r#"{
                "name": "tiny",
                "description": "one phase, one agent, one task",
                "phases": [
                    {
                        "id": "p1",
                        "name": "Phase",
                        "delay_range_ms": [0, 0],
                        "agents": [
                            {
                                "id": "a1",
                                "name": "Agent",
                                "tasks": ["doing the thing"],
                                "delay_range_ms": [0, 0]
                            }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        let sink = Arc::new(MemorySink::new());
        let mut simulator = WorkflowSimulator::new(JobContext::new(sink.clone()), 0.0);
        let result = simulator.run(&preset).await;

        let recorded = sink.recorded().await;
        let observed: Vec<(String, StepPhase)> = recorded
            .iter()
            .map(|s| (s.step_id.clone(), s.phase))
            .collect();

        assert_eq!(
            observed,
            vec![
                ("workflow:tiny".to_string(), StepPhase::Started),
                ("phase:p1".to_string(), StepPhase::Started),
                ("agent:p1:a1".to_string(), StepPhase::Started),
                ("agent:p1:a1:task-1".to_string(), StepPhase::Started),
                ("agent:p1:a1:task-1".to_string(), StepPhase::Finished),
                ("agent:p1:a1".to_string(), StepPhase::Finished),
                ("phase:p1".to_string(), StepPhase::Finished),
                ("workflow:tiny".to_string(), StepPhase::Finished),
            ]
        );
        assert_eq!(result.total_events, 8);
    }

    #[tokio::test]
    async fn test_sink_failures_do_not_abort_run() {
        init_tracing();
        let preset = PresetStore::bundled().load("simple_pipeline").unwrap();

        let sink = Arc::new(MemorySink::new());
        sink.fail_writes(true);
        let mut simulator = WorkflowSimulator::new(JobContext::new(sink.clone()), 0.0);
        let result = simulator.run(&preset).await;

        assert_eq!(result.phases_completed, preset.phases.len());
        assert!(sink.is_empty().await);
        assert!(result.total_events > 0);
    }
}
