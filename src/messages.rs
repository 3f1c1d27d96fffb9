// Report types for a sequencer run

use serde::Serialize;

/// Motion phases, in the order a run executes them
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Arm,
    Home,
    RunPattern,
    Unload,
}

/// What a completed run did
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunSummary {
    pub phases: Vec<PhaseKind>,
    /// Goal-position moves that were confirmed stopped
    pub moves: usize,
}
