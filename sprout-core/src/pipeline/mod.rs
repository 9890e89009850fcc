//! Language-model pipeline stages
//!
//! Every stage turns its own failures into a safe default instead of an
//! error: the gate and reviewer reject, the synthesizer returns a stub,
//! the analyzer returns an empty plan and the modifier returns the file
//! unchanged.

pub mod analyzer;
pub mod changes;
pub mod gate;
pub mod modifier;
pub mod reviewer;
pub mod synthesizer;

pub use analyzer::{Complexity, ImpactAnalysis, ImpactAnalyzer};
pub use changes::{apply_change_set, AppliedChanges, ChangeOutcome, ChangePipeline, ChangeRun};
pub use gate::{GateVerdict, SafetyGate};
pub use modifier::ModificationSynthesizer;
pub use reviewer::{preview_changes, ChangeReviewer, ReviewReport, RiskLevel};
pub use synthesizer::{Artifact, CodeSynthesizer};
