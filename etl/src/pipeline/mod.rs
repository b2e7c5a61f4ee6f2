//! Sequencing of the stages of a materialization run.

mod controller;
mod graph;
mod report;
mod runner;
mod stage;

pub use controller::PipelineController;
pub use graph::{Disposition, ExecutionPlan};
pub use report::{PipelineReport, StageRecord, StageStatus};
pub use runner::{DefaultStageRunner, StageOutput, StageRunner};
pub use stage::Stage;
