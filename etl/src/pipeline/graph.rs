use std::collections::BTreeMap;
use std::fmt;

use etl_config::shared::StageSwitches;

use crate::pipeline::stage::Stage;

/// Whether and why a stage runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Switched on in the configuration.
    Enabled,
    /// Switched off, but required by the listed stages.
    Forced { by: Vec<Stage> },
    /// Switched off and required by no running stage.
    Disabled,
}

impl Disposition {
    pub fn runs(&self) -> bool {
        !matches!(self, Disposition::Disabled)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Enabled => write!(f, "enabled"),
            Disposition::Forced { by } => {
                let by = by.iter().map(|stage| stage.as_str()).collect::<Vec<_>>().join(", ");
                write!(f, "forced by {by}")
            }
            Disposition::Disabled => write!(f, "disabled"),
        }
    }
}

/// The stages of a run with their resolved dispositions, in execution order.
///
/// Resolution walks the stages from last to first so that a stage forced on by a later one
/// forces its own dependencies in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    steps: Vec<(Stage, Disposition)>,
}

impl ExecutionPlan {
    pub fn resolve(switches: &StageSwitches) -> ExecutionPlan {
        let mut dispositions: BTreeMap<Stage, Disposition> = Stage::ALL
            .into_iter()
            .map(|stage| {
                let disposition = if stage.is_switched_on(switches) {
                    Disposition::Enabled
                } else {
                    Disposition::Disabled
                };
                (stage, disposition)
            })
            .collect();

        for stage in Stage::ALL.into_iter().rev() {
            let runs = dispositions
                .get(&stage)
                .is_some_and(Disposition::runs);
            if !runs {
                continue;
            }

            for dependency in stage.dependencies() {
                match dispositions.get_mut(dependency) {
                    Some(Disposition::Enabled) | None => {}
                    Some(Disposition::Forced { by }) => by.insert(0, stage),
                    Some(disposition @ Disposition::Disabled) => {
                        *disposition = Disposition::Forced { by: vec![stage] };
                    }
                }
            }
        }

        ExecutionPlan {
            steps: dispositions.into_iter().collect(),
        }
    }

    pub fn steps(&self) -> &[(Stage, Disposition)] {
        &self.steps
    }

    pub fn disposition(&self, stage: Stage) -> &Disposition {
        self.steps
            .iter()
            .find(|(candidate, _)| *candidate == stage)
            .map(|(_, disposition)| disposition)
            .unwrap_or(&Disposition::Disabled)
    }

    pub fn runs(&self, stage: Stage) -> bool {
        self.disposition(stage).runs()
    }
}
