//! Status aggregation for ExerciseSets.

use kubeteach_core::{ExerciseSetStatus, TaskDefinitionStatus, TaskState};
use serde_json::{Value, json};

/// Folds `(declared points, observed state)` pairs into an [`ExerciseSetStatus`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusAggregator {
    status: ExerciseSetStatus,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts one TaskDefinition.
    ///
    /// A missing state counts as unknown. An unrecognised state also counts
    /// as unknown and is logged.
    pub fn observe(&mut self, name: &str, points: u32, observed: &TaskDefinitionStatus) {
        let s = &mut self.status;
        s.number_of_tasks += 1;
        s.points_total += u64::from(points);
        if points == 0 {
            s.number_of_tasks_without_points += 1;
        }

        let parsed = match observed.task_state() {
            Some(Ok(state)) => Some(state),
            Some(Err(_)) => {
                tracing::warn!(
                    task = %name,
                    state = observed.state.as_deref().unwrap_or_default(),
                    "unrecognised task state, counting as unknown"
                );
                None
            }
            None => None,
        };

        match parsed {
            Some(TaskState::Active) => s.number_of_active_tasks += 1,
            Some(TaskState::Pending) => s.number_of_pending_tasks += 1,
            Some(TaskState::Successful) => {
                s.number_of_successful_tasks += 1;
                s.points_achieved += u64::from(points);
            }
            None => s.number_of_unknown_tasks += 1,
        }
    }

    pub fn finish(self) -> ExerciseSetStatus {
        self.status
    }
}

/// Merge patch replacing every aggregate counter.
pub fn status_patch(status: &ExerciseSetStatus) -> Value {
    json!({
        "status": {
            "numberOfTasks": status.number_of_tasks,
            "numberOfActiveTasks": status.number_of_active_tasks,
            "numberOfPendingTasks": status.number_of_pending_tasks,
            "numberOfSuccessfulTasks": status.number_of_successful_tasks,
            "numberOfUnknownTasks": status.number_of_unknown_tasks,
            "numberOfTasksWithoutPoints": status.number_of_tasks_without_points,
            "pointsTotal": status.points_total,
            "pointsAchieved": status.points_achieved,
        }
    })
}
