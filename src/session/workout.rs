use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Exercise {
    pub fn describe(&self) -> String {
        match (self.reps, self.duration_secs) {
            (Some(reps), _) => format!("{} × {reps}", self.name),
            (None, Some(secs)) => format!("{} for {secs}s", self.name),
            (None, None) => self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutPhase {
    pub name: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phases: Vec<WorkoutPhase>,
}

impl WorkoutDefinition {
    pub fn total_exercises(&self) -> usize {
        self.phases.iter().map(|p| p.exercises.len()).sum()
    }
}

/// Position inside a workout. Walks phases in order, skipping empty ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub workout_id: String,
    pub phase_index: usize,
    pub exercise_index: usize,
    pub completed_exercises: usize,
}

impl WorkoutSession {
    pub fn start(workout: &WorkoutDefinition) -> Self {
        let mut session = Self {
            workout_id: workout.id.clone(),
            phase_index: 0,
            exercise_index: 0,
            completed_exercises: 0,
        };
        session.skip_empty_phases(workout);
        session
    }

    fn skip_empty_phases(&mut self, workout: &WorkoutDefinition) {
        while let Some(phase) = workout.phases.get(self.phase_index) {
            if self.exercise_index < phase.exercises.len() {
                break;
            }
            self.phase_index += 1;
            self.exercise_index = 0;
        }
    }

    pub fn is_complete(&self, workout: &WorkoutDefinition) -> bool {
        self.phase_index >= workout.phases.len()
    }

    pub fn current<'a>(
        &self,
        workout: &'a WorkoutDefinition,
    ) -> Option<(&'a WorkoutPhase, &'a Exercise)> {
        let phase = workout.phases.get(self.phase_index)?;
        let exercise = phase.exercises.get(self.exercise_index)?;
        Some((phase, exercise))
    }

    /// Mark the current exercise done. Returns true once the workout is over.
    pub fn complete_exercise(&mut self, workout: &WorkoutDefinition) -> bool {
        if self.is_complete(workout) {
            return true;
        }
        self.completed_exercises += 1;
        self.exercise_index += 1;
        self.skip_empty_phases(workout);
        self.is_complete(workout)
    }

    pub fn progress(&self, workout: &WorkoutDefinition) -> f64 {
        let total = workout.total_exercises();
        if total == 0 {
            return 1.0;
        }
        (self.completed_exercises as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn snapshot(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// `None` when the data is unreadable or points outside `workout`.
    pub fn restore(workout: &WorkoutDefinition, data: Map<String, Value>) -> Option<Self> {
        let session: WorkoutSession = serde_json::from_value(Value::Object(data)).ok()?;
        if session.workout_id != workout.id
            || session.completed_exercises > workout.total_exercises()
        {
            return None;
        }
        if session.is_complete(workout) || session.current(workout).is_some() {
            Some(session)
        } else {
            None
        }
    }
}
