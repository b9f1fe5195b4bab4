//! Run goals and stop reasons.
//!
//! A generative run keeps going until it has executed at least
//! `min_tests` tests AND at least `wall_clock_secs` have elapsed,
//! whichever comes later.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunGoals {
    /// Minimum number of tests to execute.
    pub min_tests: u64,
    /// Minimum wall-clock duration of the run.
    pub wall_clock_secs: u64,
}

impl Default for RunGoals {
    fn default() -> Self {
        Self {
            min_tests: 100,
            wall_clock_secs: 60,
        }
    }
}

/// Reason a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Both the test-count and the wall-clock goal were met.
    GoalsReached,
    /// The kill flag was raised.
    Killed,
    /// Every predefined test ran.
    SuiteComplete,
    /// The generator had no more vectors to offer.
    GeneratorExhausted,
}

/// Tracks progress against [`RunGoals`].
pub struct GoalTracker {
    goals: RunGoals,
    start: Instant,
}

impl GoalTracker {
    pub fn new(goals: RunGoals) -> Self {
        Self {
            goals,
            start: Instant::now(),
        }
    }

    /// True while either goal is still unmet.
    pub fn should_continue(&self, tests_run: u64) -> bool {
        tests_run < self.goals.min_tests || self.elapsed() < self.wall_clock()
    }

    /// Progress in `[0, 1]`: the lagging goal's fraction.
    pub fn percent_complete(&self, tests_run: u64) -> f64 {
        let tests = fraction(tests_run as f64, self.goals.min_tests as f64);
        let time = fraction(
            self.elapsed().as_secs_f64(),
            self.wall_clock().as_secs_f64(),
        );
        tests.min(time)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn goals(&self) -> &RunGoals {
        &self.goals
    }

    fn wall_clock(&self) -> Duration {
        Duration::from_secs(self.goals.wall_clock_secs)
    }
}

fn fraction(done: f64, goal: f64) -> f64 {
    if goal <= 0.0 {
        1.0
    } else {
        (done / goal).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_goal_alone() {
        let tracker = GoalTracker::new(RunGoals {
            min_tests: 3,
            wall_clock_secs: 0,
        });
        assert!(tracker.should_continue(0));
        assert!(tracker.should_continue(2));
        assert!(!tracker.should_continue(3));
        assert_eq!(tracker.percent_complete(3), 1.0);
    }

    #[test]
    fn test_wall_clock_outlasts_count() {
        let tracker = GoalTracker::new(RunGoals {
            min_tests: 1,
            wall_clock_secs: 3600,
        });
        assert!(tracker.should_continue(1_000));
        assert!(tracker.percent_complete(1_000) < 0.01);
    }

    #[test]
    fn test_percent_tracks_lagging_goal() {
        let tracker = GoalTracker::new(RunGoals {
            min_tests: 10,
            wall_clock_secs: 0,
        });
        assert_eq!(tracker.percent_complete(5), 0.5);
        assert_eq!(tracker.percent_complete(50), 1.0);
    }
}
