//! Periodic task scheduler
//!
//! A small table of named periodic tasks evaluated once per scheduling
//! tick. The scheduler only reports which tasks are due; the caller runs
//! them in the order returned.

use std::fmt;
use std::time::Duration;

/// Named periodic tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Gateway status summary
    StatusReport,
    /// Backend link heartbeat
    Heartbeat,
    /// Node measurement cadence
    Measurement,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::StatusReport => write!(f, "status-report"),
            TaskKind::Heartbeat => write!(f, "heartbeat"),
            TaskKind::Measurement => write!(f, "measurement"),
        }
    }
}

/// One registered task
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    /// Task name
    pub kind: TaskKind,
    /// Interval between runs
    pub period: Duration,
    /// Time of last run, or of registration
    pub last_run_millis: u64,
}

impl PeriodicTask {
    /// Whether the period has elapsed at `now`
    pub fn is_due(&self, now_millis: u64) -> bool {
        now_millis.saturating_sub(self.last_run_millis) >= self.period.as_millis() as u64
    }
}

/// Table of periodic tasks
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task whose first run is one period after `now`
    ///
    /// Registering a kind again replaces its period and restarts it.
    pub fn register(&mut self, kind: TaskKind, period: Duration, now_millis: u64) {
        self.tasks.retain(|t| t.kind != kind);
        self.tasks.push(PeriodicTask {
            kind,
            period,
            last_run_millis: now_millis,
        });
    }

    /// Tasks due at `now`, in registration order. Each is marked as run.
    pub fn due(&mut self, now_millis: u64) -> Vec<TaskKind> {
        let mut due = Vec::new();
        for task in &mut self.tasks {
            if task.is_due(now_millis) {
                task.last_run_millis = now_millis;
                due.push(task.kind);
            }
        }
        due
    }

    /// Registered task of a kind
    pub fn task(&self, kind: TaskKind) -> Option<&PeriodicTask> {
        self.tasks.iter().find(|t| t.kind == kind)
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is registered
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
