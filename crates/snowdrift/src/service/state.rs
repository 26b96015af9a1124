use std::fmt;

/// Lifecycle of the failure-handling service.
///
/// Transitions only move forward:
/// `New -> Starting -> Running -> Stopping -> Terminated`, with
/// `New -> Terminated` when a service is stopped before it was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceState {
    New,
    Starting,
    Running,
    Stopping,
    Terminated,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::New => "new",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Terminated => "terminated",
        }
    }

    /// Whether the service is past steady state.
    pub fn is_shutting_down(&self) -> bool {
        *self >= ServiceState::Stopping
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
