use std::fmt;

/// Where a node is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    /// Configured, nothing attempted yet.
    Created,

    /// Initial membership resolved.
    Bootstrapped,

    /// Engine ready and serving.
    Running,

    /// Leaving the cluster and stopping the engine.
    ShuttingDown,

    /// Shut down gracefully.
    Stopped,

    /// Ended by a failure.
    Errored,
}

impl Phase {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Bootstrapped => "bootstrapped",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        };

        f.write_str(name)
    }
}
