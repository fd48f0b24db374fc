/// Lifecycle state of a [`RenderSession`](crate::RenderSession).
///
/// `Quiescent → Initializing → Rendering → {Completed | Canceled | Aborted | Failed}`, with
/// `Paused` and `Waiting` as side states of `Rendering`. Any state may be torn down through
/// `Disposed → Deleted`, which is irreversible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    /// Created, never started.
    #[default]
    Quiescent,
    /// The renderer is being set up.
    Initializing,
    /// The worker is producing pixels.
    Rendering,
    /// The worker is parked until resumed.
    Paused,
    /// An interactive command waits for user input.
    Waiting,
    /// Finished every unit of work.
    Completed,
    /// Stopped on user request.
    Canceled,
    /// Force-stopped because the document went away.
    Aborted,
    /// The renderer reported an internal error.
    Failed,
    /// Resources released; only deletion remains.
    Disposed,
    /// Gone.
    Deleted,
}

impl RenderStatus {
    /// One of the four end states of a rendering attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Aborted | Self::Failed
        )
    }

    /// A worker may be alive in this state.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::Rendering | Self::Paused | Self::Waiting
        )
    }

    /// `Disposed` or `Deleted`.
    pub fn is_torn_down(self) -> bool {
        matches!(self, Self::Disposed | Self::Deleted)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use RenderStatus::*;
        match (self, next) {
            (Deleted, _) => false,
            (Disposed, Deleted) => true,
            (Disposed, _) => false,
            (_, Disposed) => true,
            (Quiescent, Initializing) => true,
            (s, Initializing) if s.is_terminal() => true,
            (Initializing, Rendering) => true,
            (Rendering, Paused | Waiting) => true,
            (Paused | Waiting, Rendering) => true,
            (s, t) if s.is_active() && t.is_terminal() => true,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/status.rs"]
mod tests;
