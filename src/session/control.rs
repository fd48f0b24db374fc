use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::PostResult;
use crate::frame_buffer::FrameBuffer;
use crate::session::RenderStatus;

/// A renderer that fills a frame buffer on its own worker thread.
pub trait AsyncRenderContext: Send {
    /// Start (or keep) the worker filling `frame_buffer`. The worker reports through `control`.
    fn start(&mut self, frame_buffer: Arc<FrameBuffer>, control: RenderControl) -> PostResult<()>;

    /// Stop the worker. Must not return until the worker thread has exited.
    fn stop(&mut self);

    /// A worker thread is alive.
    fn is_running(&self) -> bool;

    /// A new, idle context of the same kind, used when a session is cloned.
    fn idle_clone(&self) -> Box<dyn AsyncRenderContext>;
}

#[derive(Debug)]
pub(crate) struct StatusCell {
    pub(crate) status: RenderStatus,
    pub(crate) error: Option<String>,
    pub(crate) started: Option<Instant>,
    pub(crate) ended: Option<Instant>,
    pub(crate) progress: f32,
}

/// State shared by a session and its worker.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) cell: Mutex<StatusCell>,
    pub(crate) changed: Condvar,
}

impl SessionShared {
    pub(crate) fn new(status: RenderStatus) -> Arc<Self> {
        Arc::new(Self {
            cell: Mutex::new(StatusCell {
                status,
                error: None,
                started: None,
                ended: None,
                progress: 0.0,
            }),
            changed: Condvar::new(),
        })
    }

    pub(crate) fn status(&self) -> RenderStatus {
        self.cell.lock().status
    }

    /// Move to `next` if `accept(current)` holds and the state machine allows it.
    pub(crate) fn transition_if(
        &self,
        next: RenderStatus,
        accept: impl FnOnce(RenderStatus) -> bool,
    ) -> bool {
        let mut cell = self.cell.lock();
        let current = cell.status;
        if !accept(current) || !current.can_transition_to(next) {
            return false;
        }
        cell.status = next;
        if next.is_terminal() {
            cell.ended = Some(Instant::now());
        }
        drop(cell);
        self.changed.notify_all();
        tracing::debug!(from = ?current, to = ?next, "render status");
        true
    }

    pub(crate) fn transition(&self, next: RenderStatus) -> bool {
        self.transition_if(next, |_| true)
    }
}

/// The worker's handle onto its session.
///
/// Carries the cancel token for this rendering attempt, the pause gate and the completion
/// reporting. Cloning is cheap; every clone refers to the same attempt.
#[derive(Clone, Debug)]
pub struct RenderControl {
    shared: Arc<SessionShared>,
    cancel: CancelToken,
}

impl RenderControl {
    pub(crate) fn new(shared: Arc<SessionShared>, cancel: CancelToken) -> Self {
        Self { shared, cancel }
    }

    /// A control not attached to any session, for driving a renderer directly.
    pub fn detached() -> Self {
        Self::new(SessionShared::new(RenderStatus::Rendering), CancelToken::new())
    }

    /// Cancellation flag of this attempt.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Stop was requested.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Request the worker to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
        // wake a worker parked in `wait_if_paused`
        let _cell = self.shared.cell.lock();
        self.shared.changed.notify_all();
    }

    /// Current session status.
    pub fn status(&self) -> RenderStatus {
        self.shared.status()
    }

    /// Block while the session is paused or waiting. Returns `false` if the attempt was
    /// canceled meanwhile.
    pub fn wait_if_paused(&self) -> bool {
        let mut cell = self.shared.cell.lock();
        while matches!(cell.status, RenderStatus::Paused | RenderStatus::Waiting)
            && !self.cancel.is_canceled()
        {
            self.shared.changed.wait(&mut cell);
        }
        !self.cancel.is_canceled()
    }

    /// Sleep up to `interval`, waking early on cancel. Returns `false` once canceled.
    pub fn pause_for(&self, interval: Duration) -> bool {
        !self.cancel.wait_timeout(interval)
    }

    /// Record progress in `[0, 1]`.
    pub fn report_progress(&self, fraction: f32) {
        self.shared.cell.lock().progress = fraction.clamp(0.0, 1.0);
    }

    /// The worker finished every unit of work. Ignored once canceled.
    pub fn complete(&self) {
        if self.cancel.is_canceled() {
            return;
        }
        self.shared.cell.lock().progress = 1.0;
        self.shared
            .transition_if(RenderStatus::Completed, RenderStatus::is_active);
    }

    /// The worker hit an internal error.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "renderer failed");
        self.shared.cell.lock().error = Some(message);
        self.shared
            .transition_if(RenderStatus::Failed, RenderStatus::is_active);
    }
}
