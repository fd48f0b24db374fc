//! Render sessions: the lifecycle state machine around one rendering attempt.

mod control;
mod registry;
mod status;

pub use control::{AsyncRenderContext, RenderControl};
pub use registry::{RendererFactory, RendererRegistry, SessionRegistry, SharedSession};
pub use status::RenderStatus;

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::{PipelineOpts, RenderSessionOpts};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::PixelSize;
use crate::foundation::error::{PostError, PostResult};
use crate::frame_buffer::FrameBuffer;
use crate::pipeline::{
    CreationFlags, ExecuteOpts, ExecuteReport, ExecutionContext, PostEffectPipeline,
};
use crate::post_effect::PostEffectCollection;
use control::SessionShared;

/// One rendering attempt: a frame buffer, the renderer filling it and the status machine.
///
/// Stopping is synchronous: [`RenderSession::stop_rendering`], [`RenderSession::abort`],
/// [`RenderSession::dispose`] and dropping the session all join the worker before returning.
pub struct RenderSession {
    id: Uuid,
    engine_id: Uuid,
    document: String,
    frame_buffer: Arc<FrameBuffer>,
    renderer: Box<dyn AsyncRenderContext>,
    shared: Arc<SessionShared>,
    control: Option<RenderControl>,
    opts: RenderSessionOpts,
    was_canceled: bool,
    quiet: bool,
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("id", &self.id)
            .field("engine_id", &self.engine_id)
            .field("document", &self.document)
            .field("status", &self.status())
            .field("was_canceled", &self.was_canceled)
            .finish_non_exhaustive()
    }
}

impl RenderSession {
    /// New quiescent session with its own frame buffer of `size`.
    pub fn new(
        engine_id: Uuid,
        document: impl Into<String>,
        size: PixelSize,
        renderer: Box<dyn AsyncRenderContext>,
        opts: RenderSessionOpts,
    ) -> PostResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            engine_id,
            document: document.into(),
            frame_buffer: Arc::new(FrameBuffer::new(size)?),
            renderer,
            shared: SessionShared::new(RenderStatus::Quiescent),
            control: None,
            opts,
            was_canceled: false,
            quiet: false,
        })
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Render engine that produced the session.
    pub fn engine_id(&self) -> Uuid {
        self.engine_id
    }

    /// Name of the rendered document.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// The frame buffer the worker renders into.
    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.frame_buffer
    }

    /// Current status.
    pub fn status(&self) -> RenderStatus {
        self.shared.status()
    }

    /// Message of the last renderer failure.
    pub fn error(&self) -> Option<String> {
        self.shared.cell.lock().error.clone()
    }

    /// Last progress reported by the worker, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.shared.cell.lock().progress
    }

    /// Start the renderer. Allowed from `Quiescent` and from any end state (a re-render).
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub fn start_rendering(&mut self) -> PostResult<()> {
        let status = self.status();
        if !status.can_transition_to(RenderStatus::Initializing) {
            return Err(PostError::session(format!(
                "cannot start rendering while {status:?}"
            )));
        }
        // reap a worker that already finished on its own
        self.renderer.stop();
        self.was_canceled = false;
        {
            let mut cell = self.shared.cell.lock();
            cell.error = None;
            cell.progress = 0.0;
            cell.started = Some(Instant::now());
            cell.ended = None;
        }
        self.shared.transition(RenderStatus::Initializing);

        let control = RenderControl::new(Arc::clone(&self.shared), CancelToken::new());
        self.control = Some(control.clone());
        if let Err(e) = self.renderer.start(Arc::clone(&self.frame_buffer), control) {
            tracing::warn!(error = %e, "renderer failed to start");
            self.shared.cell.lock().error = Some(e.to_string());
            self.shared.transition(RenderStatus::Failed);
            return Err(e);
        }
        self.shared
            .transition_if(RenderStatus::Rendering, |s| s == RenderStatus::Initializing);
        Ok(())
    }

    /// Cancel the rendering and wait for the worker to exit.
    ///
    /// Ends in `Canceled` unless the session already reached an end state, and marks the
    /// session as canceled by the user.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub fn stop_rendering(&mut self) {
        if self.halt(RenderStatus::Canceled) {
            self.was_canceled = true;
        }
    }

    /// Force-stop because the document is closing. Ends in `Aborted`.
    pub fn abort(&mut self) {
        if self.halt(RenderStatus::Aborted) {
            tracing::warn!(session = %self.id, "rendering aborted");
        }
    }

    fn halt(&mut self, end: RenderStatus) -> bool {
        if let Some(control) = &self.control {
            control.cancel();
        }
        self.renderer.stop();
        self.shared.transition_if(end, RenderStatus::is_active)
    }

    /// Park the worker at its next unit of work.
    pub fn pause(&self) -> PostResult<()> {
        self.side_state(RenderStatus::Rendering, RenderStatus::Paused)
    }

    /// Release a paused worker.
    pub fn resume(&self) -> PostResult<()> {
        self.side_state(RenderStatus::Paused, RenderStatus::Rendering)
    }

    /// Enter or leave the `Waiting` side state of an interactive command.
    pub fn set_waiting(&self, waiting: bool) -> PostResult<()> {
        if waiting {
            self.side_state(RenderStatus::Rendering, RenderStatus::Waiting)
        } else {
            self.side_state(RenderStatus::Waiting, RenderStatus::Rendering)
        }
    }

    fn side_state(&self, from: RenderStatus, to: RenderStatus) -> PostResult<()> {
        if self.shared.transition_if(to, |s| s == from) {
            Ok(())
        } else {
            Err(PostError::session(format!(
                "cannot move to {to:?} while {:?}",
                self.status()
            )))
        }
    }

    /// Block until the session leaves the active states or `timeout` passes. Returns the
    /// status seen last.
    pub fn wait_for_terminal(&self, timeout: Duration) -> RenderStatus {
        let deadline = Instant::now() + timeout;
        let mut cell = self.shared.cell.lock();
        while cell.status.is_active() {
            if self.shared.changed.wait_until(&mut cell, deadline).timed_out() {
                break;
            }
        }
        cell.status
    }

    /// The last attempt was stopped by the user.
    pub fn was_canceled(&self) -> bool {
        self.was_canceled
    }

    /// Override the user-stop marker.
    pub fn set_was_canceled(&mut self, canceled: bool) {
        self.was_canceled = canceled;
    }

    /// The host should not prompt or report for this session.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Mark the session quiet.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Wall time of the last attempt, up to now while it is still running.
    pub fn elapsed(&self) -> Duration {
        let cell = self.shared.cell.lock();
        match cell.started {
            Some(start) => cell
                .ended
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    /// Whether the last result is worth offering to save.
    ///
    /// Completed renderings always are. Canceled and aborted ones are when they ran for at
    /// least [`RenderSessionOpts::valuable_after`]. Failed ones never are.
    pub fn is_last_rendering_valuable(&self) -> bool {
        match self.status() {
            RenderStatus::Completed => true,
            RenderStatus::Canceled | RenderStatus::Aborted => {
                self.elapsed() >= self.opts.valuable_after()
            }
            _ => false,
        }
    }

    /// Stop any worker and release the renderer's resources. Irreversible.
    pub fn dispose(&mut self) {
        if self.status().is_torn_down() {
            return;
        }
        if self.status().is_active() {
            self.stop_rendering();
        }
        self.renderer.stop();
        self.control = None;
        self.shared.transition(RenderStatus::Disposed);
    }

    /// Dispose if needed, then mark the session deleted.
    pub fn delete(&mut self) {
        self.dispose();
        self.shared.transition(RenderStatus::Deleted);
    }

    /// Start building a copy of this session. The frame buffer is deep-copied now.
    pub fn begin_clone(&self) -> PostResult<SessionCloneBuilder<'_>> {
        if self.status().is_torn_down() {
            return Err(PostError::session("cannot clone a disposed session"));
        }
        Ok(SessionCloneBuilder {
            source: self,
            frame_buffer: self.frame_buffer.deep_clone()?,
            renderer: None,
            document: None,
        })
    }

    /// Run the post-effect chain over this session's frame buffer.
    ///
    /// While the session is active the run counts as an in-progress redraw, and the elapsed
    /// render time feeds effects with a delayed execute policy.
    pub fn run_post_effects(
        &self,
        effects: &PostEffectCollection,
        context: ExecutionContext,
        flags: CreationFlags,
        pipeline_opts: PipelineOpts,
        exec: &ExecuteOpts,
    ) -> PostResult<ExecuteReport> {
        let mut pipeline =
            PostEffectPipeline::new(Arc::clone(&self.frame_buffer), context, flags, pipeline_opts)?;
        let mut exec = exec.clone();
        exec.rendering_in_progress |= self.status().is_active();
        if exec.render_elapsed.is_none() {
            exec.render_elapsed = Some(self.elapsed());
        }
        pipeline.execute(effects, &exec)
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Some(control) = &self.control {
            control.cancel();
        }
        self.renderer.stop();
    }
}

/// Pending copy of a session, finished with [`SessionCloneBuilder::end_clone`].
///
/// The copy gets a new id and its own frame buffer. Dropping the builder abandons the copy.
pub struct SessionCloneBuilder<'a> {
    source: &'a RenderSession,
    frame_buffer: FrameBuffer,
    renderer: Option<Box<dyn AsyncRenderContext>>,
    document: Option<String>,
}

impl std::fmt::Debug for SessionCloneBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCloneBuilder")
            .field("source", &self.source.id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl SessionCloneBuilder<'_> {
    /// Use `renderer` instead of an idle clone of the source's renderer.
    pub fn renderer(mut self, renderer: Box<dyn AsyncRenderContext>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Rename the document of the copy.
    pub fn document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    /// Finish the copy.
    ///
    /// End states and their timings carry over; an active source yields a `Quiescent` copy
    /// since no worker runs for it.
    pub fn end_clone(self) -> RenderSession {
        let src = self.source;
        let (status, shared) = {
            let cell = src.shared.cell.lock();
            let status = if cell.status.is_terminal() {
                cell.status
            } else {
                RenderStatus::Quiescent
            };
            let shared = SessionShared::new(status);
            if status.is_terminal() {
                let mut dst = shared.cell.lock();
                dst.error = cell.error.clone();
                dst.started = cell.started;
                dst.ended = cell.ended;
                dst.progress = cell.progress;
            }
            (status, shared)
        };
        let session = RenderSession {
            id: Uuid::new_v4(),
            engine_id: src.engine_id,
            document: self.document.unwrap_or_else(|| src.document.clone()),
            frame_buffer: Arc::new(self.frame_buffer),
            renderer: self.renderer.unwrap_or_else(|| src.renderer.idle_clone()),
            shared,
            control: None,
            opts: src.opts.clone(),
            was_canceled: status.is_terminal() && src.was_canceled,
            quiet: src.quiet,
        };
        tracing::debug!(from = %src.id, to = %session.id, ?status, "session cloned");
        session
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/session.rs"]
mod tests;
