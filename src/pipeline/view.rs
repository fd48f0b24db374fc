use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::channel::{Channel, ChannelId};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{PostError, PostResult};
use crate::pipeline::{PipelineInfo, PostEffectPipeline, in_pool};
use crate::thread_engine::{JobChannels, PostEffectJob, ThreadEngine};

/// Commits collected during one effect's `execute`, applied once it returns.
#[derive(Clone, Debug, Default)]
pub(crate) struct CommitSink(Arc<Mutex<Vec<Channel>>>);

impl CommitSink {
    fn push(&self, channel: Channel) {
        self.0.lock().push(channel);
    }

    pub(crate) fn take(&self) -> Vec<Channel> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// The pipeline as seen by one executing post-effect.
pub struct PipelineView<'p> {
    pipeline: &'p mut PostEffectPipeline,
    effect_id: Uuid,
    rect: PixelRect,
    required: SmallVec<[ChannelId; 4]>,
    sink: CommitSink,
}

impl<'p> PipelineView<'p> {
    pub(crate) fn new(
        pipeline: &'p mut PostEffectPipeline,
        effect_id: Uuid,
        rect: PixelRect,
        required: SmallVec<[ChannelId; 4]>,
        sink: CommitSink,
    ) -> Self {
        Self {
            pipeline,
            effect_id,
            rect,
            required,
            sink,
        }
    }

    fn declared(&self, id: ChannelId) -> bool {
        self.required.contains(&id)
            || (id.component_of_rgba().is_some() && self.required.contains(&ChannelId::Rgba))
    }

    /// Current state of a channel: the most recent commit of an earlier effect in this run, or
    /// the frame buffer's channel.
    ///
    /// Returns `None` for channels the effect did not list in its required channels.
    pub fn channel_for_read(&mut self, id: ChannelId) -> Option<Arc<Channel>> {
        if !self.declared(id) {
            tracing::warn!(?id, effect = %self.effect_id, "read of undeclared channel refused");
            return None;
        }
        self.pipeline.read_working(id)
    }

    /// A new zero-filled channel for `id`, laid out like the existing channel with that id (or
    /// with the id's default component count). Nothing changes until it is committed.
    pub fn channel_for_write(&mut self, id: ChannelId) -> PostResult<WriteChannel> {
        let components = if id.component_of_rgba().is_some() {
            1
        } else {
            self.pipeline
                .components_of(id)
                .unwrap_or_else(|| id.default_components())
        };
        self.channel_for_write_with(id, components)
    }

    /// A new zero-filled channel with an explicit component count, e.g. a private scratch buffer.
    pub fn channel_for_write_with(
        &mut self,
        id: ChannelId,
        components: usize,
    ) -> PostResult<WriteChannel> {
        let channel = Channel::with_components(id, self.pipeline.info.size, components)?;
        Ok(WriteChannel {
            channel,
            sink: self.sink.clone(),
        })
    }

    /// Report `rows` completed rows of the processed rectangle.
    ///
    /// Returns `false` when the run was canceled; the effect should then return
    /// [`PostError::Canceled`].
    pub fn report_progress(&mut self, rows: u32) -> bool {
        self.pipeline.report_progress(rows)
    }

    /// Region being processed.
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Id of the executing effect.
    pub fn effect_id(&self) -> Uuid {
        self.effect_id
    }

    /// Facts about the current run.
    pub fn info(&self) -> &PipelineInfo {
        &self.pipeline.info
    }

    /// Largest colour luminance entering tone mapping. Zero before the tone-mapping stage.
    pub fn max_luminance(&self) -> f32 {
        self.pipeline.max_luminance
    }

    /// Display gamma configured for the pipeline.
    pub fn gamma(&self) -> f32 {
        self.pipeline.opts.gamma
    }

    /// The run's cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.pipeline.cancel
    }

    /// Run `f` on the pipeline's rayon pool (or the global one).
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        in_pool(self.pipeline.pool.as_deref(), f)
    }

    /// The pipeline's job worker, created on first use.
    pub fn thread_engine(&mut self) -> PostResult<Arc<ThreadEngine>> {
        self.pipeline.thread_engine()
    }

    /// Run `job` on the pipeline's worker over snapshots of `ids` and wait for the result.
    pub fn run_job(
        &mut self,
        job: &dyn PostEffectJob,
        ids: &[ChannelId],
    ) -> PostResult<JobChannels> {
        let engine = self.thread_engine()?;
        let rect = self.rect;
        engine.run_post_effect(job, self, rect, ids)
    }

    /// Copy the requested channels for a background job.
    pub(crate) fn snapshot_for_job(&mut self, ids: &[ChannelId]) -> PostResult<JobChannels> {
        let mut channels = JobChannels::default();
        for id in ids {
            let ch = self.channel_for_read(*id).ok_or_else(|| {
                PostError::channel(format!("channel {id:?} is not readable by this effect"))
            })?;
            channels.insert(Channel::clone(&ch));
        }
        Ok(channels)
    }
}

/// A fresh channel owned by the executing effect.
///
/// [`WriteChannel::commit`] publishes it to later effects once the effect's `execute` returns;
/// dropping it without committing discards it.
#[derive(Debug)]
pub struct WriteChannel {
    channel: Channel,
    sink: CommitSink,
}

impl WriteChannel {
    /// Publish the contents, replacing the channel with the same id for later effects.
    pub fn commit(self) {
        self.sink.push(self.channel);
    }

    /// Copy the contents of `src`, which must have the same size and layout.
    pub fn copy_from(&mut self, src: &Channel) -> PostResult<()> {
        if src.size() != self.channel.size() || src.components() != self.channel.components() {
            return Err(PostError::channel(format!(
                "cannot copy {:?} ({} components) into {:?} ({} components)",
                src.id(),
                src.components(),
                self.channel.id(),
                self.channel.components()
            )));
        }
        self.channel.data_mut().copy_from_slice(src.data());
        Ok(())
    }
}

impl std::ops::Deref for WriteChannel {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        &self.channel
    }
}

impl std::ops::DerefMut for WriteChannel {
    fn deref_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }
}
