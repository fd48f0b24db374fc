//! Background worker that runs post-effect jobs one at a time, in submission order.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::thread::JoinHandle;

use uuid::Uuid;

use crate::channel::{Channel, ChannelId};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{PostError, PostResult};
use crate::pipeline::PipelineView;

/// Snapshot channels handed to a job. Results are written back into them.
#[derive(Clone, Debug, Default)]
pub struct JobChannels {
    channels: BTreeMap<ChannelId, Channel>,
}

impl JobChannels {
    /// Add or replace a channel.
    pub fn insert(&mut self, channel: Channel) {
        self.channels.insert(channel.id(), channel);
    }

    /// Channel by id.
    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// Mutable channel by id.
    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    /// Take a channel out.
    pub fn remove(&mut self, id: ChannelId) -> Option<Channel> {
        self.channels.remove(&id)
    }

    /// Held ids, sorted.
    pub fn ids(&self) -> Vec<ChannelId> {
        self.channels.keys().copied().collect()
    }

    /// Number of held channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// `true` when nothing is held.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// A post-effect's unit of background work.
///
/// The engine runs a clone made with [`PostEffectJob::clone_job`]; the caller keeps the original.
pub trait PostEffectJob: Send {
    /// Independent copy handed to the worker.
    fn clone_job(&self) -> Box<dyn PostEffectJob>;

    /// Process `rect` of the snapshot channels in place. Should poll `cancel` between rows.
    fn execute(
        &mut self,
        rect: PixelRect,
        channels: &mut JobChannels,
        cancel: &CancelToken,
    ) -> PostResult<()>;
}

struct JobRequest {
    job: Box<dyn PostEffectJob>,
    effect_id: Uuid,
    rect: PixelRect,
    channels: JobChannels,
    cancel: CancelToken,
    reply: mpsc::Sender<PostResult<JobChannels>>,
}

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct JobTicket {
    effect_id: Uuid,
    rx: mpsc::Receiver<PostResult<JobChannels>>,
}

impl JobTicket {
    /// Effect that submitted the job.
    pub fn effect_id(&self) -> Uuid {
        self.effect_id
    }

    /// Block until the job finished.
    pub fn wait(self) -> PostResult<JobChannels> {
        self.rx
            .recv()
            .map_err(|_| PostError::pipeline("thread engine worker exited before replying"))?
    }

    /// Result if the job already finished.
    pub fn try_wait(&self) -> Option<PostResult<JobChannels>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(PostError::pipeline(
                "thread engine worker exited before replying",
            ))),
        }
    }
}

/// Single background worker fed by a queue. Dropping the engine drains the queue and joins it.
#[derive(Debug)]
pub struct ThreadEngine {
    tx: Option<mpsc::Sender<JobRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadEngine {
    /// Spawn the worker thread.
    pub fn new() -> PostResult<Self> {
        let (tx, rx) = mpsc::channel::<JobRequest>();
        let worker = std::thread::Builder::new()
            .name("postkit-thread-engine".to_string())
            .spawn(move || worker_loop(rx))
            .map_err(|e| PostError::pipeline(format!("failed to spawn thread engine: {e}")))?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue a clone of `job` over `channels` without waiting.
    pub fn submit(
        &self,
        job: &dyn PostEffectJob,
        effect_id: Uuid,
        rect: PixelRect,
        channels: JobChannels,
        cancel: &CancelToken,
    ) -> PostResult<JobTicket> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| PostError::pipeline("thread engine is shut down"))?;
        let (reply, rx) = mpsc::channel();
        tx.send(JobRequest {
            job: job.clone_job(),
            effect_id,
            rect,
            channels,
            cancel: cancel.clone(),
            reply,
        })
        .map_err(|_| PostError::pipeline("thread engine worker is gone"))?;
        tracing::debug!(effect = %effect_id, "job queued");
        Ok(JobTicket { effect_id, rx })
    }

    /// Queue a job and block for its result.
    pub fn run(
        &self,
        job: &dyn PostEffectJob,
        effect_id: Uuid,
        rect: PixelRect,
        channels: JobChannels,
        cancel: &CancelToken,
    ) -> PostResult<JobChannels> {
        self.submit(job, effect_id, rect, channels, cancel)?.wait()
    }

    /// Snapshot `ids` from the executing effect's view, run `job` over them on the worker and
    /// block for the result. A failing job fails the calling effect.
    pub fn run_post_effect(
        &self,
        job: &dyn PostEffectJob,
        view: &mut PipelineView<'_>,
        rect: PixelRect,
        ids: &[ChannelId],
    ) -> PostResult<JobChannels> {
        let channels = view.snapshot_for_job(ids)?;
        let cancel = view.cancel_token().clone();
        self.run(job, view.effect_id(), rect, channels, &cancel)
    }
}

impl Drop for ThreadEngine {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::warn!("thread engine worker panicked");
        }
    }
}

fn worker_loop(rx: mpsc::Receiver<JobRequest>) {
    for req in rx {
        let JobRequest {
            mut job,
            effect_id,
            rect,
            mut channels,
            cancel,
            reply,
        } = req;
        let res = if cancel.is_canceled() {
            Err(PostError::Canceled)
        } else {
            match catch_unwind(AssertUnwindSafe(|| job.execute(rect, &mut channels, &cancel))) {
                Ok(r) => r.map(|()| channels),
                Err(_) => Err(PostError::pipeline(format!("job of effect {effect_id} panicked"))),
            }
        };
        if let Err(e) = &res {
            tracing::debug!(effect = %effect_id, error = %e, "job failed");
        }
        // The submitter may have dropped its ticket.
        let _ = reply.send(res);
    }
}

#[cfg(test)]
#[path = "../tests/unit/thread_engine.rs"]
mod tests;
