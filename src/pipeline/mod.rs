//! The orchestrator that runs an ordered post-effect chain against a frame buffer.
//!
//! Each [`PostEffectPipeline::execute`] works on a copy-on-write working set keyed by channel
//! id. Reads come from the working set (loading a frame-buffer snapshot on first use); commits
//! from an effect are applied when its `execute` returns, so the next effect in registration
//! order sees them. The frame buffer's raw channels are never written; on success the modified
//! channels are published as its post-processed overlay.

mod histogram;
mod view;

pub use histogram::Histogram;
pub use view::{PipelineView, WriteChannel};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use smallvec::SmallVec;
use uuid::Uuid;

use crate::channel::{Channel, ChannelId};
use crate::config::PipelineOpts;
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::{PixelRect, PixelSize};
use crate::foundation::error::{PostError, PostResult};
use crate::frame_buffer::FrameBuffer;
use crate::post_effect::{
    ExecuteWhileRendering, PostEffect, PostEffectCollection, PostEffectFlags, PostEffectStage,
};
use crate::thread_engine::ThreadEngine;

use view::CommitSink;

/// Why the pipeline is running.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ExecutionContext {
    /// Final production rendering.
    #[default]
    Production,
    /// Interactive realtime rendering.
    Realtime,
    /// Viewport display.
    Viewport,
    /// Thumbnail generation.
    Thumbnail,
    /// HDR output; implies no tone mapping and therefore no Late stage.
    HdrConversion,
}

bitflags::bitflags! {
    /// Stages disabled for the lifetime of a pipeline.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CreationFlags: u32 {
        /// Skip the Early stage.
        const DISABLE_EARLY = 1 << 0;
        /// Skip tone mapping and the clamp; Late effects are skipped as well.
        const DISABLE_TONE_MAPPING = 1 << 1;
        /// Skip the Late stage.
        const DISABLE_LATE = 1 << 2;
        /// Skip effects flagged [`PostEffectFlags::GAMMA`].
        const DISABLE_GAMMA = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Histogram capture points.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HistogramFlags: u32 {
        /// Before the Early stage.
        const BEFORE_EARLY = 1 << 0;
        /// Before tone mapping.
        const BEFORE_TONE_MAPPING = 1 << 1;
        /// After tone mapping and the clamp.
        const AFTER_TONE_MAPPING = 1 << 2;
        /// After the Late stage.
        const AFTER_LATE = 1 << 3;
    }
}

/// One histogram capture point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HistogramPoint {
    /// Before the Early stage.
    BeforeEarly,
    /// Before tone mapping.
    BeforeToneMapping,
    /// After tone mapping and the clamp.
    AfterToneMapping,
    /// After the Late stage.
    AfterLate,
}

impl HistogramPoint {
    fn flag(self) -> HistogramFlags {
        match self {
            Self::BeforeEarly => HistogramFlags::BEFORE_EARLY,
            Self::BeforeToneMapping => HistogramFlags::BEFORE_TONE_MAPPING,
            Self::AfterToneMapping => HistogramFlags::AFTER_TONE_MAPPING,
            Self::AfterLate => HistogramFlags::AFTER_LATE,
        }
    }
}

/// Read-only facts about the current run, consulted by `can_execute`.
#[derive(Clone, Debug, Default)]
pub struct PipelineInfo {
    /// Why the pipeline is running.
    pub context: ExecutionContext,
    /// The frame is still being rendered.
    pub rendering_in_progress: bool,
    /// Frame dimensions.
    pub size: PixelSize,
    /// Region being processed.
    pub rect: PixelRect,
    /// Stages disabled at construction.
    pub creation_flags: CreationFlags,
    /// Channels stored in the frame buffer.
    pub available: BTreeSet<ChannelId>,
    /// How long the rendering has been running, if known.
    pub render_elapsed: Option<Duration>,
}

impl PipelineInfo {
    /// `true` when the frame buffer holds `id`. Colour component views count as present.
    pub fn has_channel(&self, id: ChannelId) -> bool {
        if id.component_of_rgba().is_some() {
            return self.available.contains(&ChannelId::Rgba);
        }
        self.available.contains(&id)
    }
}

/// Host callback deciding whether an effect with
/// [`ExecuteWhileRendering::UseExecutionControl`] runs during an in-progress redraw.
pub trait ExecutionControl: Send + Sync {
    /// `true` when the effect should run now.
    fn ready_to_execute(&self, effect: &dyn PostEffect, info: &PipelineInfo) -> bool;
}

impl<F> ExecutionControl for F
where
    F: Fn(&dyn PostEffect, &PipelineInfo) -> bool + Send + Sync,
{
    fn ready_to_execute(&self, effect: &dyn PostEffect, info: &PipelineInfo) -> bool {
        self(effect, info)
    }
}

/// Overall-progress callback. Receives a fraction in `[0,1]`; returning `false` cancels.
pub type ProgressCallback = Box<dyn FnMut(f32) -> bool + Send>;

/// Per-call options of [`PostEffectPipeline::execute`].
#[derive(Clone, Debug, Default)]
pub struct ExecuteOpts {
    /// Region to process; `None` means the whole frame.
    pub rect: Option<PixelRect>,
    /// The frame is still being rendered; filters effects by their
    /// [`ExecuteWhileRendering`] policy.
    pub rendering_in_progress: bool,
    /// Histograms to capture.
    pub histograms: HistogramFlags,
    /// How long the rendering has been running, for [`ExecuteWhileRendering::UseDelay`].
    pub render_elapsed: Option<Duration>,
}

/// What happened during one successful run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Effects that ran, in order.
    pub executed: Vec<Uuid>,
    /// Effects skipped because a required channel was missing.
    pub skipped_missing_channels: Vec<Uuid>,
    /// Effects held back by their in-progress policy.
    pub skipped_in_progress: Vec<Uuid>,
    /// The tone mapper that ran, if any.
    pub tone_mapper: Option<Uuid>,
    /// The colour channel was clamped into `[0,1]`.
    pub clamped: bool,
    /// Late effects were skipped because tone mapping was disabled.
    pub late_skipped: bool,
}

#[derive(Default)]
struct Plan<'c> {
    early: Vec<&'c dyn PostEffect>,
    tone_mapper: Option<&'c dyn PostEffect>,
    late: Vec<&'c dyn PostEffect>,
}

impl Plan<'_> {
    fn len(&self) -> usize {
        self.early.len() + usize::from(self.tone_mapper.is_some()) + self.late.len()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RunProgress {
    done: usize,
    total: usize,
}

/// Runs post-effect chains against one frame buffer.
///
/// Construct it once per frame buffer and call [`PostEffectPipeline::execute`] for every
/// redraw; the working set is rebuilt from the frame buffer at the start of each call.
pub struct PostEffectPipeline {
    frame_buffer: Arc<FrameBuffer>,
    context: ExecutionContext,
    flags: CreationFlags,
    opts: PipelineOpts,
    pool: Option<Arc<rayon::ThreadPool>>,
    engine: Option<Arc<ThreadEngine>>,
    control: Option<Box<dyn ExecutionControl>>,
    progress: Option<ProgressCallback>,
    cancel: CancelToken,
    info: PipelineInfo,
    working: HashMap<ChannelId, Arc<Channel>>,
    modified: BTreeSet<ChannelId>,
    histograms: HashMap<HistogramPoint, Histogram>,
    missing_channels: Vec<Uuid>,
    max_luminance: f32,
    run: RunProgress,
    elapsed: Option<Duration>,
}

impl std::fmt::Debug for PostEffectPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostEffectPipeline")
            .field("context", &self.context)
            .field("flags", &self.flags)
            .field("opts", &self.opts)
            .field("working", &self.channel_ids())
            .finish_non_exhaustive()
    }
}

impl PostEffectPipeline {
    /// Create a pipeline over `frame_buffer`.
    pub fn new(
        frame_buffer: Arc<FrameBuffer>,
        context: ExecutionContext,
        flags: CreationFlags,
        opts: PipelineOpts,
    ) -> PostResult<Self> {
        opts.validate()?;
        let pool = match opts.threads {
            Some(n) => Some(Arc::new(build_thread_pool(n)?)),
            None => None,
        };
        Ok(Self {
            frame_buffer,
            context,
            flags,
            opts,
            pool,
            engine: None,
            control: None,
            progress: None,
            cancel: CancelToken::new(),
            info: PipelineInfo::default(),
            working: HashMap::new(),
            modified: BTreeSet::new(),
            histograms: HashMap::new(),
            missing_channels: Vec::new(),
            max_luminance: 0.0,
            run: RunProgress::default(),
            elapsed: None,
        })
    }

    /// The frame buffer this pipeline reads.
    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.frame_buffer
    }

    /// Execution context fixed at construction.
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Stage flags fixed at construction.
    pub fn creation_flags(&self) -> CreationFlags {
        self.flags
    }

    /// Install the host's in-progress readiness callback.
    pub fn set_execution_control(&mut self, control: Option<Box<dyn ExecutionControl>>) {
        self.control = control;
    }

    /// Install an overall-progress callback.
    pub fn set_progress_callback(&mut self, cb: Option<ProgressCallback>) {
        self.progress = cb;
    }

    /// Share a thread engine instead of creating one on first use.
    pub fn set_thread_engine(&mut self, engine: Arc<ThreadEngine>) {
        self.engine = Some(engine);
    }

    /// Token that cancels running and future executions once canceled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replace the cancel token, e.g. after a canceled run.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    fn tone_mapping_enabled(&self) -> bool {
        !self.flags.contains(CreationFlags::DISABLE_TONE_MAPPING)
            && self.context != ExecutionContext::HdrConversion
    }

    /// Run the post-effect chain of `effects` over `opts.rect`.
    ///
    /// Order: Early effects, the selected tone mapper, the mandatory clamp of the colour channel
    /// into `[0,1]`, then Late effects, each stage in registration order. An effect whose
    /// required channels are missing is skipped and reported. The first failing effect aborts
    /// the chain; its error is returned and the frame buffer overlay is left untouched.
    #[tracing::instrument(
        skip_all,
        fields(context = ?self.context, in_progress = opts.rendering_in_progress)
    )]
    pub fn execute(
        &mut self,
        effects: &PostEffectCollection,
        opts: &ExecuteOpts,
    ) -> PostResult<ExecuteReport> {
        let started = Instant::now();
        self.working.clear();
        self.modified.clear();
        self.histograms.clear();
        self.missing_channels.clear();
        self.max_luminance = 0.0;

        let size = self.frame_buffer.size();
        let rect = opts.rect.unwrap_or(PixelRect::full(size));
        if !rect.fits_in(size) {
            return Err(PostError::validation(format!(
                "rect {rect:?} is not inside the {}x{} frame",
                size.width, size.height
            )));
        }
        if self.cancel.is_canceled() {
            return Err(PostError::Canceled);
        }

        self.info = PipelineInfo {
            context: self.context,
            rendering_in_progress: opts.rendering_in_progress,
            size,
            rect,
            creation_flags: self.flags,
            available: self.frame_buffer.channel_ids().into_iter().collect(),
            render_elapsed: opts.render_elapsed,
        };

        let mut report = ExecuteReport::default();
        let plan = self.plan(effects, opts, &mut report);
        self.run = RunProgress {
            done: 0,
            total: plan.len(),
        };

        let result = self.run_plan(&plan, rect, opts.histograms, &mut report);
        self.elapsed = Some(started.elapsed());
        if let Err(e) = result {
            if e.is_canceled() {
                tracing::debug!("post-effect chain canceled");
            } else {
                tracing::warn!(error = %e, "post-effect chain aborted");
            }
            return Err(e);
        }

        if self.opts.publish {
            let overlay = self
                .modified
                .iter()
                .filter_map(|id| self.working.get(id).map(|ch| (*id, Arc::clone(ch))))
                .collect();
            if rect == PixelRect::full(size) {
                self.frame_buffer.set_post_processed(overlay);
            } else {
                self.frame_buffer.merge_post_processed(overlay, rect);
            }
        }
        tracing::debug!(
            executed = report.executed.len(),
            skipped = report.skipped_missing_channels.len(),
            clamped = report.clamped,
            "post-effect chain finished"
        );
        Ok(report)
    }

    fn plan<'c>(
        &self,
        effects: &'c PostEffectCollection,
        opts: &ExecuteOpts,
        report: &mut ExecuteReport,
    ) -> Plan<'c> {
        let mut plan = Plan::default();

        if !self.flags.contains(CreationFlags::DISABLE_EARLY) {
            plan.early = effects
                .stage(PostEffectStage::Early)
                .filter(|e| self.admit(*e, opts, report))
                .collect();
        }

        if !self.tone_mapping_enabled() {
            if effects.stage(PostEffectStage::Late).next().is_some() {
                tracing::debug!("late stage skipped: no tone mapping for HDR output");
                report.late_skipped = true;
            }
            return plan;
        }

        let selected: Vec<_> = effects
            .stage(PostEffectStage::ToneMapping)
            .filter(|e| self.admit(*e, opts, report))
            .collect();
        if selected.len() > 1 {
            tracing::warn!(
                count = selected.len(),
                "more than one tone mapper selected, using the first"
            );
        }
        plan.tone_mapper = selected.first().copied();

        if !self.flags.contains(CreationFlags::DISABLE_LATE) {
            plan.late = effects
                .stage(PostEffectStage::Late)
                .filter(|e| self.admit(*e, opts, report))
                .collect();
        }
        plan
    }

    fn admit(&self, effect: &dyn PostEffect, opts: &ExecuteOpts, report: &mut ExecuteReport) -> bool {
        if !effect.can_execute(&self.info) {
            return false;
        }
        if self.flags.contains(CreationFlags::DISABLE_GAMMA)
            && effect.common().flags().contains(PostEffectFlags::GAMMA)
        {
            return false;
        }
        if opts.rendering_in_progress && !self.ready_while_rendering(effect) {
            tracing::debug!(effect = effect.name(), "held back while rendering");
            report.skipped_in_progress.push(effect.id());
            return false;
        }
        true
    }

    fn ready_while_rendering(&self, effect: &dyn PostEffect) -> bool {
        match effect.execute_while_rendering() {
            ExecuteWhileRendering::Never => false,
            ExecuteWhileRendering::Always => true,
            ExecuteWhileRendering::UseDelay(delay) => {
                self.info.render_elapsed.is_some_and(|t| t >= delay)
            }
            ExecuteWhileRendering::UseExecutionControl => self
                .control
                .as_ref()
                .is_some_and(|c| c.ready_to_execute(effect, &self.info)),
        }
    }

    fn run_plan(
        &mut self,
        plan: &Plan<'_>,
        rect: PixelRect,
        histograms: HistogramFlags,
        report: &mut ExecuteReport,
    ) -> PostResult<()> {
        self.capture_histogram(HistogramPoint::BeforeEarly, histograms, rect);
        for effect in &plan.early {
            self.run_effect(*effect, rect, report)?;
        }
        self.capture_histogram(HistogramPoint::BeforeToneMapping, histograms, rect);
        self.max_luminance = self
            .read_working(ChannelId::Rgba)
            .and_then(|ch| ch.min_max())
            .map_or(0.0, |(_, hi)| hi);

        if self.tone_mapping_enabled() {
            if let Some(tm) = plan.tone_mapper {
                report.tone_mapper = Some(tm.id());
                self.run_effect(tm, rect, report)?;
            }
            self.clamp_rgba(rect)?;
            report.clamped = true;
            self.capture_histogram(HistogramPoint::AfterToneMapping, histograms, rect);
            for effect in &plan.late {
                self.run_effect(*effect, rect, report)?;
            }
        }
        self.capture_histogram(HistogramPoint::AfterLate, histograms, rect);
        Ok(())
    }

    fn run_effect(
        &mut self,
        effect: &dyn PostEffect,
        rect: PixelRect,
        report: &mut ExecuteReport,
    ) -> PostResult<()> {
        if self.cancel.is_canceled() {
            return Err(PostError::Canceled);
        }
        let required = effect.required_channels();
        let missing: SmallVec<[ChannelId; 4]> = required
            .iter()
            .copied()
            .filter(|id| !self.is_available(*id))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(effect = effect.name(), ?missing, "post-effect skipped: missing channels");
            self.missing_channels.push(effect.id());
            report.skipped_missing_channels.push(effect.id());
            self.run.done += 1;
            return Ok(());
        }

        let sink = CommitSink::default();
        let result = {
            let mut view = PipelineView::new(self, effect.id(), rect, required, sink.clone());
            effect.execute(&mut view, rect)
        };
        for ch in sink.take() {
            self.apply_commit(ch, rect)?;
        }
        self.run.done += 1;

        match result {
            Ok(()) => {
                tracing::debug!(effect = effect.name(), stage = ?effect.stage(), "post-effect executed");
                report.executed.push(effect.id());
                Ok(())
            }
            Err(e) => {
                tracing::debug!(effect = effect.name(), error = %e, "post-effect failed");
                Err(e)
            }
        }
    }

    fn is_available(&self, id: ChannelId) -> bool {
        self.working.contains_key(&id) || self.info.has_channel(id)
    }

    /// Current state of `id`: the latest commit of this run, else a frame-buffer snapshot.
    fn read_working(&mut self, id: ChannelId) -> Option<Arc<Channel>> {
        if let Some(index) = id.component_of_rgba() {
            let rgba = self.read_working(ChannelId::Rgba)?;
            return rgba.extract_component(index, id).ok().map(Arc::new);
        }
        if let Some(ch) = self.working.get(&id) {
            return Some(Arc::clone(ch));
        }
        let ch = Arc::new(self.frame_buffer.snapshot_channel(id)?);
        self.working.insert(id, Arc::clone(&ch));
        Some(ch)
    }

    fn working_mut(&mut self, id: ChannelId) -> PostResult<&mut Channel> {
        if !self.working.contains_key(&id) {
            self.read_working(id)
                .ok_or_else(|| PostError::channel(format!("channel {id:?} not present")))?;
        }
        self.working
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or_else(|| PostError::channel(format!("channel {id:?} not present")))
    }

    fn components_of(&self, id: ChannelId) -> Option<usize> {
        match self.working.get(&id) {
            Some(ch) => Some(ch.components()),
            None => self.frame_buffer.channel_components(id),
        }
    }

    /// Replace the working copy of a committed channel.
    ///
    /// Only `rect` is taken from the commit when an existing channel with the same layout is
    /// present; everything outside the processed region keeps its previous contents.
    fn apply_commit(&mut self, ch: Channel, rect: PixelRect) -> PostResult<()> {
        if ch.size() != self.info.size {
            return Err(PostError::pipeline(format!(
                "committed channel {:?} is {:?}, frame is {:?}",
                ch.id(),
                ch.size(),
                self.info.size
            )));
        }
        let id = ch.id();

        if let Some(index) = id.component_of_rgba() {
            let rgba = self.working_mut(ChannelId::Rgba)?;
            for y in rect.rows() {
                for x in rect.x..rect.x + rect.width {
                    rgba.get_value_mut(x, y)[index] = ch.get_value(x, y)[0];
                }
            }
            self.modified.insert(ChannelId::Rgba);
            return Ok(());
        }

        let partial = rect != PixelRect::full(self.info.size);
        if partial && self.components_of(id) == Some(ch.components()) {
            let c = ch.components();
            let (x0, x1) = (rect.x as usize * c, (rect.x + rect.width) as usize * c);
            let dst = self.working_mut(id)?;
            for y in rect.rows() {
                dst.row_mut(y)[x0..x1].copy_from_slice(&ch.row(y)[x0..x1]);
            }
        } else {
            self.working.insert(id, Arc::new(ch));
        }
        self.modified.insert(id);
        Ok(())
    }

    fn clamp_rgba(&mut self, rect: PixelRect) -> PostResult<()> {
        let pool = self.pool.clone();
        let rgba = self.working_mut(ChannelId::Rgba)?;
        in_pool(pool.as_deref(), || histogram::clamp_rect(rgba, rect));
        self.modified.insert(ChannelId::Rgba);
        Ok(())
    }

    fn capture_histogram(&mut self, point: HistogramPoint, flags: HistogramFlags, rect: PixelRect) {
        if !flags.contains(point.flag()) {
            return;
        }
        let Some(rgba) = self.read_working(ChannelId::Rgba) else {
            return;
        };
        let bins = self.opts.histogram_bins;
        let h = in_pool(self.pool.as_deref(), || {
            Histogram::from_channel(&rgba, rect, bins)
        });
        self.histograms.insert(point, h);
    }

    fn thread_engine(&mut self) -> PostResult<Arc<ThreadEngine>> {
        if let Some(engine) = &self.engine {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(ThreadEngine::new()?);
        self.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    fn report_progress(&mut self, rows: u32) -> bool {
        if self.cancel.is_canceled() {
            return false;
        }
        let height = self.info.rect.height.max(1) as f32;
        let within = (rows as f32 / height).min(1.0);
        let fraction = (self.run.done as f32 + within) / self.run.total.max(1) as f32;
        if let Some(cb) = self.progress.as_mut()
            && !cb(fraction.min(1.0))
        {
            tracing::debug!("post-effect chain canceled by progress callback");
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// Histogram captured during the last run.
    pub fn histogram(&self, point: HistogramPoint) -> Option<&Histogram> {
        self.histograms.get(&point)
    }

    /// Largest colour luminance entering tone mapping during the last run.
    pub fn max_luminance(&self) -> f32 {
        self.max_luminance
    }

    /// Wall time of the last run.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Effects skipped for missing channels during the last run, for host UI text.
    pub fn missing_channel_effects(&self) -> &[Uuid] {
        &self.missing_channels
    }

    /// Working-set channel after the last run.
    pub fn output(&self, id: ChannelId) -> Option<Arc<Channel>> {
        self.working.get(&id).cloned()
    }

    /// Ids held in the working set, sorted.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<_> = self.working.keys().copied().collect();
        ids.sort();
        ids
    }
}

fn in_pool<R: Send>(pool: Option<&rayon::ThreadPool>, f: impl FnOnce() -> R + Send) -> R {
    match pool {
        Some(p) => p.install(f),
        None => f(),
    }
}

fn build_thread_pool(threads: usize) -> PostResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("postkit-pipeline-{i}"))
        .build()
        .map_err(|e| PostError::pipeline(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/pipeline.rs"]
mod tests;
