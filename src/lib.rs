//! postkit is a renderer-agnostic post-processing core.
//!
//! A renderer fills a multi-channel [`FrameBuffer`] from a worker thread. A
//! [`PostEffectPipeline`] then runs a staged chain of post-effects over it:
//!
//! - Early effects on HDR data
//! - one selected tone mapper, after which colour is clamped into `[0, 1]`
//! - Late effects on LDR data
//!
//! A [`RenderSession`] tracks one rendering attempt through its lifecycle. Stopping a session
//! always joins the render worker before returning.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod channel;
mod config;
mod foundation;
mod frame_buffer;
mod settings;
mod thread_engine;

/// Post-effect chain orchestration.
pub mod pipeline;
/// Post-effect trait, change tracking and the stock effects.
pub mod post_effect;
/// Sample scan-line renderer.
pub mod renderer;
/// Render-session lifecycle.
pub mod session;

pub use crate::channel::{Channel, ChannelId};
pub use crate::config::{Config, PipelineOpts, RenderSessionOpts, ScanlineRendererOpts};
pub use crate::foundation::cancel::CancelToken;
pub use crate::foundation::core::{ComponentOrder, PixelRect, PixelSize};
pub use crate::foundation::error::{PostError, PostResult};
pub use crate::frame_buffer::{ChannelGuard, DibGuard, FrameBuffer, FrameBufferListener, Progress};
pub use crate::settings::{ParamStore, ParamValue, RenderSettings, Section, SectionMut};
pub use crate::thread_engine::{JobChannels, JobTicket, PostEffectJob, ThreadEngine};

pub use crate::pipeline::{
    CreationFlags, ExecuteOpts, ExecuteReport, ExecutionContext, ExecutionControl, Histogram,
    HistogramFlags, HistogramPoint, PipelineInfo, PipelineView, PostEffectPipeline,
    ProgressCallback, WriteChannel,
};
pub use crate::post_effect::{
    ChangeBracket, ExecuteWhileRendering, PostEffect, PostEffectCollection, PostEffectCommon,
    PostEffectExt, PostEffectFlags, PostEffectStage,
};
pub use crate::renderer::{GradientSource, HdrSunSource, PixelSource, ScanlineRenderer};
pub use crate::session::{
    AsyncRenderContext, RenderControl, RenderSession, RenderStatus, RendererFactory,
    RendererRegistry, SessionCloneBuilder, SessionRegistry, SharedSession,
};
