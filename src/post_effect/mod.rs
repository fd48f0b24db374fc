//! Post-effects: staged units of per-pixel processing run by the
//! [`PostEffectPipeline`](crate::PostEffectPipeline).

pub mod builtin;
mod collection;

pub use collection::PostEffectCollection;

use std::time::Duration;

use smallvec::{SmallVec, smallvec};
use uuid::Uuid;

use crate::channel::ChannelId;
use crate::foundation::core::PixelRect;
use crate::foundation::error::PostResult;
use crate::pipeline::{ExecutionContext, PipelineInfo, PipelineView};
use crate::settings::ParamStore;

/// Ordered processing stage. Fixed at construction.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PostEffectStage {
    /// Runs on HDR data before tone mapping.
    Early,
    /// The HDR to LDR boundary; exactly one tone mapper is selected.
    ToneMapping,
    /// Runs on LDR (`[0,1]`-clamped) data.
    Late,
}

bitflags::bitflags! {
    /// Where a post-effect may run and how it starts out.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct PostEffectFlags: u32 {
        /// May run for production renderings.
        const PRODUCTION = 1 << 0;
        /// May run for realtime (interactive) renderings.
        const REALTIME = 1 << 1;
        /// May run in viewports.
        const VIEWPORT = 1 << 2;
        /// May run for thumbnails.
        const THUMBNAIL = 1 << 3;
        /// May run while converting to HDR output.
        const HDR_CONVERSION = 1 << 4;
        /// Every execution context.
        const ALL_CONTEXTS = Self::PRODUCTION.bits()
            | Self::REALTIME.bits()
            | Self::VIEWPORT.bits()
            | Self::THUMBNAIL.bits()
            | Self::HDR_CONVERSION.bits();
        /// Switched on when first created.
        const DEFAULT_ON = 1 << 8;
        /// Shown in the effect list when first created.
        const DEFAULT_SHOWN = 1 << 9;
        /// Cannot be hidden.
        const FIXED = 1 << 10;
        /// Performs display gamma correction; skipped when the pipeline disables gamma.
        const GAMMA = 1 << 11;
    }
}

/// Whether a post-effect may run against a partially rendered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteWhileRendering {
    /// Only once rendering has finished.
    Never,
    /// On every in-progress redraw.
    Always,
    /// Once the rendering has been running for at least this long.
    UseDelay(Duration),
    /// When the pipeline's [`crate::ExecutionControl`] says the effect is ready.
    UseExecutionControl,
}

/// State every post-effect carries: stage, flags, on/shown/selected and the change counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostEffectCommon {
    stage: PostEffectStage,
    flags: PostEffectFlags,
    on: bool,
    shown: bool,
    selected: bool,
    crc: u32,
    change_depth: u32,
    dirty: bool,
}

impl PostEffectCommon {
    /// Initial state derived from `DEFAULT_ON` / `DEFAULT_SHOWN`.
    pub fn new(stage: PostEffectStage, flags: PostEffectFlags) -> Self {
        Self {
            stage,
            flags,
            on: flags.contains(PostEffectFlags::DEFAULT_ON),
            shown: flags.contains(PostEffectFlags::DEFAULT_SHOWN)
                || flags.contains(PostEffectFlags::FIXED),
            selected: false,
            crc: 0,
            change_depth: 0,
            dirty: false,
        }
    }

    /// Processing stage.
    pub fn stage(&self) -> PostEffectStage {
        self.stage
    }

    /// Context and attribute flags.
    pub fn flags(&self) -> PostEffectFlags {
        self.flags
    }

    /// Switched on (Early/Late stages).
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Shown in the effect list (Early/Late stages).
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// Selected as the active tone mapper (ToneMapping stage).
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// State-change counter; moves whenever a change bracket modified something.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// `true` while a change bracket is open.
    pub fn is_changing(&self) -> bool {
        self.change_depth > 0
    }

    /// Record that a property changed.
    ///
    /// Inside a bracket this only marks the state dirty; the counter moves once when the
    /// outermost bracket ends. Outside any bracket the counter moves immediately.
    pub fn changed(&mut self) {
        if self.change_depth > 0 {
            self.dirty = true;
        } else {
            self.crc = self.crc.wrapping_add(1);
        }
    }

    fn begin(&mut self) {
        self.change_depth += 1;
    }

    fn end(&mut self) {
        self.change_depth = self.change_depth.saturating_sub(1);
        if self.change_depth == 0 && self.dirty {
            self.dirty = false;
            self.crc = self.crc.wrapping_add(1);
        }
    }

    fn is_listable(&self) -> bool {
        self.stage != PostEffectStage::ToneMapping
    }

    fn set_on(&mut self, on: bool) -> bool {
        if !self.is_listable() || self.on == on {
            return false;
        }
        self.on = on;
        self.changed();
        true
    }

    fn set_shown(&mut self, shown: bool) -> bool {
        if !self.is_listable() || self.shown == shown {
            return false;
        }
        if !shown && self.flags.contains(PostEffectFlags::FIXED) {
            return false;
        }
        self.shown = shown;
        self.changed();
        true
    }

    fn set_selected(&mut self, selected: bool) -> bool {
        if self.is_listable() || self.selected == selected {
            return false;
        }
        self.selected = selected;
        self.changed();
        true
    }

    /// Default execution gate: the context is allowed and the effect is `on && shown`
    /// (or `selected` for tone mappers).
    pub fn default_can_execute(&self, info: &PipelineInfo) -> bool {
        if !self.flags.contains(info.context.flag()) {
            return false;
        }
        match self.stage {
            PostEffectStage::ToneMapping => self.selected,
            PostEffectStage::Early | PostEffectStage::Late => self.on && self.shown,
        }
    }
}

/// A named, staged unit of per-pixel processing.
///
/// Implementations must only read the channels they list in
/// [`PostEffect::required_channels`] and must [`commit`](crate::WriteChannel::commit) every write
/// channel they want preserved. Long-running work should call
/// [`PipelineView::report_progress`] and return [`crate::PostError::Canceled`] when it says
/// to stop.
pub trait PostEffect: Send + Sync {
    /// Stable identity.
    fn id(&self) -> Uuid;

    /// Display name.
    fn name(&self) -> &str;

    /// Shared state.
    fn common(&self) -> &PostEffectCommon;

    /// Mutable shared state. Property setters call [`PostEffectCommon::changed`] through this.
    fn common_mut(&mut self) -> &mut PostEffectCommon;

    /// Processing stage.
    fn stage(&self) -> PostEffectStage {
        self.common().stage()
    }

    /// Channels the effect reads. The pipeline skips the effect when one is missing.
    fn required_channels(&self) -> SmallVec<[ChannelId; 4]> {
        smallvec![ChannelId::Rgba]
    }

    /// Policy for in-progress redraws.
    fn execute_while_rendering(&self) -> ExecuteWhileRendering {
        ExecuteWhileRendering::Always
    }

    /// Whether the effect takes part in this pipeline run.
    fn can_execute(&self, info: &PipelineInfo) -> bool {
        self.common().default_can_execute(info)
    }

    /// Process `rect` of the frame.
    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()>;

    /// Load effect-specific parameters.
    fn read_state(&mut self, _store: &dyn ParamStore) -> PostResult<()> {
        Ok(())
    }

    /// Persist effect-specific parameters.
    fn write_state(&self, _store: &mut dyn ParamStore) -> PostResult<()> {
        Ok(())
    }

    /// Restore effect-specific parameters to their defaults.
    fn reset_to_factory_defaults(&mut self) {}
}

/// Change-bracket entry point available on every post-effect.
pub trait PostEffectExt: PostEffect {
    /// Open a change bracket. The bracket ends when the returned guard drops.
    fn begin_change(&mut self) -> ChangeBracket<'_, Self> {
        ChangeBracket::new(self)
    }
}

impl<E: PostEffect + ?Sized> PostEffectExt for E {}

/// Scoped Begin/End change bracket.
///
/// Dereferences to the effect so effect-specific setters can be called inside it. Brackets nest;
/// the change counter moves at most once, when the outermost bracket ends.
pub struct ChangeBracket<'a, E: PostEffect + ?Sized> {
    effect: &'a mut E,
}

impl<'a, E: PostEffect + ?Sized> ChangeBracket<'a, E> {
    fn new(effect: &'a mut E) -> Self {
        effect.common_mut().begin();
        Self { effect }
    }

    /// Switch the effect on or off. Returns whether the flag changed.
    pub fn set_on(&mut self, on: bool) -> bool {
        self.effect.common_mut().set_on(on)
    }

    /// Show or hide the effect. Returns whether the flag changed.
    pub fn set_shown(&mut self, shown: bool) -> bool {
        self.effect.common_mut().set_shown(shown)
    }

    /// Select or deselect a tone mapper. Returns whether the flag changed.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        self.effect.common_mut().set_selected(selected)
    }
}

impl<E: PostEffect + ?Sized> Drop for ChangeBracket<'_, E> {
    fn drop(&mut self) {
        self.effect.common_mut().end();
    }
}

impl<E: PostEffect + ?Sized> std::ops::Deref for ChangeBracket<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.effect
    }
}

impl<E: PostEffect + ?Sized> std::ops::DerefMut for ChangeBracket<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.effect
    }
}

impl ExecutionContext {
    /// The context bit in [`PostEffectFlags`].
    pub fn flag(self) -> PostEffectFlags {
        match self {
            Self::Production => PostEffectFlags::PRODUCTION,
            Self::Realtime => PostEffectFlags::REALTIME,
            Self::Viewport => PostEffectFlags::VIEWPORT,
            Self::Thumbnail => PostEffectFlags::THUMBNAIL,
            Self::HdrConversion => PostEffectFlags::HDR_CONVERSION,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/post_effect/post_effect.rs"]
mod tests;
