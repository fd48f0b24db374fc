use uuid::Uuid;

use crate::channel::{Channel, ChannelId};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{PostError, PostResult};
use crate::pipeline::PipelineView;
use crate::post_effect::{
    ExecuteWhileRendering, PostEffect, PostEffectCommon, PostEffectFlags, PostEffectStage,
};
use crate::settings::{ParamStore, ParamValue};
use crate::thread_engine::{JobChannels, PostEffectJob};

const DEFAULT_RADIUS: u32 = 2;
const MAX_RADIUS: u32 = 256;

/// Separable Gaussian blur of the LDR colour channel, run on the pipeline's thread engine.
#[derive(Debug)]
pub struct GaussianBlur {
    common: PostEffectCommon,
    radius: u32,
}

impl GaussianBlur {
    /// Stable id.
    pub const ID: Uuid = Uuid::from_u128(0x6d1f_2a0c_4b7e_4f3a_9c61_0e5b_7a2d_c030);

    /// Blur effect, shown but off.
    pub fn new() -> Self {
        Self {
            common: PostEffectCommon::new(
                PostEffectStage::Late,
                PostEffectFlags::PRODUCTION
                    | PostEffectFlags::REALTIME
                    | PostEffectFlags::VIEWPORT
                    | PostEffectFlags::THUMBNAIL
                    | PostEffectFlags::DEFAULT_SHOWN,
            ),
            radius: DEFAULT_RADIUS,
        }
    }

    /// Kernel radius in pixels.
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Set the kernel radius, capped at 256.
    pub fn set_radius(&mut self, radius: u32) {
        let radius = radius.min(MAX_RADIUS);
        if self.radius != radius {
            self.radius = radius;
            self.common.changed();
        }
    }
}

impl Default for GaussianBlur {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for GaussianBlur {
    fn id(&self) -> Uuid {
        Self::ID
    }

    fn name(&self) -> &str {
        "Gaussian blur"
    }

    fn common(&self) -> &PostEffectCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }

    fn execute_while_rendering(&self) -> ExecuteWhileRendering {
        ExecuteWhileRendering::Never
    }

    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()> {
        if self.radius == 0 {
            return Ok(());
        }
        let job = BlurJob::new(self.radius)?;
        let mut result = view.run_job(&job, &[ChannelId::Rgba])?;
        let blurred = result
            .remove(ChannelId::Rgba)
            .ok_or_else(|| PostError::pipeline("blur job lost the colour channel"))?;
        if !view.report_progress(rect.height) {
            return Err(PostError::Canceled);
        }
        let mut out = view.channel_for_write(ChannelId::Rgba)?;
        out.copy_from(&blurred)?;
        out.commit();
        Ok(())
    }

    fn read_state(&mut self, store: &dyn ParamStore) -> PostResult<()> {
        if let Some(r) = store.get_parameter("radius").and_then(|v| v.as_i64()) {
            self.set_radius(u32::try_from(r).unwrap_or(0));
        }
        Ok(())
    }

    fn write_state(&self, store: &mut dyn ParamStore) -> PostResult<()> {
        store.set_parameter("radius", ParamValue::from(self.radius));
        Ok(())
    }

    fn reset_to_factory_defaults(&mut self) {
        self.set_radius(DEFAULT_RADIUS);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct BlurJob {
    kernel: Vec<f32>,
}

impl BlurJob {
    pub(crate) fn new(radius: u32) -> PostResult<Self> {
        let sigma = (radius as f32 / 2.0).max(0.5);
        Ok(Self {
            kernel: gaussian_kernel(radius, sigma)?,
        })
    }
}

impl PostEffectJob for BlurJob {
    fn clone_job(&self) -> Box<dyn PostEffectJob> {
        Box::new(self.clone())
    }

    fn execute(
        &mut self,
        rect: PixelRect,
        channels: &mut JobChannels,
        cancel: &CancelToken,
    ) -> PostResult<()> {
        let src = channels
            .get_mut(ChannelId::Rgba)
            .ok_or_else(|| PostError::channel("blur job needs the colour channel"))?;
        let tmp = horizontal_pass(src, rect, &self.kernel, cancel)?;
        vertical_pass(&tmp, src, rect, &self.kernel, cancel)
    }
}

fn gaussian_kernel(radius: u32, sigma: f32) -> PostResult<Vec<f32>> {
    if radius == 0 {
        return Ok(vec![1.0]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(PostError::validation("blur sigma must be > 0"));
    }
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-r..=r)
        .map(|i| {
            let x = i as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(PostError::pipeline("gaussian kernel sum is zero"));
    }
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}

/// Horizontal pass over the rows of `rect`, sampling clamped to the frame. Pixels outside
/// `rect` are copied unchanged.
fn horizontal_pass(
    src: &Channel,
    rect: PixelRect,
    k: &[f32],
    cancel: &CancelToken,
) -> PostResult<Channel> {
    let mut dst = src.clone();
    let radius = (k.len() / 2) as i64;
    let w = src.width() as i64;
    let c = src.components();
    for y in rect.rows() {
        if cancel.is_canceled() {
            return Err(PostError::Canceled);
        }
        let row = src.row(y);
        let out = dst.row_mut(y);
        for x in rect.x as i64..(rect.x + rect.width) as i64 {
            let mut acc = [0.0f32; 4];
            for (ki, kw) in k.iter().enumerate() {
                let sx = (x + ki as i64 - radius).clamp(0, w - 1) as usize;
                for (a, v) in acc.iter_mut().zip(&row[sx * c..sx * c + c]) {
                    *a += kw * v;
                }
            }
            let o = x as usize * c;
            out[o..o + c].copy_from_slice(&acc[..c]);
        }
    }
    Ok(dst)
}

fn vertical_pass(
    src: &Channel,
    dst: &mut Channel,
    rect: PixelRect,
    k: &[f32],
    cancel: &CancelToken,
) -> PostResult<()> {
    let radius = (k.len() / 2) as i64;
    let h = src.height() as i64;
    let c = src.components();
    for y in rect.rows() {
        if cancel.is_canceled() {
            return Err(PostError::Canceled);
        }
        for x in rect.x..rect.x + rect.width {
            let mut acc = [0.0f32; 4];
            for (ki, kw) in k.iter().enumerate() {
                let sy = (y as i64 + ki as i64 - radius).clamp(0, h - 1) as u32;
                for (a, v) in acc.iter_mut().zip(src.get_value(x, sy)) {
                    *a += kw * v;
                }
            }
            dst.get_value_mut(x, y).copy_from_slice(&acc[..c]);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../../tests/unit/post_effect/blur.rs"]
mod tests;
