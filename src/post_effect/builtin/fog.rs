use smallvec::{SmallVec, smallvec};
use uuid::Uuid;

use crate::channel::ChannelId;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{PostError, PostResult};
use crate::pipeline::PipelineView;
use crate::post_effect::builtin::{map_colour, read_f32};
use crate::post_effect::{PostEffect, PostEffectCommon, PostEffectFlags, PostEffectStage};
use crate::settings::{ParamStore, ParamValue};

const DEFAULT_DENSITY: f32 = 0.05;
const DEFAULT_COLOR: [f32; 3] = [0.7, 0.75, 0.8];

/// Exponential depth fog on HDR colour: `mix(c, fog, 1 - exp(-density * distance))`.
///
/// Needs a `DistanceFromCamera` channel; without one the pipeline skips it.
#[derive(Debug)]
pub struct DepthFog {
    common: PostEffectCommon,
    density: f32,
    color: [f32; 3],
}

impl DepthFog {
    /// Stable id.
    pub const ID: Uuid = Uuid::from_u128(0x6d1f_2a0c_4b7e_4f3a_9c61_0e5b_7a2d_c020);

    /// Fog effect, shown but off.
    pub fn new() -> Self {
        Self {
            common: PostEffectCommon::new(
                PostEffectStage::Early,
                PostEffectFlags::PRODUCTION
                    | PostEffectFlags::REALTIME
                    | PostEffectFlags::VIEWPORT
                    | PostEffectFlags::HDR_CONVERSION
                    | PostEffectFlags::DEFAULT_SHOWN,
            ),
            density: DEFAULT_DENSITY,
            color: DEFAULT_COLOR,
        }
    }

    /// Extinction per unit distance.
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Set the density. Negative or non-finite values are ignored.
    pub fn set_density(&mut self, density: f32) {
        if density.is_finite() && density >= 0.0 && self.density != density {
            self.density = density;
            self.common.changed();
        }
    }

    /// Fog colour.
    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    /// Set the fog colour.
    pub fn set_color(&mut self, color: [f32; 3]) {
        if self.color != color {
            self.color = color;
            self.common.changed();
        }
    }
}

impl Default for DepthFog {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for DepthFog {
    fn id(&self) -> Uuid {
        Self::ID
    }

    fn name(&self) -> &str {
        "Fog"
    }

    fn common(&self) -> &PostEffectCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }

    fn required_channels(&self) -> SmallVec<[ChannelId; 4]> {
        smallvec![ChannelId::Rgba, ChannelId::DistanceFromCamera]
    }

    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()> {
        let depth = view
            .channel_for_read(ChannelId::DistanceFromCamera)
            .ok_or_else(|| PostError::channel("distance channel missing"))?;
        let density = self.density;
        let fog = self.color;
        map_colour(view, rect, |px, x, y| {
            let d = depth.get_value(x, y)[0];
            if !d.is_finite() {
                return;
            }
            let f = 1.0 - (-density * d.max(0.0)).exp();
            for (v, c) in px[..3].iter_mut().zip(fog) {
                *v = *v * (1.0 - f) + c * f;
            }
        })
    }

    fn read_state(&mut self, store: &dyn ParamStore) -> PostResult<()> {
        if let Some(d) = read_f32(store, "density") {
            self.set_density(d);
        }
        if let Some([r, g, b, _]) = store.get_parameter("color").and_then(|v| v.as_color()) {
            self.set_color([r, g, b]);
        }
        Ok(())
    }

    fn write_state(&self, store: &mut dyn ParamStore) -> PostResult<()> {
        let [r, g, b] = self.color;
        store.set_parameter("density", ParamValue::from(self.density));
        store.set_parameter("color", ParamValue::Color([r, g, b, 1.0]));
        Ok(())
    }

    fn reset_to_factory_defaults(&mut self) {
        self.set_density(DEFAULT_DENSITY);
        self.set_color(DEFAULT_COLOR);
    }
}
