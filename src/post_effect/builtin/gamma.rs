use uuid::Uuid;

use crate::foundation::core::PixelRect;
use crate::foundation::error::PostResult;
use crate::pipeline::PipelineView;
use crate::post_effect::builtin::{map_colour, read_f32};
use crate::post_effect::{PostEffect, PostEffectCommon, PostEffectFlags, PostEffectStage};
use crate::settings::{ParamStore, ParamValue};

/// Display gamma encoding of the colour channel: `c^(1/gamma)`.
///
/// Uses the pipeline's gamma unless an override is set. Skipped when the pipeline is created
/// with gamma disabled.
#[derive(Debug)]
pub struct Gamma {
    common: PostEffectCommon,
    gamma: Option<f32>,
}

impl Gamma {
    /// Stable id.
    pub const ID: Uuid = Uuid::from_u128(0x6d1f_2a0c_4b7e_4f3a_9c61_0e5b_7a2d_c010);

    /// Gamma effect, on and fixed in the list.
    pub fn new() -> Self {
        Self {
            common: PostEffectCommon::new(
                PostEffectStage::Late,
                PostEffectFlags::ALL_CONTEXTS
                    | PostEffectFlags::DEFAULT_ON
                    | PostEffectFlags::DEFAULT_SHOWN
                    | PostEffectFlags::FIXED
                    | PostEffectFlags::GAMMA,
            ),
            gamma: None,
        }
    }

    /// Gamma override.
    pub fn gamma(&self) -> Option<f32> {
        self.gamma
    }

    /// Set or clear the override. Non-positive values clear it.
    pub fn set_gamma(&mut self, gamma: Option<f32>) {
        let gamma = gamma.filter(|g| g.is_finite() && *g > 0.0);
        if self.gamma != gamma {
            self.gamma = gamma;
            self.common.changed();
        }
    }
}

impl Default for Gamma {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for Gamma {
    fn id(&self) -> Uuid {
        Self::ID
    }

    fn name(&self) -> &str {
        "Gamma"
    }

    fn common(&self) -> &PostEffectCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }

    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()> {
        let gamma = self.gamma.unwrap_or(view.gamma());
        if (gamma - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }
        let inv = 1.0 / gamma;
        map_colour(view, rect, |px, _, _| {
            for v in &mut px[..3] {
                *v = v.max(0.0).powf(inv);
            }
        })
    }

    fn read_state(&mut self, store: &dyn ParamStore) -> PostResult<()> {
        if let Some(v) = read_f32(store, "gamma") {
            self.set_gamma(Some(v));
        }
        Ok(())
    }

    fn write_state(&self, store: &mut dyn ParamStore) -> PostResult<()> {
        store.set_parameter("gamma", ParamValue::from(self.gamma.unwrap_or(0.0)));
        Ok(())
    }

    fn reset_to_factory_defaults(&mut self) {
        self.set_gamma(None);
    }
}
