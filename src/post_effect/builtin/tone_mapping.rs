use uuid::Uuid;

use crate::foundation::core::PixelRect;
use crate::foundation::error::PostResult;
use crate::pipeline::PipelineView;
use crate::post_effect::builtin::{map_colour, read_f32};
use crate::post_effect::{PostEffect, PostEffectCommon, PostEffectFlags, PostEffectStage};
use crate::settings::{ParamStore, ParamValue};

fn tone_mapper_common() -> PostEffectCommon {
    PostEffectCommon::new(
        PostEffectStage::ToneMapping,
        PostEffectFlags::ALL_CONTEXTS | PostEffectFlags::DEFAULT_SHOWN,
    )
}

/// Plain clamp into `[0,1]`. The pipeline's mandatory clamp does the work.
#[derive(Debug)]
pub struct ClampToneMapper {
    common: PostEffectCommon,
}

impl ClampToneMapper {
    /// Stable id.
    pub const ID: Uuid = Uuid::from_u128(0x6d1f_2a0c_4b7e_4f3a_9c61_0e5b_7a2d_c001);

    /// Unselected clamp tone mapper.
    pub fn new() -> Self {
        Self {
            common: tone_mapper_common(),
        }
    }
}

impl Default for ClampToneMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for ClampToneMapper {
    fn id(&self) -> Uuid {
        Self::ID
    }

    fn name(&self) -> &str {
        "Clamp"
    }

    fn common(&self) -> &PostEffectCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }

    fn execute(&self, _view: &mut PipelineView<'_>, _rect: PixelRect) -> PostResult<()> {
        Ok(())
    }
}

/// Extended Reinhard: `c * (1 + c / w²) / (1 + c)` per colour component.
///
/// Without an explicit white point the largest luminance entering tone mapping is used.
#[derive(Debug)]
pub struct ReinhardToneMapper {
    common: PostEffectCommon,
    white_point: Option<f32>,
}

impl ReinhardToneMapper {
    /// Stable id.
    pub const ID: Uuid = Uuid::from_u128(0x6d1f_2a0c_4b7e_4f3a_9c61_0e5b_7a2d_c002);

    /// Unselected tone mapper with an automatic white point.
    pub fn new() -> Self {
        Self {
            common: tone_mapper_common(),
            white_point: None,
        }
    }

    /// Explicit white point, if set.
    pub fn white_point(&self) -> Option<f32> {
        self.white_point
    }

    /// Set or clear the white point. Non-positive values clear it.
    pub fn set_white_point(&mut self, white: Option<f32>) {
        let white = white.filter(|w| w.is_finite() && *w > 0.0);
        if self.white_point != white {
            self.white_point = white;
            self.common.changed();
        }
    }
}

impl Default for ReinhardToneMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for ReinhardToneMapper {
    fn id(&self) -> Uuid {
        Self::ID
    }

    fn name(&self) -> &str {
        "Reinhard"
    }

    fn common(&self) -> &PostEffectCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }

    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()> {
        let white = self.white_point.unwrap_or(view.max_luminance()).max(1.0);
        let inv_w2 = 1.0 / (white * white);
        map_colour(view, rect, |px, _, _| {
            for v in &mut px[..3] {
                let c = v.max(0.0);
                *v = c * (1.0 + c * inv_w2) / (1.0 + c);
            }
        })
    }

    fn read_state(&mut self, store: &dyn ParamStore) -> PostResult<()> {
        if let Some(v) = read_f32(store, "white_point") {
            self.set_white_point(Some(v));
        }
        Ok(())
    }

    fn write_state(&self, store: &mut dyn ParamStore) -> PostResult<()> {
        store.set_parameter(
            "white_point",
            ParamValue::from(self.white_point.unwrap_or(0.0)),
        );
        Ok(())
    }

    fn reset_to_factory_defaults(&mut self) {
        self.set_white_point(None);
    }
}

/// Photographic exposure curve: `1 - exp(-c * 2^stops)`.
#[derive(Debug)]
pub struct ExposureToneMapper {
    common: PostEffectCommon,
    stops: f32,
}

impl ExposureToneMapper {
    /// Stable id.
    pub const ID: Uuid = Uuid::from_u128(0x6d1f_2a0c_4b7e_4f3a_9c61_0e5b_7a2d_c003);

    /// Unselected tone mapper at zero stops.
    pub fn new() -> Self {
        Self {
            common: tone_mapper_common(),
            stops: 0.0,
        }
    }

    /// Exposure in stops.
    pub fn stops(&self) -> f32 {
        self.stops
    }

    /// Set the exposure in stops. Non-finite values are ignored.
    pub fn set_stops(&mut self, stops: f32) {
        if stops.is_finite() && self.stops != stops {
            self.stops = stops;
            self.common.changed();
        }
    }
}

impl Default for ExposureToneMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for ExposureToneMapper {
    fn id(&self) -> Uuid {
        Self::ID
    }

    fn name(&self) -> &str {
        "Exposure"
    }

    fn common(&self) -> &PostEffectCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }

    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()> {
        let scale = self.stops.exp2();
        map_colour(view, rect, |px, _, _| {
            for v in &mut px[..3] {
                *v = 1.0 - (-v.max(0.0) * scale).exp();
            }
        })
    }

    fn read_state(&mut self, store: &dyn ParamStore) -> PostResult<()> {
        if let Some(stops) = read_f32(store, "stops") {
            self.set_stops(stops);
        }
        Ok(())
    }

    fn write_state(&self, store: &mut dyn ParamStore) -> PostResult<()> {
        store.set_parameter("stops", ParamValue::from(self.stops));
        Ok(())
    }

    fn reset_to_factory_defaults(&mut self) {
        self.set_stops(0.0);
    }
}
