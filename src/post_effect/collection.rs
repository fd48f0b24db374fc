use uuid::Uuid;

use crate::foundation::error::{PostError, PostResult};
use crate::post_effect::builtin;
use crate::post_effect::{PostEffect, PostEffectExt, PostEffectStage};
use crate::settings::{ParamStore, ParamValue, Section, SectionMut};

/// Explicit post-effect registry, owned by the host and handed to pipelines.
///
/// Registration order is the execution order within a stage.
#[derive(Default)]
pub struct PostEffectCollection {
    effects: Vec<Box<dyn PostEffect>>,
}

impl std::fmt::Debug for PostEffectCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.effects.iter().map(|e| (e.name(), e.stage())))
            .finish()
    }
}

impl PostEffectCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection holding every built-in effect, with the clamp tone mapper selected.
    pub fn with_builtins() -> Self {
        let mut c = Self::new();
        c.effects.push(Box::new(builtin::DepthFog::new()));
        c.effects.push(Box::new(builtin::ClampToneMapper::new()));
        c.effects.push(Box::new(builtin::ReinhardToneMapper::new()));
        c.effects.push(Box::new(builtin::ExposureToneMapper::new()));
        c.effects.push(Box::new(builtin::GaussianBlur::new()));
        c.effects.push(Box::new(builtin::Gamma::new()));
        if let Err(e) = c.select_tone_mapper(builtin::ClampToneMapper::ID) {
            tracing::warn!(error = %e, "default tone mapper missing");
        }
        c
    }

    /// Append an effect. Ids must be unique.
    pub fn register(&mut self, effect: Box<dyn PostEffect>) -> PostResult<()> {
        if self.get(effect.id()).is_some() {
            return Err(PostError::validation(format!(
                "post-effect {} ({}) already registered",
                effect.name(),
                effect.id()
            )));
        }
        tracing::debug!(name = effect.name(), stage = ?effect.stage(), "post-effect registered");
        self.effects.push(effect);
        Ok(())
    }

    /// Number of registered effects.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// All effects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn PostEffect> {
        self.effects.iter().map(|e| e.as_ref())
    }

    /// Effects of one stage in registration order.
    pub fn stage(&self, stage: PostEffectStage) -> impl Iterator<Item = &dyn PostEffect> {
        self.iter().filter(move |e| e.stage() == stage)
    }

    /// Look up an effect by id.
    pub fn get(&self, id: Uuid) -> Option<&dyn PostEffect> {
        self.iter().find(|e| e.id() == id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut (dyn PostEffect + 'static)> {
        self.effects
            .iter_mut()
            .find(|e| e.id() == id)
            .map(|e| e.as_mut())
    }

    /// Make `id` the only selected tone mapper.
    pub fn select_tone_mapper(&mut self, id: Uuid) -> PostResult<()> {
        match self.get(id) {
            Some(e) if e.stage() == PostEffectStage::ToneMapping => {}
            Some(e) => {
                return Err(PostError::validation(format!(
                    "{} is not a tone mapper",
                    e.name()
                )));
            }
            None => return Err(PostError::validation(format!("no post-effect {id}"))),
        }
        for e in self
            .effects
            .iter_mut()
            .filter(|e| e.stage() == PostEffectStage::ToneMapping)
        {
            let selected = e.id() == id;
            e.begin_change().set_selected(selected);
        }
        Ok(())
    }

    /// The first selected tone mapper.
    pub fn selected_tone_mapper(&self) -> Option<&dyn PostEffect> {
        self.stage(PostEffectStage::ToneMapping)
            .find(|e| e.common().is_selected())
    }

    /// Load common flags and effect parameters. Each effect reads its own `"<uuid>/"` section.
    pub fn load_state(&mut self, store: &dyn ParamStore) -> PostResult<()> {
        for e in &mut self.effects {
            let section = Section::new(store, e.id().to_string());
            let mut b = e.begin_change();
            if let Some(on) = section.get_parameter("on").and_then(|v| v.as_bool()) {
                b.set_on(on);
            }
            if let Some(shown) = section.get_parameter("shown").and_then(|v| v.as_bool()) {
                b.set_shown(shown);
            }
            if let Some(sel) = section.get_parameter("selected").and_then(|v| v.as_bool()) {
                b.set_selected(sel);
            }
            b.read_state(&section)?;
        }
        Ok(())
    }

    /// Persist common flags and effect parameters.
    pub fn save_state(&self, store: &mut dyn ParamStore) -> PostResult<()> {
        for e in &self.effects {
            let mut section = SectionMut::new(store, e.id().to_string());
            let c = e.common();
            section.set_parameter("on", ParamValue::Bool(c.is_on()));
            section.set_parameter("shown", ParamValue::Bool(c.is_shown()));
            section.set_parameter("selected", ParamValue::Bool(c.is_selected()));
            e.write_state(&mut section)?;
        }
        Ok(())
    }

    /// Reset every effect's parameters.
    pub fn reset_to_factory_defaults(&mut self) {
        for e in &mut self.effects {
            e.begin_change().reset_to_factory_defaults();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/post_effect/collection.rs"]
mod tests;
