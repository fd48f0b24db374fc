use super::*;

struct Knob {
    id: Uuid,
    common: PostEffectCommon,
    strength: f32,
    radius: u32,
}

impl Knob {
    fn new(stage: PostEffectStage) -> Self {
        Self {
            id: Uuid::new_v4(),
            common: PostEffectCommon::new(
                stage,
                PostEffectFlags::ALL_CONTEXTS | PostEffectFlags::DEFAULT_SHOWN,
            ),
            strength: 1.0,
            radius: 1,
        }
    }

    fn set_strength(&mut self, v: f32) {
        if self.strength != v {
            self.strength = v;
            self.common.changed();
        }
    }

    fn set_radius(&mut self, v: u32) {
        if self.radius != v {
            self.radius = v;
            self.common.changed();
        }
    }
}

impl PostEffect for Knob {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        "knob"
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

#[test]
fn bracket_with_two_changes_bumps_crc_once() {
    let mut fx = Knob::new(PostEffectStage::Early);
    let before = fx.common().crc();
    {
        let mut b = fx.begin_change();
        b.set_strength(2.0);
        b.set_radius(4);
        assert!(b.common().is_changing());
        assert_eq!(b.common().crc(), before);
    }
    assert_eq!(fx.common().crc(), before + 1);
    assert!(!fx.common().is_changing());
}

#[test]
fn nested_brackets_bump_once_at_outermost_end() {
    let mut fx = Knob::new(PostEffectStage::Late);
    {
        let mut outer = fx.begin_change();
        outer.set_strength(3.0);
        {
            let mut inner = outer.begin_change();
            inner.set_radius(9);
        }
        assert_eq!(outer.common().crc(), 0);
    }
    assert_eq!(fx.common().crc(), 1);
}

#[test]
fn bracket_without_changes_leaves_crc() {
    let mut fx = Knob::new(PostEffectStage::Early);
    {
        let mut b = fx.begin_change();
        b.set_strength(1.0);
    }
    assert_eq!(fx.common().crc(), 0);
}

#[test]
fn change_outside_bracket_bumps_immediately() {
    let mut fx = Knob::new(PostEffectStage::Early);
    fx.set_strength(5.0);
    fx.set_radius(2);
    assert_eq!(fx.common().crc(), 2);
}

#[test]
fn default_flags_drive_initial_state() {
    let fx = Knob::new(PostEffectStage::Early);
    assert!(!fx.common().is_on());
    assert!(fx.common().is_shown());
    assert!(!fx.common().is_selected());
}

#[test]
fn on_and_shown_apply_to_listed_stages_only() {
    let mut early = Knob::new(PostEffectStage::Early);
    {
        let mut b = early.begin_change();
        assert!(b.set_on(true));
        assert!(!b.set_on(true));
        assert!(!b.set_selected(true));
    }
    assert!(early.common().is_on());
    assert_eq!(early.common().crc(), 1);

    let mut tone = Knob::new(PostEffectStage::ToneMapping);
    {
        let mut b = tone.begin_change();
        assert!(!b.set_on(true));
        assert!(b.set_selected(true));
    }
    assert!(tone.common().is_selected());
}

#[test]
fn fixed_effects_cannot_be_hidden() {
    let mut fx = Knob::new(PostEffectStage::Late);
    fx.common = PostEffectCommon::new(PostEffectStage::Late, PostEffectFlags::FIXED);
    assert!(fx.common().is_shown());
    let mut b = fx.begin_change();
    assert!(!b.set_shown(false));
    drop(b);
    assert!(fx.common().is_shown());
}

#[test]
fn context_flag_maps_one_to_one() {
    assert_eq!(ExecutionContext::Production.flag(), PostEffectFlags::PRODUCTION);
    assert_eq!(ExecutionContext::HdrConversion.flag(), PostEffectFlags::HDR_CONVERSION);
    assert!(PostEffectFlags::ALL_CONTEXTS.contains(ExecutionContext::Thumbnail.flag()));
}
