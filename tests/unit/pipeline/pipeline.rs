use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use smallvec::smallvec;

use super::*;
use crate::post_effect::builtin::{Gamma, GaussianBlur, ReinhardToneMapper};
use crate::post_effect::{PostEffectCommon, PostEffectExt};

type Body = Box<dyn Fn(&mut PipelineView<'_>, PixelRect) -> PostResult<()> + Send + Sync>;

struct Stub {
    id: Uuid,
    common: PostEffectCommon,
    required: SmallVec<[ChannelId; 4]>,
    policy: ExecuteWhileRendering,
    calls: Arc<AtomicUsize>,
    body: Body,
}

impl PostEffect for Stub {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        "stub"
    }
    fn common(&self) -> &PostEffectCommon {
        &self.common
    }
    fn common_mut(&mut self) -> &mut PostEffectCommon {
        &mut self.common
    }
    fn required_channels(&self) -> SmallVec<[ChannelId; 4]> {
        self.required.clone()
    }
    fn execute_while_rendering(&self) -> ExecuteWhileRendering {
        self.policy
    }
    fn execute(&self, view: &mut PipelineView<'_>, rect: PixelRect) -> PostResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.body)(view, rect)
    }
}

fn stub(stage: PostEffectStage, body: Body) -> Stub {
    let mut s = Stub {
        id: Uuid::new_v4(),
        common: PostEffectCommon::new(
            stage,
            PostEffectFlags::ALL_CONTEXTS | PostEffectFlags::DEFAULT_SHOWN,
        ),
        required: smallvec![ChannelId::Rgba],
        policy: ExecuteWhileRendering::Always,
        calls: Arc::default(),
        body,
    };
    {
        let mut b = s.begin_change();
        b.set_on(true);
        b.set_selected(true);
    }
    s
}

fn noop() -> Body {
    Box::new(|_view: &mut PipelineView<'_>, _rect: PixelRect| Ok(()))
}

/// Map every colour pixel of the whole frame.
fn map_rgba(f: impl Fn(&mut [f32]) + Send + Sync + 'static) -> Body {
    Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
        let src = view
            .channel_for_read(ChannelId::Rgba)
            .ok_or_else(|| PostError::channel("rgba"))?;
        let mut out = view.channel_for_write(ChannelId::Rgba)?;
        out.copy_from(&src)?;
        for px in out.data_mut().chunks_exact_mut(4) {
            f(px);
        }
        out.commit();
        Ok(())
    })
}

fn frame(w: u32, h: u32, px: [f32; 4]) -> Arc<FrameBuffer> {
    let fb = FrameBuffer::new(PixelSize::new(w, h)).unwrap();
    fb.open_channel(ChannelId::Rgba).unwrap().fill(&px);
    Arc::new(fb)
}

fn pipeline(fb: &Arc<FrameBuffer>, flags: CreationFlags) -> PostEffectPipeline {
    PostEffectPipeline::new(
        Arc::clone(fb),
        ExecutionContext::Production,
        flags,
        PipelineOpts::default(),
    )
    .unwrap()
}

fn collection(effects: Vec<Stub>) -> PostEffectCollection {
    let mut c = PostEffectCollection::new();
    for e in effects {
        c.register(Box::new(e)).unwrap();
    }
    c
}

#[test]
fn early_then_late_chain_matches_expected_pixels() {
    let fb = frame(4, 4, [0.0, 0.0, 0.0, 1.0]);
    let e1 = stub(PostEffectStage::Early, map_rgba(|px| px[0] += 0.5));
    let e2 = stub(
        PostEffectStage::Late,
        map_rgba(|px| px.iter_mut().for_each(|v| *v = 1.0 - *v)),
    );
    let effects = collection(vec![e1, e2]);

    let mut p = pipeline(&fb, CreationFlags::empty());
    let report = p.execute(&effects, &ExecuteOpts::default()).unwrap();
    assert_eq!(report.executed.len(), 2);
    assert!(report.clamped);

    let out = p.output(ChannelId::Rgba).unwrap();
    for px in out.data().chunks_exact(4) {
        assert_eq!(px, &[0.5, 1.0, 1.0, 0.0]);
    }
    let published = fb.post_processed(ChannelId::Rgba).unwrap();
    assert_eq!(published.data(), out.data());
    let raw = fb.snapshot_channel(ChannelId::Rgba).unwrap();
    assert_eq!(raw.get_value(3, 3), &[0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn later_effect_reads_earlier_commit() {
    let fb = frame(1, 1, [0.0, 0.0, 0.0, 1.0]);
    let x = ChannelId::Custom(7);
    fb.add_channel(x, 1).unwrap();
    fb.open_channel(x).unwrap().fill(&[1.0]);

    let mut a = stub(
        PostEffectStage::Early,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            let mut w = view.channel_for_write(x)?;
            w.fill(&[2.0]);
            w.commit();
            Ok(())
        }),
    );
    a.required = smallvec![x];
    let seen = Arc::new(Mutex::new(None));
    let seen_b = Arc::clone(&seen);
    let mut b = stub(
        PostEffectStage::Early,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            let ch = view.channel_for_read(x).ok_or_else(|| PostError::channel("x"))?;
            *seen_b.lock() = Some(ch.get_value(0, 0)[0]);
            Ok(())
        }),
    );
    b.required = smallvec![x];

    let mut p = pipeline(&fb, CreationFlags::empty());
    p.execute(&collection(vec![a, b]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(*seen.lock(), Some(2.0));
    let raw = fb.snapshot_channel(x).unwrap();
    assert_eq!(raw.get_value(0, 0), &[1.0]);
}

#[test]
fn commits_apply_after_execute_returns() {
    let fb = frame(1, 1, [0.25, 0.0, 0.0, 1.0]);
    let seen = Arc::new(Mutex::new(None));
    let seen_in = Arc::clone(&seen);
    let e = stub(
        PostEffectStage::Early,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            let mut w = view.channel_for_write(ChannelId::Rgba)?;
            w.fill(&[0.75, 0.0, 0.0, 1.0]);
            w.commit();
            let again = view
                .channel_for_read(ChannelId::Rgba)
                .ok_or_else(|| PostError::channel("rgba"))?;
            *seen_in.lock() = Some(again.get_value(0, 0)[0]);
            Ok(())
        }),
    );
    let mut p = pipeline(&fb, CreationFlags::empty());
    p.execute(&collection(vec![e]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(*seen.lock(), Some(0.25));
    assert_eq!(p.output(ChannelId::Rgba).unwrap().get_value(0, 0)[0], 0.75);
}

#[test]
fn uncommitted_scratch_leaves_no_trace() {
    let fb = frame(2, 2, [0.1, 0.2, 0.3, 1.0]);
    let scratch = ChannelId::Custom(99);
    let a = stub(
        PostEffectStage::Early,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            let mut tmp = view.channel_for_write_with(scratch, 2)?;
            tmp.fill(&[9.0, 9.0]);
            let mut rgba = view.channel_for_write(ChannelId::Rgba)?;
            rgba.fill(&[9.0, 9.0, 9.0, 9.0]);
            Ok(())
        }),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::clone(&seen);
    let b = stub(
        PostEffectStage::Early,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            let ch = view
                .channel_for_read(ChannelId::Rgba)
                .ok_or_else(|| PostError::channel("rgba"))?;
            seen_b.lock().extend_from_slice(ch.get_value(1, 1));
            Ok(())
        }),
    );

    let mut p = pipeline(&fb, CreationFlags::empty());
    p.execute(&collection(vec![a, b]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(*seen.lock(), vec![0.1, 0.2, 0.3, 1.0]);
    assert!(!p.channel_ids().contains(&scratch));
    assert!(p.output(scratch).is_none());
    assert!(fb.post_processed(scratch).is_none());
    assert!(!fb.has_channel(scratch));
}

#[test]
fn hdr_values_are_clamped_before_late_effects() {
    let fb = frame(2, 1, [5.0, 2.0, 0.5, 3.0]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_late = Arc::clone(&seen);
    let late = stub(
        PostEffectStage::Late,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            let ch = view
                .channel_for_read(ChannelId::Rgba)
                .ok_or_else(|| PostError::channel("rgba"))?;
            seen_late.lock().extend_from_slice(ch.get_value(0, 0));
            Ok(())
        }),
    );
    let mut p = pipeline(&fb, CreationFlags::empty());
    let report = p
        .execute(&collection(vec![late]), &ExecuteOpts::default())
        .unwrap();
    assert!(report.clamped);
    assert_eq!(report.tone_mapper, None);
    assert_eq!(*seen.lock(), vec![1.0, 1.0, 0.5, 1.0]);
    assert!(p.max_luminance() > 1.0);
}

#[test]
fn clamp_follows_the_selected_tone_mapper() {
    let fb = frame(1, 1, [0.5, 0.5, 0.5, 1.0]);
    let tm = stub(PostEffectStage::ToneMapping, map_rgba(|px| px[0] = 5.0));
    let tm_id = tm.id;
    let mut p = pipeline(&fb, CreationFlags::empty());
    let report = p
        .execute(&collection(vec![tm]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(report.tone_mapper, Some(tm_id));
    assert_eq!(p.output(ChannelId::Rgba).unwrap().get_value(0, 0)[0], 1.0);
}

#[test]
fn late_effects_never_run_without_tone_mapping() {
    let fb = frame(2, 2, [5.0, 5.0, 5.0, 1.0]);
    let late = stub(PostEffectStage::Late, noop());
    let calls = Arc::clone(&late.calls);
    let early = stub(PostEffectStage::Early, noop());
    let early_calls = Arc::clone(&early.calls);

    let mut p = pipeline(&fb, CreationFlags::DISABLE_TONE_MAPPING);
    let report = p
        .execute(&collection(vec![early, late]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(early_calls.load(Ordering::SeqCst), 1);
    assert!(!report.clamped);
    assert!(report.late_skipped);
    assert!(p.output(ChannelId::Rgba).is_none_or(|ch| ch.get_value(0, 0)[0] == 5.0));
}

#[test]
fn hdr_conversion_context_skips_late_stage() {
    let fb = frame(1, 1, [2.0, 0.0, 0.0, 1.0]);
    let late = stub(PostEffectStage::Late, noop());
    let calls = Arc::clone(&late.calls);
    let mut p = PostEffectPipeline::new(
        Arc::clone(&fb),
        ExecutionContext::HdrConversion,
        CreationFlags::empty(),
        PipelineOpts::default(),
    )
    .unwrap();
    p.execute(&collection(vec![late]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_effect_aborts_chain_and_keeps_overlay() {
    let fb = frame(2, 2, [0.2, 0.2, 0.2, 1.0]);
    let failing = stub(
        PostEffectStage::Early,
        Box::new(|view: &mut PipelineView<'_>, _rect: PixelRect| {
            let mut w = view.channel_for_write(ChannelId::Rgba)?;
            w.fill(&[0.9, 0.9, 0.9, 1.0]);
            w.commit();
            Err(PostError::pipeline("boom"))
        }),
    );
    let next = stub(PostEffectStage::Early, noop());
    let next_calls = Arc::clone(&next.calls);

    let mut p = pipeline(&fb, CreationFlags::empty());
    let err = p
        .execute(&collection(vec![failing, next]), &ExecuteOpts::default())
        .unwrap_err();
    assert!(matches!(err, PostError::Pipeline(_)));
    assert_eq!(next_calls.load(Ordering::SeqCst), 0);
    assert!(fb.post_processed(ChannelId::Rgba).is_none());
    // The partial commit is not rolled back.
    assert_eq!(p.output(ChannelId::Rgba).unwrap().get_value(0, 0)[0], 0.9);
}

#[test]
fn missing_channels_skip_only_that_effect() {
    let fb = frame(1, 1, [0.0, 0.0, 0.0, 1.0]);
    let mut needs_depth = stub(PostEffectStage::Early, noop());
    needs_depth.required = smallvec![ChannelId::Rgba, ChannelId::DistanceFromCamera];
    let skipped_id = needs_depth.id;
    let skipped_calls = Arc::clone(&needs_depth.calls);
    let other = stub(PostEffectStage::Early, noop());
    let other_calls = Arc::clone(&other.calls);

    let mut p = pipeline(&fb, CreationFlags::empty());
    let report = p
        .execute(&collection(vec![needs_depth, other]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(skipped_calls.load(Ordering::SeqCst), 0);
    assert_eq!(other_calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.skipped_missing_channels, vec![skipped_id]);
    assert_eq!(p.missing_channel_effects(), &[skipped_id]);
}

#[test]
fn undeclared_channels_are_not_readable() {
    let fb = frame(1, 1, [0.0, 0.0, 0.0, 1.0]);
    fb.add_channel(ChannelId::DistanceFromCamera, 1).unwrap();
    let got = Arc::new(Mutex::new(None));
    let got_in = Arc::clone(&got);
    let e = stub(
        PostEffectStage::Early,
        Box::new(move |view: &mut PipelineView<'_>, _rect: PixelRect| {
            *got_in.lock() = Some((
                view.channel_for_read(ChannelId::DistanceFromCamera).is_some(),
                view.channel_for_read(ChannelId::Green).is_some(),
            ));
            Ok(())
        }),
    );
    let mut p = pipeline(&fb, CreationFlags::empty());
    p.execute(&collection(vec![e]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(*got.lock(), Some((false, true)));
}

#[test]
fn partial_rect_commit_keeps_outside_pixels() {
    let fb = frame(4, 4, [0.1, 0.1, 0.1, 1.0]);
    let e = stub(
        PostEffectStage::Early,
        Box::new(|view: &mut PipelineView<'_>, rect: PixelRect| {
            let mut w = view.channel_for_write(ChannelId::Rgba)?;
            for y in rect.rows() {
                for x in rect.x..rect.x + rect.width {
                    w.get_value_mut(x, y).copy_from_slice(&[0.9, 0.9, 0.9, 1.0]);
                }
            }
            w.commit();
            Ok(())
        }),
    );
    let mut p = pipeline(&fb, CreationFlags::empty());
    let opts = ExecuteOpts {
        rect: Some(PixelRect::new(1, 1, 2, 2)),
        ..ExecuteOpts::default()
    };
    p.execute(&collection(vec![e]), &opts).unwrap();
    let out = p.output(ChannelId::Rgba).unwrap();
    assert_eq!(out.get_value(1, 1), &[0.9, 0.9, 0.9, 1.0]);
    assert_eq!(out.get_value(0, 0), &[0.1, 0.1, 0.1, 1.0]);
    assert_eq!(out.get_value(3, 3), &[0.1, 0.1, 0.1, 1.0]);
}

#[test]
fn tile_runs_accumulate_in_the_published_overlay() {
    let fb = frame(4, 1, [5.0, 5.0, 5.0, 1.0]);
    let effects = PostEffectCollection::with_builtins();
    let mut p = pipeline(&fb, CreationFlags::DISABLE_GAMMA);
    let tile = |x| ExecuteOpts {
        rect: Some(PixelRect::new(x, 0, 2, 1)),
        ..ExecuteOpts::default()
    };

    p.execute(&effects, &tile(0)).unwrap();
    let out = fb.post_processed(ChannelId::Rgba).unwrap();
    assert_eq!(out.get_value(0, 0), &[1.0, 1.0, 1.0, 1.0]);
    assert_eq!(out.get_value(3, 0), &[5.0, 5.0, 5.0, 1.0]);

    p.execute(&effects, &tile(2)).unwrap();
    let out = fb.post_processed(ChannelId::Rgba).unwrap();
    for x in 0..4 {
        assert_eq!(out.get_value(x, 0), &[1.0, 1.0, 1.0, 1.0], "pixel {x}");
    }
    assert_eq!(fb.take_dirty(), Some(PixelRect::new(0, 0, 4, 1)));
    // the rendered frame itself is untouched
    let raw = fb.snapshot_channel(ChannelId::Rgba).unwrap();
    assert_eq!(raw.get_value(1, 0), &[5.0, 5.0, 5.0, 1.0]);
}

#[test]
fn empty_frames_run_the_builtin_chain() {
    for size in [(0, 4), (4, 0), (0, 0)] {
        let fb = frame(size.0, size.1, [2.0, 2.0, 2.0, 1.0]);
        let mut effects = PostEffectCollection::with_builtins();
        effects
            .get_mut(GaussianBlur::ID)
            .unwrap()
            .begin_change()
            .set_on(true);
        let mut p = pipeline(&fb, CreationFlags::empty());
        let report = p
            .execute(&effects, &ExecuteOpts::default())
            .unwrap_or_else(|e| panic!("{size:?}: {e}"));
        assert!(report.executed.contains(&Gamma::ID));
        assert!(fb.post_processed(ChannelId::Rgba).is_some());
    }
}

#[test]
fn component_commit_updates_base_colour() {
    let fb = frame(1, 1, [0.1, 0.2, 0.3, 1.0]);
    let e = stub(
        PostEffectStage::Early,
        Box::new(|view: &mut PipelineView<'_>, _rect: PixelRect| {
            let mut green = view.channel_for_write(ChannelId::Green)?;
            green.fill(&[0.8]);
            green.commit();
            Ok(())
        }),
    );
    let mut p = pipeline(&fb, CreationFlags::empty());
    p.execute(&collection(vec![e]), &ExecuteOpts::default())
        .unwrap();
    assert_eq!(
        p.output(ChannelId::Rgba).unwrap().get_value(0, 0),
        &[0.1, 0.8, 0.3, 1.0]
    );
}

#[test]
fn rect_outside_frame_is_rejected() {
    let fb = frame(2, 2, [0.0; 4]);
    let mut p = pipeline(&fb, CreationFlags::empty());
    let opts = ExecuteOpts {
        rect: Some(PixelRect::new(1, 1, 2, 2)),
        ..ExecuteOpts::default()
    };
    assert!(matches!(
        p.execute(&PostEffectCollection::new(), &opts),
        Err(PostError::Validation(_))
    ));
}

#[test]
fn in_progress_policies_filter_effects() {
    let fb = frame(1, 1, [0.0, 0.0, 0.0, 1.0]);
    let mut never = stub(PostEffectStage::Early, noop());
    never.policy = ExecuteWhileRendering::Never;
    let mut delayed = stub(PostEffectStage::Early, noop());
    delayed.policy = ExecuteWhileRendering::UseDelay(Duration::from_secs(1));
    let mut controlled = stub(PostEffectStage::Early, noop());
    controlled.policy = ExecuteWhileRendering::UseExecutionControl;
    let (never_id, delayed_id, controlled_id) = (never.id, delayed.id, controlled.id);
    let effects = collection(vec![never, delayed, controlled]);

    let mut p = pipeline(&fb, CreationFlags::empty());
    let early = ExecuteOpts {
        rendering_in_progress: true,
        render_elapsed: Some(Duration::from_millis(10)),
        ..ExecuteOpts::default()
    };
    let report = p.execute(&effects, &early).unwrap();
    assert_eq!(
        report.skipped_in_progress,
        vec![never_id, delayed_id, controlled_id]
    );

    p.set_execution_control(Some(Box::new(
        move |e: &dyn PostEffect, _info: &PipelineInfo| e.id() == controlled_id,
    )));
    let later = ExecuteOpts {
        render_elapsed: Some(Duration::from_secs(2)),
        ..early
    };
    let report = p.execute(&effects, &later).unwrap();
    assert_eq!(report.executed, vec![delayed_id, controlled_id]);

    let done = p.execute(&effects, &ExecuteOpts::default()).unwrap();
    assert_eq!(done.executed.len(), 3);
}

#[test]
fn disabled_gamma_skips_gamma_effects() {
    let fb = frame(1, 1, [0.25, 0.25, 0.25, 1.0]);
    let mut effects = PostEffectCollection::new();
    effects.register(Box::new(Gamma::new())).unwrap();

    let mut p = pipeline(&fb, CreationFlags::DISABLE_GAMMA);
    let report = p.execute(&effects, &ExecuteOpts::default()).unwrap();
    assert!(!report.executed.contains(&Gamma::ID));

    let mut p = pipeline(&fb, CreationFlags::empty());
    let report = p.execute(&effects, &ExecuteOpts::default()).unwrap();
    assert!(report.executed.contains(&Gamma::ID));
    let v = p.output(ChannelId::Rgba).unwrap().get_value(0, 0)[0];
    assert!((v - 0.25f32.powf(1.0 / 2.2)).abs() < 1e-5);
}

#[test]
fn progress_callback_can_cancel() {
    let fb = frame(2, 8, [0.0, 0.0, 0.0, 1.0]);
    let e = stub(
        PostEffectStage::Early,
        Box::new(|view: &mut PipelineView<'_>, rect: PixelRect| {
            for y in 0..rect.height {
                if !view.report_progress(y + 1) {
                    return Err(PostError::Canceled);
                }
            }
            Ok(())
        }),
    );
    let fractions = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&fractions);
    let mut p = pipeline(&fb, CreationFlags::empty());
    p.set_progress_callback(Some(Box::new(move |f: f32| {
        seen.lock().push(f);
        f < 0.5
    })));
    let err = p
        .execute(&collection(vec![e]), &ExecuteOpts::default())
        .unwrap_err();
    assert!(err.is_canceled());
    assert!(p.cancel_token().is_canceled());
    assert_eq!(fractions.lock().last().copied(), Some(0.5));

    p.set_cancel_token(CancelToken::new());
    p.set_progress_callback(None);
    assert!(p.execute(&PostEffectCollection::new(), &ExecuteOpts::default()).is_ok());
}

#[test]
fn histograms_are_captured_on_request() {
    let fb = frame(4, 4, [0.5, 0.5, 0.5, 1.0]);
    let mut p = pipeline(&fb, CreationFlags::empty());
    let opts = ExecuteOpts {
        histograms: HistogramFlags::BEFORE_EARLY | HistogramFlags::AFTER_LATE,
        ..ExecuteOpts::default()
    };
    p.execute(&PostEffectCollection::new(), &opts).unwrap();
    assert_eq!(p.histogram(HistogramPoint::BeforeEarly).unwrap().samples(), 16);
    assert!(p.histogram(HistogramPoint::AfterLate).is_some());
    assert!(p.histogram(HistogramPoint::BeforeToneMapping).is_none());
}

#[test]
fn builtin_chain_tone_maps_and_blurs() {
    let fb = frame(6, 6, [4.0, 2.0, 1.0, 1.0]);
    let mut effects = PostEffectCollection::with_builtins();
    effects.select_tone_mapper(ReinhardToneMapper::ID).unwrap();
    effects
        .get_mut(GaussianBlur::ID)
        .unwrap()
        .begin_change()
        .set_on(true);

    let mut p = PostEffectPipeline::new(
        Arc::clone(&fb),
        ExecutionContext::Production,
        CreationFlags::empty(),
        PipelineOpts {
            threads: Some(2),
            ..PipelineOpts::default()
        },
    )
    .unwrap();
    let report = p.execute(&effects, &ExecuteOpts::default()).unwrap();
    assert_eq!(report.tone_mapper, Some(ReinhardToneMapper::ID));
    assert!(report.executed.contains(&GaussianBlur::ID));
    let px = p.output(ChannelId::Rgba).unwrap().get_value(3, 3).to_vec();
    assert!(px[..3].iter().all(|v| *v > 0.0 && *v <= 1.0 + 1e-5));
    assert!(px[0] > px[1] && px[1] > px[2]);
}
