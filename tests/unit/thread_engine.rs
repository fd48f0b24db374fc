use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::foundation::core::PixelSize;

#[derive(Clone)]
struct Scale {
    factor: f32,
    log: Arc<Mutex<Vec<f32>>>,
}

impl PostEffectJob for Scale {
    fn clone_job(&self) -> Box<dyn PostEffectJob> {
        Box::new(self.clone())
    }

    fn execute(
        &mut self,
        _rect: PixelRect,
        channels: &mut JobChannels,
        _cancel: &CancelToken,
    ) -> PostResult<()> {
        self.log.lock().push(self.factor);
        let ch = channels
            .get_mut(ChannelId::Luminance)
            .ok_or_else(|| PostError::channel("no luminance"))?;
        for v in ch.data_mut() {
            *v *= self.factor;
        }
        Ok(())
    }
}

struct Fails;

impl PostEffectJob for Fails {
    fn clone_job(&self) -> Box<dyn PostEffectJob> {
        Box::new(Fails)
    }

    fn execute(&mut self, _: PixelRect, _: &mut JobChannels, _: &CancelToken) -> PostResult<()> {
        Err(PostError::pipeline("boom"))
    }
}

struct Panics;

impl PostEffectJob for Panics {
    fn clone_job(&self) -> Box<dyn PostEffectJob> {
        Box::new(Panics)
    }

    fn execute(&mut self, _: PixelRect, _: &mut JobChannels, _: &CancelToken) -> PostResult<()> {
        panic!("job panic");
    }
}

fn luminance_channels(value: f32) -> JobChannels {
    let mut ch = Channel::new(ChannelId::Luminance, PixelSize::new(2, 2)).unwrap();
    ch.fill(&[value]);
    let mut out = JobChannels::default();
    out.insert(ch);
    out
}

#[test]
fn run_returns_processed_snapshot() {
    let engine = ThreadEngine::new().unwrap();
    let job = Scale {
        factor: 3.0,
        log: Arc::default(),
    };
    let out = engine
        .run(
            &job,
            Uuid::new_v4(),
            PixelRect::new(0, 0, 2, 2),
            luminance_channels(2.0),
            &CancelToken::new(),
        )
        .unwrap();
    let ch = out.get(ChannelId::Luminance).unwrap();
    assert!(ch.data().iter().all(|v| *v == 6.0));
    assert_eq!(job.log.lock().len(), 1);
}

#[test]
fn jobs_run_in_submission_order() {
    let engine = ThreadEngine::new().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let tickets: Vec<_> = (1..=5)
        .map(|i| {
            let job = Scale {
                factor: i as f32,
                log: Arc::clone(&log),
            };
            engine
                .submit(
                    &job,
                    Uuid::new_v4(),
                    PixelRect::new(0, 0, 2, 2),
                    luminance_channels(1.0),
                    &CancelToken::new(),
                )
                .unwrap()
        })
        .collect();
    for t in tickets {
        t.wait().unwrap();
    }
    assert_eq!(*log.lock(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn failures_and_panics_become_errors() {
    let engine = ThreadEngine::new().unwrap();
    let rect = PixelRect::new(0, 0, 1, 1);
    let err = engine
        .run(&Fails, Uuid::new_v4(), rect, JobChannels::default(), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PostError::Pipeline(_)));

    let err = engine
        .run(&Panics, Uuid::new_v4(), rect, JobChannels::default(), &CancelToken::new())
        .unwrap_err();
    assert!(err.to_string().contains("panicked"));

    // The worker survives a panicking job.
    assert!(
        engine
            .run(&Fails, Uuid::new_v4(), rect, JobChannels::default(), &CancelToken::new())
            .is_err()
    );
}

#[test]
fn canceled_token_skips_job() {
    let engine = ThreadEngine::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    struct Count(Arc<AtomicUsize>);
    impl PostEffectJob for Count {
        fn clone_job(&self) -> Box<dyn PostEffectJob> {
            Box::new(Count(Arc::clone(&self.0)))
        }
        fn execute(&mut self, _: PixelRect, _: &mut JobChannels, _: &CancelToken) -> PostResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
    let token = CancelToken::new();
    token.cancel();
    let err = engine
        .run(
            &Count(Arc::clone(&calls)),
            Uuid::new_v4(),
            PixelRect::new(0, 0, 1, 1),
            JobChannels::default(),
            &token,
        )
        .unwrap_err();
    assert!(err.is_canceled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn try_wait_eventually_yields_and_drop_joins() {
    let engine = ThreadEngine::new().unwrap();
    let job = Scale {
        factor: 2.0,
        log: Arc::default(),
    };
    let ticket = engine
        .submit(
            &job,
            Uuid::new_v4(),
            PixelRect::new(0, 0, 2, 2),
            luminance_channels(1.0),
            &CancelToken::new(),
        )
        .unwrap();
    let res = loop {
        if let Some(r) = ticket.try_wait() {
            break r;
        }
        std::thread::yield_now();
    };
    assert!(res.is_ok());
    drop(engine);
}
