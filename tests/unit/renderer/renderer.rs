use std::time::{Duration, Instant};

use super::*;
use crate::session::RenderStatus;

fn opts(line_interval_ms: u64) -> ScanlineRendererOpts {
    ScanlineRendererOpts {
        line_interval_ms,
        ..ScanlineRendererOpts::default()
    }
}

fn wait_idle<S: PixelSource>(r: &ScanlineRenderer<S>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while r.is_running() {
        assert!(Instant::now() < deadline, "worker never finished");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn stop_returns_after_worker_exit_and_drops_frame_buffer() {
    let mut r = ScanlineRenderer::new(GradientSource, opts(5));
    r.start_render_process(PixelSize::new(8, 100)).unwrap();
    assert!(r.frame_buffer().is_some());
    assert!(r.is_running());

    r.stop_render_process();
    assert!(r.frame_buffer().is_none());
    assert!(!r.is_running());

    // a fresh start after a stop builds a new buffer
    r.start_render_process(PixelSize::new(4, 4)).unwrap();
    assert_eq!(r.frame_buffer().unwrap().size(), PixelSize::new(4, 4));
    r.stop_render_process();
}

#[test]
fn start_while_running_is_a_no_op() {
    let mut r = ScanlineRenderer::new(GradientSource, opts(5));
    r.start_render_process(PixelSize::new(8, 100)).unwrap();
    let first = Arc::clone(r.frame_buffer().unwrap());
    r.start_render_process(PixelSize::new(8, 100)).unwrap();
    assert!(Arc::ptr_eq(&first, r.frame_buffer().unwrap()));
    r.stop_render_process();
}

#[test]
fn gradient_fills_every_line() {
    let mut r = ScanlineRenderer::new(GradientSource, opts(0));
    r.start_render_process(PixelSize::new(5, 3)).unwrap();
    wait_idle(&r);
    let fb = Arc::clone(r.frame_buffer().unwrap());
    assert_eq!(fb.progress().percent, Some(100));
    assert_eq!(fb.take_dirty(), Some(PixelRect::new(0, 0, 5, 3)));

    let rgba = fb.snapshot_channel(ChannelId::Rgba).unwrap();
    assert_eq!(rgba.get_value(0, 0), &[0.0, 0.0, 0.25, 1.0]);
    assert_eq!(rgba.get_value(4, 2), &[1.0, 1.0, 0.25, 1.0]);
    assert!(!fb.has_channel(ChannelId::DistanceFromCamera));
}

#[test]
fn hdr_source_writes_depth_and_overbright_colour() {
    let mut r = ScanlineRenderer::new(HdrSunSource::default(), opts(0));
    r.start_render_process(PixelSize::new(40, 30)).unwrap();
    wait_idle(&r);
    let fb = r.frame_buffer().unwrap();
    let rgba = fb.snapshot_channel(ChannelId::Rgba).unwrap();
    let (_, max) = rgba.min_max().unwrap();
    assert!(max > 1.0);

    let depth = fb.snapshot_channel(ChannelId::DistanceFromCamera).unwrap();
    let near = depth.get_value(0, 29)[0];
    let far = depth.get_value(0, 0)[0];
    assert!(near < far);
}

#[test]
fn depth_can_be_switched_off() {
    let mut r = ScanlineRenderer::new(
        HdrSunSource::default(),
        ScanlineRendererOpts {
            line_interval_ms: 0,
            depth: false,
            ..ScanlineRendererOpts::default()
        },
    );
    r.start_render_process(PixelSize::new(4, 4)).unwrap();
    wait_idle(&r);
    assert!(!r.frame_buffer().unwrap().has_channel(ChannelId::DistanceFromCamera));
}

#[test]
fn busy_colour_channel_holds_the_worker_back() {
    let mut r = ScanlineRenderer::new(GradientSource, opts(1));
    r.start_render_process(PixelSize::new(4, 100)).unwrap();
    let fb = Arc::clone(r.frame_buffer().unwrap());

    let guard = loop {
        if let Some(g) = fb.open_channel(ChannelId::Rgba) {
            break g;
        }
    };
    std::thread::sleep(Duration::from_millis(10));
    let held = fb.progress().percent;
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(fb.progress().percent, held);
    assert!(r.is_running());
    guard.close();

    wait_idle(&r);
    assert_eq!(fb.progress().percent, Some(100));
}

#[test]
fn drives_a_render_control() {
    let mut r = ScanlineRenderer::new(GradientSource, opts(0));
    let fb = Arc::new(FrameBuffer::new(PixelSize::new(3, 3)).unwrap());
    let control = RenderControl::detached();
    AsyncRenderContext::start(&mut r, Arc::clone(&fb), control.clone()).unwrap();
    wait_idle(&r);
    assert_eq!(control.status(), RenderStatus::Completed);
    assert!(Arc::ptr_eq(r.frame_buffer().unwrap(), &fb));

    let idle = r.idle_clone();
    assert!(!idle.is_running());
    AsyncRenderContext::stop(&mut r);
    assert!(r.frame_buffer().is_none());
}

#[test]
fn zero_width_frame_still_completes() {
    let mut r = ScanlineRenderer::new(HdrSunSource::default(), opts(0));
    let fb = Arc::new(FrameBuffer::new(PixelSize::new(0, 3)).unwrap());
    let control = RenderControl::detached();
    AsyncRenderContext::start(&mut r, Arc::clone(&fb), control.clone()).unwrap();
    wait_idle(&r);
    assert_eq!(control.status(), RenderStatus::Completed);
    assert_eq!(fb.progress().percent, Some(100));
    assert!(fb.snapshot_channel(ChannelId::Rgba).unwrap().data().is_empty());
}
