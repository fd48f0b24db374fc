//! Sample asynchronous renderer: one worker thread filling the frame buffer scan-line by
//! scan-line.

mod source;

pub use source::{GradientSource, HdrSunSource, PixelSource};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::channel::ChannelId;
use crate::config::ScanlineRendererOpts;
use crate::foundation::core::{PixelRect, PixelSize};
use crate::foundation::error::{PostError, PostResult};
use crate::frame_buffer::FrameBuffer;
use crate::session::{AsyncRenderContext, RenderControl};

/// Renders a [`PixelSource`] into a frame buffer on a background thread.
///
/// Every scan-line is published by opening the colour channel, writing the row and closing
/// the channel again, so readers never see a half-written line.
pub struct ScanlineRenderer<S: PixelSource> {
    source: Arc<S>,
    opts: ScanlineRendererOpts,
    frame_buffer: Option<Arc<FrameBuffer>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    control: Option<RenderControl>,
}

impl<S: PixelSource> std::fmt::Debug for ScanlineRenderer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanlineRenderer")
            .field("opts", &self.opts)
            .field("frame_buffer", &self.frame_buffer)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<S: PixelSource> ScanlineRenderer<S> {
    /// Idle renderer.
    pub fn new(source: S, opts: ScanlineRendererOpts) -> Self {
        Self::with_shared(Arc::new(source), opts)
    }

    /// Idle renderer over a source shared with other renderers.
    pub fn with_shared(source: Arc<S>, opts: ScanlineRendererOpts) -> Self {
        Self {
            source,
            opts,
            frame_buffer: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            control: None,
        }
    }

    /// Frame buffer being rendered, if any.
    pub fn frame_buffer(&self) -> Option<&Arc<FrameBuffer>> {
        self.frame_buffer.as_ref()
    }

    /// The worker is still producing lines.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start rendering a frame of `size` into the renderer's own frame buffer.
    ///
    /// Creates the frame buffer on first use and resizes it otherwise. Calling this while the
    /// worker runs is a no-op.
    pub fn start_render_process(&mut self, size: PixelSize) -> PostResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let fb = match &self.frame_buffer {
            Some(fb) => {
                if fb.size() != size {
                    fb.set_size(size)?;
                }
                Arc::clone(fb)
            }
            None => Arc::new(FrameBuffer::new(size)?),
        };
        self.frame_buffer = Some(Arc::clone(&fb));
        self.launch(fb, RenderControl::detached())
    }

    /// Stop the worker and wait for it to exit, then drop the thread handle and the frame
    /// buffer.
    pub fn stop_render_process(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(control) = &self.control {
            control.cancel();
        }
        self.reap();
        self.control = None;
        self.frame_buffer = None;
    }

    fn reap(&mut self) {
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            tracing::warn!("scan-line worker panicked");
        }
    }

    fn launch(&mut self, fb: Arc<FrameBuffer>, control: RenderControl) -> PostResult<()> {
        // a worker that finished on its own still has to be joined
        self.reap();

        let depth = self.opts.depth && self.source.has_depth();
        if depth && !fb.has_channel(ChannelId::DistanceFromCamera) {
            fb.add_channel(
                ChannelId::DistanceFromCamera,
                ChannelId::DistanceFromCamera.default_components(),
            )?;
        }
        // allocate up front so the worker never allocates under contention
        fb.pre_allocate_channel(ChannelId::Rgba)?;
        if depth {
            fb.pre_allocate_channel(ChannelId::DistanceFromCamera)?;
        }

        let worker = Worker {
            source: Arc::clone(&self.source),
            frame_buffer: fb,
            running: Arc::clone(&self.running),
            control: control.clone(),
            opts: self.opts.clone(),
            depth,
        };
        self.running.store(true, Ordering::SeqCst);
        let handle = std::thread::Builder::new()
            .name("postkit-scanline".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                PostError::session(format!("failed to spawn render worker: {e}"))
            })?;
        self.worker = Some(handle);
        self.control = Some(control);
        Ok(())
    }
}

impl<S: PixelSource> Drop for ScanlineRenderer<S> {
    fn drop(&mut self) {
        self.stop_render_process();
    }
}

impl<S: PixelSource> AsyncRenderContext for ScanlineRenderer<S> {
    fn start(&mut self, frame_buffer: Arc<FrameBuffer>, control: RenderControl) -> PostResult<()> {
        if self.is_running() {
            return Ok(());
        }
        self.frame_buffer = Some(Arc::clone(&frame_buffer));
        self.launch(frame_buffer, control)
    }

    fn stop(&mut self) {
        self.stop_render_process();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn idle_clone(&self) -> Box<dyn AsyncRenderContext> {
        Box::new(Self::with_shared(Arc::clone(&self.source), self.opts.clone()))
    }
}

struct Worker<S: PixelSource> {
    source: Arc<S>,
    frame_buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    control: RenderControl,
    opts: ScanlineRendererOpts,
    depth: bool,
}

impl<S: PixelSource> Worker<S> {
    fn run(self) {
        let size = self.frame_buffer.size();
        tracing::debug!(width = size.width, height = size.height, "scan-line worker started");
        match self.render_lines(size) {
            Ok(true) => {
                self.frame_buffer.set_progress("Done", 100);
                self.control.complete();
            }
            Ok(false) => tracing::debug!("scan-line worker stopped early"),
            Err(e) => self.control.fail(e.to_string()),
        }
        self.running.store(false, Ordering::SeqCst);
        self.frame_buffer.signal_update();
    }

    fn keep_going(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.control.is_canceled()
    }

    /// `Ok(false)` when stopped before the last line.
    fn render_lines(&self, size: PixelSize) -> PostResult<bool> {
        let width = size.width as usize;
        let mut colour = vec![0.0f32; width * 4];
        let mut distance = vec![0.0f32; width];
        for y in 0..size.height {
            if !self.keep_going() || !self.control.wait_if_paused() {
                return Ok(false);
            }
            for (x, px) in (0..size.width).zip(colour.chunks_exact_mut(4)) {
                px.copy_from_slice(&self.source.shade(x, y, size));
            }
            if !self.write_row(ChannelId::Rgba, y, &colour)? {
                return Ok(false);
            }
            if self.depth {
                for (x, d) in (0..size.width).zip(distance.iter_mut()) {
                    *d = self.source.depth(x, y, size);
                }
                if !self.write_row(ChannelId::DistanceFromCamera, y, &distance)? {
                    return Ok(false);
                }
            }

            let done = y + 1;
            self.frame_buffer
                .invalidate_area(PixelRect::new(0, y, size.width, 1));
            self.frame_buffer.set_progress(
                "Rendering",
                (u64::from(done) * 100 / u64::from(size.height)) as i32,
            );
            self.control
                .report_progress(done as f32 / size.height as f32);
            self.frame_buffer.signal_update();

            if done < size.height && !self.control.pause_for(self.opts.line_interval()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Open the channel, copy one row and close it. Retries while the channel is open
    /// elsewhere. `Ok(false)` when stopped while waiting.
    fn write_row(&self, id: ChannelId, y: u32, values: &[f32]) -> PostResult<bool> {
        loop {
            if !self.keep_going() {
                return Ok(false);
            }
            match self.frame_buffer.open_channel(id) {
                Some(mut ch) => {
                    if y >= ch.height() || ch.row(y).len() != values.len() {
                        return Err(PostError::channel(format!(
                            "channel {id:?} was resized during rendering"
                        )));
                    }
                    ch.row_mut(y).copy_from_slice(values);
                    ch.close();
                    return Ok(true);
                }
                None if !self.frame_buffer.has_channel(id) => {
                    return Err(PostError::channel(format!("channel {id:?} disappeared")));
                }
                None => {
                    if !self.control.pause_for(self.opts.busy_retry()) {
                        return Ok(false);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/renderer/renderer.rs"]
mod tests;
