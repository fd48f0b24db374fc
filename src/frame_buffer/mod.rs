//! The render window: a fixed-size set of channels shared between a render worker, the hosting
//! display layer and the post-effect pipeline.

mod dib;

pub use dib::DibGuard;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::channel::{Channel, ChannelId};
use crate::foundation::core::{PixelRect, PixelSize};
use crate::foundation::error::{PostError, PostResult};
use crate::foundation::math::unit_to_u8;

/// Notifications sent to the hosting display layer. All methods default to no-ops.
pub trait FrameBufferListener: Send + Sync {
    /// A region of the frame changed and should be repainted eventually.
    fn invalidated(&self, _rect: PixelRect) {}
    /// Progress text/percentage changed.
    fn progress(&self, _text: &str, _percent: Option<u8>) {}
    /// The renderer asks the host to redraw now.
    fn updated(&self) {}
}

/// Last reported progress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Status text.
    pub text: String,
    /// Completion percentage, if one was ever reported.
    pub percent: Option<u8>,
}

/// Storage cell of one channel. While a [`ChannelGuard`] is alive the channel is checked out
/// and the cell is empty.
#[derive(Debug)]
struct ChannelSlot {
    channel: Mutex<Option<Channel>>,
    returned: Condvar,
}

impl ChannelSlot {
    fn new(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel: Mutex::new(Some(channel)),
            returned: Condvar::new(),
        })
    }

    /// Wait until the channel is checked back in.
    fn checked_in(&self) -> MutexGuard<'_, Option<Channel>> {
        let mut g = self.channel.lock();
        while g.is_none() {
            self.returned.wait(&mut g);
        }
        g
    }

    fn check_in(&self, channel: Channel) {
        *self.channel.lock() = Some(channel);
        self.returned.notify_all();
    }
}

/// Owner of a fixed-size collection of channels for one in-flight rendering.
///
/// The base [`ChannelId::Rgba`] channel always exists. Other channels are added explicitly and
/// allocated lazily on first open, or eagerly through [`FrameBuffer::pre_allocate_channel`].
pub struct FrameBuffer {
    size: RwLock<PixelSize>,
    channels: RwLock<BTreeMap<ChannelId, Arc<ChannelSlot>>>,
    post_processed: RwLock<HashMap<ChannelId, Arc<Channel>>>,
    showing: Mutex<ChannelId>,
    dirty: Mutex<Option<PixelRect>>,
    progress: Mutex<Progress>,
    dib: Mutex<Option<image::RgbaImage>>,
    listener: RwLock<Option<Arc<dyn FrameBufferListener>>>,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("size", &*self.size.read())
            .field("channels", &self.channel_ids())
            .field("showing", &*self.showing.lock())
            .finish_non_exhaustive()
    }
}

impl FrameBuffer {
    /// Create a frame buffer holding only the allocated base colour channel.
    pub fn new(size: PixelSize) -> PostResult<Self> {
        let rgba = Channel::new(ChannelId::Rgba, size)?;
        let mut channels = BTreeMap::new();
        channels.insert(ChannelId::Rgba, ChannelSlot::new(rgba));
        Ok(Self {
            size: RwLock::new(size),
            channels: RwLock::new(channels),
            post_processed: RwLock::new(HashMap::new()),
            showing: Mutex::new(ChannelId::Rgba),
            dirty: Mutex::new(None),
            progress: Mutex::new(Progress::default()),
            dib: Mutex::new(None),
            listener: RwLock::new(None),
        })
    }

    /// Current dimensions.
    pub fn size(&self) -> PixelSize {
        *self.size.read()
    }

    /// Install or remove the host notification sink.
    pub fn set_listener(&self, listener: Option<Arc<dyn FrameBufferListener>>) {
        *self.listener.write() = listener;
    }

    fn with_listener(&self, f: impl FnOnce(&dyn FrameBufferListener)) {
        if let Some(l) = self.listener.read().as_ref() {
            f(l.as_ref());
        }
    }

    /// Resize, reallocating every channel and discarding all contents.
    ///
    /// Blocks until channels currently open elsewhere are closed. Nothing changes when any
    /// channel cannot be reallocated at the new size.
    pub fn set_size(&self, size: PixelSize) -> PostResult<()> {
        let channels = self.channels.write();
        let mut held: Vec<_> = channels.values().map(|slot| slot.checked_in()).collect();
        let mut resized = Vec::with_capacity(held.len());
        for guard in &held {
            if let Some(ch) = guard.as_ref() {
                resized.push(ch.resized(size)?);
            }
        }
        for (guard, ch) in held.iter_mut().zip(resized) {
            **guard = Some(ch);
        }
        *self.size.write() = size;
        self.post_processed.write().clear();
        *self.dirty.lock() = None;
        *self.dib.lock() = None;
        tracing::debug!(width = size.width, height = size.height, "frame buffer resized");
        Ok(())
    }

    /// Register a new channel. Storage is allocated on first open.
    pub fn add_channel(&self, id: ChannelId, components: usize) -> PostResult<()> {
        if id.component_of_rgba().is_some() {
            return Err(PostError::channel(format!(
                "{id:?} is a component view of the base colour channel"
            )));
        }
        let mut channels = self.channels.write();
        if channels.contains_key(&id) {
            return Err(PostError::channel(format!("channel {id:?} already present")));
        }
        let ch = Channel::unallocated(id, self.size(), components)?;
        channels.insert(id, ChannelSlot::new(ch));
        Ok(())
    }

    /// Remove an optional channel. The base colour channel cannot be removed.
    pub fn remove_channel(&self, id: ChannelId) -> PostResult<()> {
        if id == ChannelId::Rgba {
            return Err(PostError::channel("the base colour channel cannot be removed"));
        }
        self.channels
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PostError::channel(format!("channel {id:?} not present")))
    }

    /// `true` when the channel exists. Colour component views count as present.
    pub fn has_channel(&self, id: ChannelId) -> bool {
        let id = if id.component_of_rgba().is_some() {
            ChannelId::Rgba
        } else {
            id
        };
        self.channels.read().contains_key(&id)
    }

    /// Ids of all stored channels, sorted.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.read().keys().copied().collect()
    }

    /// Component count of a stored channel, waiting for a concurrent writer to close it.
    pub fn channel_components(&self, id: ChannelId) -> Option<usize> {
        if id.component_of_rgba().is_some() {
            return self.has_channel(id).then_some(1);
        }
        let slot = self.slot(id)?;
        let g = slot.checked_in();
        g.as_ref().map(Channel::components)
    }

    fn slot(&self, id: ChannelId) -> Option<Arc<ChannelSlot>> {
        self.channels.read().get(&id).cloned()
    }

    /// Open a channel for exclusive access.
    ///
    /// Never blocks: returns `None` when the channel does not exist, is already open elsewhere,
    /// or its storage could not be allocated. Dropping (or [`ChannelGuard::close`]-ing) the
    /// handle releases it.
    pub fn open_channel(&self, id: ChannelId) -> Option<ChannelGuard> {
        let slot = self.slot(id)?;
        let mut channel = slot.channel.lock().take()?;
        if let Err(e) = channel.allocate() {
            tracing::warn!(?id, error = %e, "channel allocation failed on open");
            slot.check_in(channel);
            return None;
        }
        Some(ChannelGuard { slot, channel })
    }

    /// Allocate a channel's storage now.
    ///
    /// Call this from the orchestrating thread before workers start opening the channel
    /// concurrently, so that allocation never happens under contention.
    pub fn pre_allocate_channel(&self, id: ChannelId) -> PostResult<()> {
        let slot = self
            .slot(id)
            .ok_or_else(|| PostError::channel(format!("channel {id:?} not present")))?;
        let mut g = slot.checked_in();
        match g.as_mut() {
            Some(ch) => ch.allocate(),
            None => Err(PostError::busy(format!("channel {id:?}"))),
        }
    }

    /// Copy of a channel's current contents, waiting for a concurrent writer to close it.
    ///
    /// Colour component ids are extracted from the base colour channel.
    pub fn snapshot_channel(&self, id: ChannelId) -> Option<Channel> {
        if let Some(index) = id.component_of_rgba() {
            let rgba = self.snapshot_channel(ChannelId::Rgba)?;
            return rgba.extract_component(index, id).ok();
        }
        let slot = self.slot(id)?;
        let mut g = slot.checked_in();
        let ch = g.as_mut()?;
        if let Err(e) = ch.allocate() {
            tracing::warn!(?id, error = %e, "channel allocation failed on snapshot");
            return None;
        }
        Some(ch.clone())
    }

    /// Channel currently displayed by the host.
    pub fn showing_channel(&self) -> ChannelId {
        *self.showing.lock()
    }

    /// Select the displayed channel.
    pub fn set_showing_channel(&self, id: ChannelId) -> PostResult<()> {
        if !self.has_channel(id) {
            return Err(PostError::channel(format!("channel {id:?} not present")));
        }
        *self.showing.lock() = id;
        self.invalidate();
        Ok(())
    }

    /// Mark a region dirty and notify the host. Never redraws synchronously.
    pub fn invalidate_area(&self, rect: PixelRect) {
        let Some(rect) = rect.intersect(PixelRect::full(self.size())) else {
            return;
        };
        {
            let mut dirty = self.dirty.lock();
            *dirty = Some(dirty.map_or(rect, |d| d.union(rect)));
        }
        self.with_listener(|l| l.invalidated(rect));
    }

    /// Mark the whole frame dirty.
    pub fn invalidate(&self) {
        self.invalidate_area(PixelRect::full(self.size()));
    }

    /// Take and reset the accumulated dirty region.
    pub fn take_dirty(&self) -> Option<PixelRect> {
        self.dirty.lock().take()
    }

    /// Report progress. `percent == -1` updates the text only.
    pub fn set_progress(&self, text: &str, percent: i32) {
        let snapshot = {
            let mut p = self.progress.lock();
            p.text = text.to_string();
            if percent != -1 {
                p.percent = Some(percent.clamp(0, 100) as u8);
            }
            p.clone()
        };
        self.with_listener(|l| l.progress(&snapshot.text, snapshot.percent));
    }

    /// Last reported progress.
    pub fn progress(&self) -> Progress {
        self.progress.lock().clone()
    }

    /// Ask the host to repaint now.
    pub fn signal_update(&self) {
        self.with_listener(|l| l.updated());
    }

    /// Replace the post-processed overlay produced by a pipeline run.
    pub fn set_post_processed(&self, channels: HashMap<ChannelId, Arc<Channel>>) {
        *self.post_processed.write() = channels;
        self.invalidate();
    }

    /// Publish `rect` of each channel into the post-processed overlay.
    ///
    /// Pixels outside `rect` keep what earlier runs published. A channel with no matching
    /// overlay entry starts from the raw frame-buffer contents.
    pub fn merge_post_processed(
        &self,
        channels: HashMap<ChannelId, Arc<Channel>>,
        rect: PixelRect,
    ) {
        let mut merged = Vec::with_capacity(channels.len());
        for (id, ch) in channels {
            let same_layout = |other: &Channel| {
                other.size() == ch.size() && other.components() == ch.components()
            };
            let base = self
                .post_processed(id)
                .filter(|prev| same_layout(&**prev))
                .or_else(|| {
                    self.snapshot_channel(id)
                        .filter(|raw| same_layout(raw))
                        .map(Arc::new)
                });
            let Some(mut base) = base.filter(|_| rect.fits_in(ch.size())) else {
                merged.push((id, ch));
                continue;
            };
            let c = ch.components();
            let (x0, x1) = (rect.x as usize * c, (rect.x + rect.width) as usize * c);
            let out = Arc::make_mut(&mut base);
            for y in rect.rows() {
                out.row_mut(y)[x0..x1].copy_from_slice(&ch.row(y)[x0..x1]);
            }
            merged.push((id, base));
        }
        self.post_processed.write().extend(merged);
        self.invalidate_area(rect);
    }

    /// Post-processed version of a channel, if a pipeline run published one.
    pub fn post_processed(&self, id: ChannelId) -> Option<Arc<Channel>> {
        self.post_processed.read().get(&id).cloned()
    }

    /// Drop every optional channel, zero the base colour channel and forget the overlay.
    pub fn clear(&self) -> PostResult<()> {
        let mut channels = self.channels.write();
        channels.retain(|id, _| *id == ChannelId::Rgba);
        if let Some(slot) = channels.get(&ChannelId::Rgba)
            && let Some(rgba) = slot.checked_in().as_mut()
        {
            rgba.allocate()?;
            rgba.data_mut().fill(0.0);
        }
        drop(channels);
        self.post_processed.write().clear();
        *self.showing.lock() = ChannelId::Rgba;
        *self.dib.lock() = None;
        self.invalidate();
        Ok(())
    }

    /// Independent copy of all channels and the overlay. Listener and dirty state are not copied.
    pub fn deep_clone(&self) -> PostResult<Self> {
        let out = Self::new(self.size())?;
        {
            let src = self.channels.read();
            let mut dst = out.channels.write();
            for (id, slot) in src.iter() {
                if let Some(ch) = slot.checked_in().as_ref() {
                    dst.insert(*id, ChannelSlot::new(ch.clone()));
                }
            }
        }
        *out.post_processed.write() = self
            .post_processed
            .read()
            .iter()
            .map(|(id, ch)| (*id, Arc::new(Channel::clone(ch))))
            .collect();
        *out.showing.lock() = self.showing_channel();
        *out.progress.lock() = self.progress();
        Ok(out)
    }

    /// Flatten the displayable colour (post-processed if available, raw otherwise) to RGBA8.
    pub fn to_rgba8_image(&self) -> PostResult<image::RgbaImage> {
        let size = self.size();
        let rgba = match self.post_processed(ChannelId::Rgba) {
            Some(ch) => Channel::clone(&ch),
            None => self
                .snapshot_channel(ChannelId::Rgba)
                .ok_or_else(|| PostError::channel("base colour channel missing"))?,
        };
        let bytes = rgba.data().iter().map(|v| unit_to_u8(*v)).collect::<Vec<_>>();
        image::RgbaImage::from_raw(size.width, size.height, bytes)
            .ok_or_else(|| PostError::channel("colour channel does not match frame size"))
    }

    /// Scoped exclusive access to the flattened 8-bit image.
    ///
    /// The guard is always released on drop, even when it holds no image.
    pub fn lock_dib(&self) -> DibGuard<'_> {
        DibGuard::new(self.dib.lock())
    }

    /// Rebuild the flattened 8-bit image from the displayable colour.
    pub fn refresh_dib(&self) -> PostResult<()> {
        let img = if self.size().is_empty() {
            None
        } else {
            Some(self.to_rgba8_image()?)
        };
        *self.dib.lock() = img;
        Ok(())
    }
}

/// Exclusive handle to an open channel.
///
/// The channel is checked out of the frame buffer while the handle lives. Dropping it (or calling
/// [`ChannelGuard::close`]) checks the contents back in, which is the point where writes become
/// visible to other readers.
#[derive(Debug)]
pub struct ChannelGuard {
    slot: Arc<ChannelSlot>,
    channel: Channel,
}

impl ChannelGuard {
    /// Release the channel.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        let hollow = self.channel.hollow();
        self.slot
            .check_in(std::mem::replace(&mut self.channel, hollow));
    }
}

impl std::ops::Deref for ChannelGuard {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        &self.channel
    }
}

impl std::ops::DerefMut for ChannelGuard {
    fn deref_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frame_buffer/frame_buffer.rs"]
mod tests;
