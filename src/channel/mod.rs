//! Typed per-pixel data planes.
//!
//! A [`Channel`] is a row-major buffer of `f32` components. Pixel `(x, y)` starts at
//! `(y * width + x) * components`. Point accessors are unchecked (out-of-range coordinates panic
//! on slice indexing); rectangular transfers validate the rectangle first.

mod id;

pub use id::ChannelId;

use crate::foundation::core::{ComponentOrder, PixelRect, PixelSize};
use crate::foundation::error::{PostError, PostResult};
use crate::foundation::math::luminance;

/// One named 2D buffer of per-pixel data.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    id: ChannelId,
    size: PixelSize,
    components: usize,
    order: ComponentOrder,
    data: Vec<f32>,
}

impl Channel {
    /// Create an allocated, zero-filled channel using the id's default component count.
    pub fn new(id: ChannelId, size: PixelSize) -> PostResult<Self> {
        Self::with_components(id, size, id.default_components())
    }

    /// Create an allocated, zero-filled channel with an explicit component count.
    pub fn with_components(id: ChannelId, size: PixelSize, components: usize) -> PostResult<Self> {
        let mut ch = Self::unallocated(id, size, components)?;
        ch.allocate()?;
        Ok(ch)
    }

    pub(crate) fn unallocated(id: ChannelId, size: PixelSize, components: usize) -> PostResult<Self> {
        if components == 0 || components > 4 {
            return Err(PostError::channel(format!(
                "channel {id:?}: component count must be 1..=4, got {components}"
            )));
        }
        let order = if components == id.default_components() {
            id.native_order()
        } else {
            ComponentOrder::Irrelevant
        };
        Ok(Self {
            id,
            size,
            components,
            order,
            data: Vec::new(),
        })
    }

    fn value_len(&self) -> PostResult<usize> {
        self.size
            .pixel_count()?
            .checked_mul(self.components)
            .ok_or_else(|| PostError::validation("channel byte size overflows usize"))
    }

    /// `true` once backing storage exists.
    pub fn is_allocated(&self) -> bool {
        self.value_len().is_ok_and(|len| self.data.len() == len)
    }

    /// Allocate zero-filled storage if it does not exist yet.
    pub(crate) fn allocate(&mut self) -> PostResult<()> {
        let len = self.value_len()?;
        if self.data.len() == len {
            return Ok(());
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            PostError::channel(format!("channel {:?}: allocation failed: {e}", self.id))
        })?;
        data.resize(len, 0.0);
        self.data = data;
        Ok(())
    }

    /// Zero-filled channel with the same id and layout at `size`, allocated when `self` is.
    pub(crate) fn resized(&self, size: PixelSize) -> PostResult<Self> {
        let mut out = Self {
            id: self.id,
            size,
            components: self.components,
            order: self.order,
            data: Vec::new(),
        };
        if !self.data.is_empty() {
            out.allocate()?;
        }
        Ok(out)
    }

    /// Channel identifier.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Dimensions, always equal to the owning frame buffer's size.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Number of `f32` components per pixel.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Size of one pixel in bytes.
    pub fn pixel_size(&self) -> usize {
        self.components * std::mem::size_of::<f32>()
    }

    /// Native component order.
    pub fn order(&self) -> ComponentOrder {
        self.order
    }

    /// Raw values, row-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw values, row-major.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.size.width as usize) + (x as usize)) * self.components
    }

    /// Components of pixel `(x, y)`. Unchecked: panics when out of range.
    pub fn get_value(&self, x: u32, y: u32) -> &[f32] {
        let i = self.offset(x, y);
        &self.data[i..i + self.components]
    }

    /// Mutable components of pixel `(x, y)`. Unchecked: panics when out of range.
    pub fn get_value_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let i = self.offset(x, y);
        let c = self.components;
        &mut self.data[i..i + c]
    }

    /// Write pixel `(x, y)` from `value` laid out in `order`. Unchecked: panics when out of range.
    pub fn set_value(&mut self, x: u32, y: u32, order: ComponentOrder, value: &[f32]) {
        let native = self.order;
        native.reorder_from(value, order, self.get_value_mut(x, y));
    }

    /// One row of raw values.
    pub fn row(&self, y: u32) -> &[f32] {
        let start = self.offset(0, y);
        &self.data[start..start + self.size.width as usize * self.components]
    }

    /// One mutable row of raw values.
    pub fn row_mut(&mut self, y: u32) -> &mut [f32] {
        let start = self.offset(0, y);
        let len = self.size.width as usize * self.components;
        &mut self.data[start..start + len]
    }

    /// Set every pixel to `value` (given in native order).
    pub fn fill(&mut self, value: &[f32]) {
        if value.len() != self.components {
            return;
        }
        for px in self.data.chunks_exact_mut(self.components) {
            px.copy_from_slice(value);
        }
    }

    fn check_rect(
        &self,
        rect: PixelRect,
        stride: usize,
        order: ComponentOrder,
        data_len: usize,
        use_offset: bool,
    ) -> PostResult<usize> {
        if !rect.fits_in(self.size) {
            return Err(PostError::validation(format!(
                "rect {rect:?} is not inside channel {:?} of size {:?}",
                self.id, self.size
            )));
        }
        if !self.is_allocated() {
            return Err(PostError::channel(format!(
                "channel {:?} has no storage",
                self.id
            )));
        }
        let src_components = order.component_count().unwrap_or(self.components);
        let min_stride = if use_offset {
            rect.right().unwrap_or(u32::MAX) as usize
        } else {
            rect.width as usize
        };
        if stride < min_stride {
            return Err(PostError::validation(format!(
                "stride {stride} is smaller than the rect span {min_stride}"
            )));
        }
        if rect.is_empty() {
            return Ok(src_components);
        }
        let rows = if use_offset {
            rect.bottom().unwrap_or(u32::MAX) as usize
        } else {
            rect.height as usize
        };
        let needed = (rows - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_mul(src_components))
            .and_then(|n| n.checked_add(min_stride.checked_mul(src_components)?))
            .ok_or_else(|| {
                PostError::validation(format!("stride {stride} over {rows} rows overflows usize"))
            })?;
        if data_len < needed {
            return Err(PostError::validation(format!(
                "buffer holds {data_len} values, rect needs {needed}"
            )));
        }
        Ok(src_components)
    }

    fn external_index(rect: PixelRect, x: u32, y: u32, stride: usize, use_offset: bool) -> usize {
        if use_offset {
            (y as usize) * stride + x as usize
        } else {
            ((y - rect.y) as usize) * stride + (x - rect.x) as usize
        }
    }

    /// Copy a rectangle of pixels from `data` into the channel.
    ///
    /// `stride` is measured in pixels. With `use_offset`, `data` is addressed with the absolute
    /// frame coordinates of each pixel; otherwise its origin is the rectangle's top-left corner.
    /// Fails without modifying the channel when the rectangle is not fully inside the channel.
    pub fn set_value_rect(
        &mut self,
        rect: PixelRect,
        stride: usize,
        order: ComponentOrder,
        data: &[f32],
        use_offset: bool,
    ) -> PostResult<()> {
        let sc = self.check_rect(rect, stride, order, data.len(), use_offset)?;
        let native = self.order;
        for y in rect.rows() {
            for x in rect.x..rect.x + rect.width {
                let s = Self::external_index(rect, x, y, stride, use_offset) * sc;
                native.reorder_from(&data[s..s + sc], order, self.get_value_mut(x, y));
            }
        }
        Ok(())
    }

    /// Copy a rectangle of pixels from the channel into `out`. Same addressing as
    /// [`Channel::set_value_rect`].
    pub fn get_value_rect(
        &self,
        rect: PixelRect,
        stride: usize,
        order: ComponentOrder,
        out: &mut [f32],
        use_offset: bool,
    ) -> PostResult<()> {
        let dc = self.check_rect(rect, stride, order, out.len(), use_offset)?;
        for y in rect.rows() {
            for x in rect.x..rect.x + rect.width {
                let d = Self::external_index(rect, x, y, stride, use_offset) * dc;
                order.reorder_from(self.get_value(x, y), self.order, &mut out[d..d + dc]);
            }
        }
        Ok(())
    }

    /// Scalar extrema over the channel: luminance for colour channels, first component otherwise.
    ///
    /// Returns `None` for empty or unallocated channels.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        let colour = self.id.is_color() && self.components >= 3;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for px in self.data.chunks_exact(self.components) {
            let v = if colour {
                luminance(px[0], px[1], px[2])
            } else {
                px[0]
            };
            lo = lo.min(v);
            hi = hi.max(v);
        }
        Some((lo, hi))
    }

    /// Copy one component into a new single-component channel with id `id`.
    pub fn extract_component(&self, index: usize, id: ChannelId) -> PostResult<Self> {
        if index >= self.components {
            return Err(PostError::channel(format!(
                "channel {:?} has no component {index}",
                self.id
            )));
        }
        let mut out = Self::with_components(id, self.size, 1)?;
        for (dst, px) in out
            .data
            .iter_mut()
            .zip(self.data.chunks_exact(self.components))
        {
            *dst = px[index];
        }
        Ok(out)
    }

    /// Same metadata without storage; used as a placeholder while contents move elsewhere.
    pub(crate) fn hollow(&self) -> Self {
        Self {
            id: self.id,
            size: self.size,
            components: self.components,
            order: self.order,
            data: Vec::new(),
        }
    }

    /// Same dimensions and layout, fresh zero-filled contents.
    pub fn empty_like(&self) -> PostResult<Self> {
        let mut out = Self::unallocated(self.id, self.size, self.components)?;
        out.order = self.order;
        out.allocate()?;
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/channel/channel.rs"]
mod tests;
