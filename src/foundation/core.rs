use crate::foundation::error::{PostError, PostResult};

/// Frame dimensions in pixels.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Create a size; zero dimensions are allowed and describe an empty frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels, or an error on `usize` overflow.
    pub fn pixel_count(self) -> PostResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| PostError::validation("frame pixel count overflows usize"))
    }

    /// `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Integer pixel rectangle, `x`/`y` is the top-left corner.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Create a rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole frame.
    pub fn full(size: PixelSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// One full-width row.
    pub fn row(size: PixelSize, y: u32) -> Self {
        Self::new(0, y, size.width, 1)
    }

    /// `true` when the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge, `None` on overflow.
    pub fn right(self) -> Option<u32> {
        self.x.checked_add(self.width)
    }

    /// Exclusive bottom edge, `None` on overflow.
    pub fn bottom(self) -> Option<u32> {
        self.y.checked_add(self.height)
    }

    /// `true` when the rectangle lies fully inside `[0,width) x [0,height)`.
    pub fn fits_in(self, size: PixelSize) -> bool {
        matches!(
            (self.right(), self.bottom()),
            (Some(r), Some(b)) if r <= size.width && b <= size.height
        )
    }

    /// Overlap of two rectangles, `None` when they do not intersect.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right()?.min(other.right()?);
        let y1 = self.bottom()?.min(other.bottom()?);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Smallest rectangle covering both. Empty rectangles are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self
            .x
            .saturating_add(self.width)
            .max(other.x.saturating_add(other.width));
        let y1 = self
            .y
            .saturating_add(self.height)
            .max(other.y.saturating_add(other.height));
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Row indices covered by the rectangle.
    pub fn rows(self) -> std::ops::Range<u32> {
        self.y..self.y.saturating_add(self.height)
    }
}

/// Interleaving of the components of a multi-component pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ComponentOrder {
    /// Red, green, blue, alpha.
    #[default]
    Rgba,
    /// Alpha, red, green, blue.
    Argb,
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red.
    Bgr,
    /// Alpha, blue, green, red.
    Abgr,
    /// Blue, green, red, alpha.
    Bgra,
    /// Single-value or opaque layout; components are copied as-is.
    Irrelevant,
}

const R: u8 = 0;
const G: u8 = 1;
const B: u8 = 2;
const A: u8 = 3;

impl ComponentOrder {
    fn slots(self) -> &'static [u8] {
        match self {
            Self::Rgba => &[R, G, B, A],
            Self::Argb => &[A, R, G, B],
            Self::Rgb => &[R, G, B],
            Self::Bgr => &[B, G, R],
            Self::Abgr => &[A, B, G, R],
            Self::Bgra => &[B, G, R, A],
            Self::Irrelevant => &[],
        }
    }

    /// Number of components for colour orders, `None` for [`ComponentOrder::Irrelevant`].
    pub fn component_count(self) -> Option<usize> {
        match self {
            Self::Irrelevant => None,
            other => Some(other.slots().len()),
        }
    }

    /// Convert one pixel from `src_order` into `dst` laid out as `self`.
    ///
    /// A missing alpha component reads as `1.0`, a missing colour component as `0.0`.
    pub fn reorder_from(self, src: &[f32], src_order: ComponentOrder, dst: &mut [f32]) {
        if self == src_order || self == Self::Irrelevant || src_order == Self::Irrelevant {
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            return;
        }

        let src_slots = src_order.slots();
        for (d, &sem) in dst.iter_mut().zip(self.slots()) {
            *d = match src_slots.iter().position(|&s| s == sem) {
                Some(i) if i < src.len() => src[i],
                _ if sem == A => 1.0,
                _ => 0.0,
            };
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
