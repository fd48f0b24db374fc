use parking_lot::MutexGuard;

/// Scoped exclusive access to the flattened 8-bit RGBA image of a frame buffer.
///
/// Obtained from [`crate::FrameBuffer::lock_dib`]. The image may be absent (nothing flattened
/// yet, or an empty frame); the lock is released when the guard drops either way.
pub struct DibGuard<'a> {
    image: MutexGuard<'a, Option<image::RgbaImage>>,
}

impl<'a> DibGuard<'a> {
    pub(super) fn new(image: MutexGuard<'a, Option<image::RgbaImage>>) -> Self {
        Self { image }
    }

    /// The flattened image, if one exists.
    pub fn image(&self) -> Option<&image::RgbaImage> {
        self.image.as_ref()
    }

    /// Mutable access to the flattened image, if one exists.
    pub fn image_mut(&mut self) -> Option<&mut image::RgbaImage> {
        self.image.as_mut()
    }
}

impl std::fmt::Debug for DibGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DibGuard")
            .field(
                "dimensions",
                &self.image.as_ref().map(image::RgbaImage::dimensions),
            )
            .finish()
    }
}
