use crate::foundation::core::ComponentOrder;

/// Identifier of the kind of data a [`crate::Channel`] holds.
///
/// The well-known ids are global constants shared by renderers and post-effects; `Custom` ids
/// are free for renderer- or effect-private data.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ChannelId {
    /// Red component view of [`ChannelId::Rgba`].
    Red,
    /// Green component view of [`ChannelId::Rgba`].
    Green,
    /// Blue component view of [`ChannelId::Rgba`].
    Blue,
    /// Alpha component view of [`ChannelId::Rgba`].
    Alpha,
    /// Three-float colour without alpha.
    Rgb,
    /// Composite base colour channel, four floats in RGBA order.
    Rgba,
    /// Distance from the camera (Z).
    DistanceFromCamera,
    /// World-space normal, X component.
    NormalX,
    /// World-space normal, Y component.
    NormalY,
    /// World-space normal, Z component.
    NormalZ,
    /// Surface albedo, three floats.
    Albedo,
    /// Scalar luminance.
    Luminance,
    /// Material identifier stored as a float.
    MaterialId,
    /// Object identifier stored as a float.
    ObjectId,
    /// Wireframe line coverage.
    WireframeLines,
    /// Wireframe point coverage.
    WireframePoints,
    /// Renderer- or effect-private data.
    Custom(u32),
}

impl ChannelId {
    /// Number of `f32` components per pixel for this id.
    ///
    /// `Custom` ids default to one component; use
    /// [`crate::FrameBuffer::add_channel`] to pick another count.
    pub fn default_components(self) -> usize {
        match self {
            Self::Rgba => 4,
            Self::Rgb | Self::Albedo => 3,
            _ => 1,
        }
    }

    /// Native interleaving of a pixel of this channel.
    pub fn native_order(self) -> ComponentOrder {
        match self {
            Self::Rgba => ComponentOrder::Rgba,
            Self::Rgb | Self::Albedo => ComponentOrder::Rgb,
            _ => ComponentOrder::Irrelevant,
        }
    }

    /// Component index inside [`ChannelId::Rgba`] for the single-colour views.
    pub fn component_of_rgba(self) -> Option<usize> {
        match self {
            Self::Red => Some(0),
            Self::Green => Some(1),
            Self::Blue => Some(2),
            Self::Alpha => Some(3),
            _ => None,
        }
    }

    /// `true` for ids whose pixels are colours (luminance is meaningful).
    pub fn is_color(self) -> bool {
        matches!(self, Self::Rgba | Self::Rgb | Self::Albedo)
    }
}
