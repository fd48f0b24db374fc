use crate::foundation::core::PixelSize;

/// Pixel generator driven by [`ScanlineRenderer`](crate::ScanlineRenderer).
pub trait PixelSource: Send + Sync + 'static {
    /// Linear RGBA of pixel `(x, y)`. Values above 1.0 are allowed.
    fn shade(&self, x: u32, y: u32, size: PixelSize) -> [f32; 4];

    /// Whether [`PixelSource::depth`] produces data.
    fn has_depth(&self) -> bool {
        false
    }

    /// Distance from the camera at `(x, y)`.
    fn depth(&self, _x: u32, _y: u32, _size: PixelSize) -> f32 {
        f32::INFINITY
    }
}

fn unit(v: u32, extent: u32) -> f32 {
    if extent <= 1 {
        0.0
    } else {
        v as f32 / (extent - 1) as f32
    }
}

/// Red along x, green along y, constant blue. Stays in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GradientSource;

impl PixelSource for GradientSource {
    fn shade(&self, x: u32, y: u32, size: PixelSize) -> [f32; 4] {
        [unit(x, size.width), unit(y, size.height), 0.25, 1.0]
    }
}

/// Sky over a ground plane with a bright sun disc.
///
/// The sun is well above 1.0 so tone mapping matters, and the ground recedes with a
/// distance channel for depth-based effects.
#[derive(Clone, Copy, Debug)]
pub struct HdrSunSource {
    /// Sun centre as a fraction of the frame.
    pub sun: [f32; 2],
    /// Sun radius as a fraction of the frame height.
    pub radius: f32,
    /// Radiance of the sun disc.
    pub intensity: f32,
    /// Horizon height as a fraction of the frame, from the top.
    pub horizon: f32,
}

impl Default for HdrSunSource {
    fn default() -> Self {
        Self {
            sun: [0.7, 0.25],
            radius: 0.08,
            intensity: 12.0,
            horizon: 0.6,
        }
    }
}

impl HdrSunSource {
    const SKY_DISTANCE: f32 = 1_000.0;

    fn is_sky(&self, v: f32) -> bool {
        v < self.horizon
    }
}

impl PixelSource for HdrSunSource {
    fn shade(&self, x: u32, y: u32, size: PixelSize) -> [f32; 4] {
        let u = unit(x, size.width);
        let v = unit(y, size.height);
        if !self.is_sky(v) {
            let t = (v - self.horizon) / (1.0 - self.horizon).max(f32::EPSILON);
            return [0.25 + 0.2 * t, 0.35 + 0.15 * t, 0.15, 1.0];
        }
        let aspect = size.width as f32 / size.height.max(1) as f32;
        let dx = (u - self.sun[0]) * aspect;
        let dy = v - self.sun[1];
        let d = (dx * dx + dy * dy).sqrt();
        let sky = [0.35 + 0.4 * v, 0.55 + 0.3 * v, 0.95, 1.0];
        if d <= self.radius {
            [self.intensity, self.intensity * 0.95, self.intensity * 0.8, 1.0]
        } else {
            let glow = self.intensity * 0.15 * (-(d - self.radius) * 12.0).exp();
            [sky[0] + glow, sky[1] + glow, sky[2] + glow * 0.8, 1.0]
        }
    }

    fn has_depth(&self) -> bool {
        true
    }

    fn depth(&self, _x: u32, y: u32, size: PixelSize) -> f32 {
        let v = unit(y, size.height);
        if self.is_sky(v) {
            return Self::SKY_DISTANCE;
        }
        // ground plane seen from eye height 1
        let below = (v - self.horizon).max(1e-3);
        (1.0 / below).min(Self::SKY_DISTANCE)
    }
}
