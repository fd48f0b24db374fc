/// Rec. 709 relative luminance of a linear RGB triple.
pub(crate) fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

pub(crate) fn clamp01(v: f32) -> f32 {
    // NaN clamps to 0 so a broken tone mapper can't leak non-finite values into LDR.
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Map a linear `[0,1]` value to an 8-bit channel value.
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (clamp01(v) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
