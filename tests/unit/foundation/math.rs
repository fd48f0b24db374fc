use super::*;

#[test]
fn luminance_of_white_is_one() {
    assert!((luminance(1.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
}

#[test]
fn clamp01_handles_nan_and_hdr() {
    assert_eq!(clamp01(5.0), 1.0);
    assert_eq!(clamp01(-0.5), 0.0);
    assert_eq!(clamp01(f32::NAN), 0.0);
}

#[test]
fn unit_to_u8_endpoints() {
    assert_eq!(unit_to_u8(0.0), 0);
    assert_eq!(unit_to_u8(1.0), 255);
    assert_eq!(unit_to_u8(0.5), 128);
}
