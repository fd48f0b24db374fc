use super::*;
use crate::foundation::core::PixelSize;

fn rgba(w: u32, h: u32, px: [f32; 4]) -> JobChannels {
    let mut ch = Channel::new(ChannelId::Rgba, PixelSize::new(w, h)).unwrap();
    ch.fill(&px);
    let mut out = JobChannels::default();
    out.insert(ch);
    out
}

#[test]
fn kernel_is_normalized_and_symmetric() {
    let k = gaussian_kernel(3, 1.5).unwrap();
    assert_eq!(k.len(), 7);
    assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert_eq!(k[0], k[6]);
    assert!(gaussian_kernel(2, 0.0).is_err());
    assert_eq!(gaussian_kernel(0, 1.0).unwrap(), vec![1.0]);
}

#[test]
fn constant_image_is_unchanged() {
    let mut channels = rgba(5, 4, [0.25, 0.5, 0.75, 1.0]);
    let mut job = BlurJob::new(2).unwrap();
    job.execute(PixelRect::new(0, 0, 5, 4), &mut channels, &CancelToken::new())
        .unwrap();
    let ch = channels.get(ChannelId::Rgba).unwrap();
    for px in ch.data().chunks_exact(4) {
        for (v, e) in px.iter().zip([0.25, 0.5, 0.75, 1.0]) {
            assert!((v - e).abs() < 1e-5);
        }
    }
}

#[test]
fn energy_spreads_from_single_pixel_inside_rect_only() {
    let mut channels = rgba(5, 5, [0.0; 4]);
    channels
        .get_mut(ChannelId::Rgba)
        .unwrap()
        .get_value_mut(2, 2)
        .copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
    let mut job = BlurJob::new(1).unwrap();
    job.execute(PixelRect::new(1, 1, 3, 3), &mut channels, &CancelToken::new())
        .unwrap();
    let ch = channels.get(ChannelId::Rgba).unwrap();
    assert!(ch.get_value(2, 2)[0] < 1.0);
    assert!(ch.get_value(1, 2)[0] > 0.0);
    assert_eq!(ch.get_value(0, 2)[0], 0.0);
}

#[test]
fn canceled_job_stops() {
    let mut channels = rgba(4, 4, [1.0; 4]);
    let token = CancelToken::new();
    token.cancel();
    let mut job = BlurJob::new(1).unwrap();
    let err = job
        .execute(PixelRect::new(0, 0, 4, 4), &mut channels, &token)
        .unwrap_err();
    assert!(err.is_canceled());
}

#[test]
fn radius_is_capped_and_change_tracked() {
    let mut blur = GaussianBlur::new();
    blur.set_radius(10_000);
    assert_eq!(blur.radius(), MAX_RADIUS);
    assert_eq!(blur.common().crc(), 1);
    blur.set_radius(MAX_RADIUS);
    assert_eq!(blur.common().crc(), 1);
}
