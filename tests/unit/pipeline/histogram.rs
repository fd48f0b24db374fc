use super::*;
use crate::channel::ChannelId;
use crate::foundation::core::PixelSize;

#[test]
fn bins_span_observed_range() {
    let mut depth = Channel::new(ChannelId::DistanceFromCamera, PixelSize::new(4, 1)).unwrap();
    depth.data_mut().copy_from_slice(&[0.0, 1.0, 2.0, 3.0]);
    let h = Histogram::from_channel(&depth, PixelRect::full(depth.size()), 4);
    assert_eq!(h.min(), 0.0);
    assert_eq!(h.max(), 3.0);
    assert_eq!(h.bins(), &[1, 1, 1, 1]);
    assert_eq!(h.samples(), 4);
}

#[test]
fn rect_limits_samples_and_nan_is_ignored() {
    let mut depth = Channel::new(ChannelId::DistanceFromCamera, PixelSize::new(3, 2)).unwrap();
    depth
        .data_mut()
        .copy_from_slice(&[5.0, f32::NAN, 9.0, 1.0, 1.0, 1.0]);
    let h = Histogram::from_channel(&depth, PixelRect::new(0, 0, 2, 1), 8);
    assert_eq!(h.samples(), 1);
    assert_eq!(h.min(), 5.0);
    assert_eq!(h.bins()[0], 1);
}

#[test]
fn empty_rect_gives_empty_histogram() {
    let ch = Channel::new(ChannelId::Rgba, PixelSize::new(2, 2)).unwrap();
    let h = Histogram::from_channel(&ch, PixelRect::new(5, 5, 1, 1), 16);
    assert_eq!(h.samples(), 0);
    assert_eq!(h.bins().len(), 16);
}

#[test]
fn clamp_touches_only_rect() {
    let mut ch = Channel::new(ChannelId::Rgba, PixelSize::new(2, 2)).unwrap();
    ch.fill(&[5.0, -1.0, 0.5, 2.0]);
    clamp_rect(&mut ch, PixelRect::new(1, 0, 1, 2));
    assert_eq!(ch.get_value(1, 0), &[1.0, 0.0, 0.5, 1.0]);
    assert_eq!(ch.get_value(1, 1), &[1.0, 0.0, 0.5, 1.0]);
    assert_eq!(ch.get_value(0, 0), &[5.0, -1.0, 0.5, 2.0]);
}
