use rayon::prelude::*;

use crate::channel::Channel;
use crate::foundation::core::PixelRect;
use crate::foundation::math::{clamp01, luminance};

/// Value distribution of one channel over a rectangle, for UI display.
///
/// Colour channels are binned by luminance, others by their first component. NaN samples are
/// ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    bins: Vec<u64>,
    min: f32,
    max: f32,
    samples: u64,
}

fn sample(px: &[f32], colour: bool) -> f32 {
    if colour {
        luminance(px[0], px[1], px[2])
    } else {
        px[0]
    }
}

impl Histogram {
    /// Bin `rect` of `channel` into `bins` buckets spanning the observed range.
    pub fn from_channel(channel: &Channel, rect: PixelRect, bins: usize) -> Self {
        let bins = bins.max(1);
        let Some(rect) = rect.intersect(PixelRect::full(channel.size())) else {
            return Self {
                bins: vec![0; bins],
                min: 0.0,
                max: 0.0,
                samples: 0,
            };
        };
        let c = channel.components();
        let colour = channel.id().is_color() && c >= 3;
        let x0 = rect.x as usize * c;
        let x1 = (rect.x + rect.width) as usize * c;
        let row_values = |y: u32| {
            channel.row(y)[x0..x1]
                .chunks_exact(c)
                .map(move |px| sample(px, colour))
                .filter(|v| !v.is_nan())
        };

        let (min, max) = rect
            .rows()
            .into_par_iter()
            .map(|y| {
                row_values(y).fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                })
            })
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        if min > max {
            return Self {
                bins: vec![0; bins],
                min: 0.0,
                max: 0.0,
                samples: 0,
            };
        }

        let span = max - min;
        let bucket = |v: f32| {
            if span <= 0.0 {
                0
            } else {
                (((v - min) / span * bins as f32) as usize).min(bins - 1)
            }
        };
        let counts = rect
            .rows()
            .into_par_iter()
            .fold(
                || vec![0u64; bins],
                |mut acc, y| {
                    for v in row_values(y) {
                        acc[bucket(v)] += 1;
                    }
                    acc
                },
            )
            .reduce(
                || vec![0u64; bins],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            );
        let samples = counts.iter().sum();
        Self {
            bins: counts,
            min,
            max,
            samples,
        }
    }

    /// Bucket counts, lowest values first.
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Smallest sample.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Largest sample.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Number of binned samples.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Clamp every component inside `rect` into `[0,1]`.
pub(crate) fn clamp_rect(channel: &mut Channel, rect: PixelRect) {
    let Some(rect) = rect.intersect(PixelRect::full(channel.size())) else {
        return;
    };
    let c = channel.components();
    let stride = channel.width() as usize * c;
    let x0 = rect.x as usize * c;
    let x1 = (rect.x + rect.width) as usize * c;
    channel
        .data_mut()
        .par_chunks_mut(stride)
        .skip(rect.y as usize)
        .take(rect.height as usize)
        .for_each(|row| {
            for v in &mut row[x0..x1] {
                *v = clamp01(*v);
            }
        });
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/histogram.rs"]
mod tests;
