//! Stock post-effects.

mod blur;
mod fog;
mod gamma;
mod tone_mapping;

pub use blur::GaussianBlur;
pub use fog::DepthFog;
pub use gamma::Gamma;
pub use tone_mapping::{ClampToneMapper, ExposureToneMapper, ReinhardToneMapper};

use rayon::prelude::*;

use crate::channel::{Channel, ChannelId};
use crate::foundation::core::PixelRect;
use crate::foundation::error::{PostError, PostResult};
use crate::pipeline::PipelineView;
use crate::settings::ParamStore;

/// Rows processed between two progress reports.
const BAND_ROWS: u32 = 32;

fn read_colour(view: &mut PipelineView<'_>) -> PostResult<std::sync::Arc<Channel>> {
    view.channel_for_read(ChannelId::Rgba)
        .ok_or_else(|| PostError::channel("colour channel missing"))
}

/// Apply `f` to every colour pixel inside `rect` and commit the result.
///
/// Rows run on the pipeline's rayon pool in bands; progress is reported after each band and a
/// cancellation aborts with [`PostError::Canceled`] before anything is committed.
fn map_colour<F>(view: &mut PipelineView<'_>, rect: PixelRect, f: F) -> PostResult<()>
where
    F: Fn(&mut [f32], u32, u32) + Sync,
{
    if rect.is_empty() {
        return Ok(());
    }
    let src = read_colour(view)?;
    let mut out = view.channel_for_write(ChannelId::Rgba)?;
    out.copy_from(&src)?;
    drop(src);

    let c = out.components();
    let stride = out.width() as usize * c;
    let mut done = 0;
    for band in rect.rows().step_by(BAND_ROWS as usize) {
        let rows = BAND_ROWS.min(rect.y + rect.height - band);
        let data = out.data_mut();
        view.install(|| {
            data.par_chunks_mut(stride)
                .enumerate()
                .skip(band as usize)
                .take(rows as usize)
                .for_each(|(y, row)| {
                    for x in rect.x..rect.x + rect.width {
                        let i = x as usize * c;
                        f(&mut row[i..i + c], x, y as u32);
                    }
                });
        });
        done += rows;
        if !view.report_progress(done) {
            return Err(PostError::Canceled);
        }
    }
    out.commit();
    Ok(())
}

fn read_f32(store: &dyn ParamStore, name: &str) -> Option<f32> {
    store
        .get_parameter(name)
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
}
