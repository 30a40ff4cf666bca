//! Station-pair processing: whiten, correlate, stack, measure.
//!
//! Each pair is independent. [`process_pairs`] fans pairs out over the
//! rayon pool and returns one result per pair in input order, so a pair
//! that fails validation never affects the others.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

use crate::analysis::{
    coda_window, correlate_batch, denoise_image, dtw, stack, stretch, stretch_in_window,
    whiten_batch, AnalysisError, AnalysisResult, CodaWindow, DvvMeasurement, WarpPath,
};
use crate::config::Settings;

/// Windowed records of one station pair.
#[derive(Debug, Clone)]
pub struct PairInput {
    /// Source station, one time window per row.
    pub source: Array2<f64>,
    /// Receiver station, aligned with `source`.
    pub receiver: Array2<f64>,
    /// Sampling interval (s).
    pub dt: f64,
    /// Inter-station distance (km).
    pub distance: f64,
}

/// Everything computed for one pair.
#[derive(Debug, Clone)]
pub struct PairOutput {
    /// Lag axis shared by `windows` and `stack` (s).
    pub lags: Array1<f64>,
    /// One correlation function per window (denoised when enabled).
    pub windows: Array2<f64>,
    /// Stack of `windows`.
    pub stack: Array1<f64>,
    /// Coda window used for stretching, when configured.
    pub coda: Option<CodaWindow>,
    /// Stretching result per window, when a reference was supplied.
    pub dvv: Option<Vec<DvvMeasurement>>,
    /// Warp of the stack onto the reference, when a reference was supplied.
    pub warp: Option<WarpPath>,
}

/// Run the full chain for one pair.
///
/// `reference` must share the correlation lag axis; it enables the dv/v
/// measurements.
pub fn process_pair(
    input: &PairInput,
    settings: &Settings,
    reference: Option<ArrayView1<f64>>,
) -> AnalysisResult<PairOutput> {
    if input.source.dim() != input.receiver.dim() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Source windows {:?} differ from receiver windows {:?}",
            input.source.dim(),
            input.receiver.dim()
        )));
    }

    let samples = input.source.ncols();
    let nfft = settings.whitening.nfft_for(samples);
    let band = settings.whitening.band();
    tracing::debug!(
        windows = input.source.nrows(),
        samples,
        nfft,
        distance = input.distance,
        "processing pair"
    );

    let spec1 = whiten_batch(input.source.view(), input.dt, &band, Some(nfft))?;
    let spec2 = whiten_batch(input.receiver.view(), input.dt, &band, Some(nfft))?;

    let params = settings.correlation.params(input.dt, nfft);
    let ccfs = correlate_batch(spec1.view(), spec2.view(), &params)?;

    let windows = if settings.denoise.enabled {
        denoise_image(ccfs.values.view(), &settings.denoise.params())?
    } else {
        ccfs.values
    };

    let stacked = stack(
        windows.view(),
        settings.stacking.method,
        &settings.stacking.pws_params(input.dt),
    )?;

    let mut output = PairOutput {
        lags: ccfs.lags,
        windows,
        stack: stacked,
        coda: None,
        dvv: None,
        warp: None,
    };

    if let Some(reference) = reference {
        measure_against(&mut output, reference, input, settings)?;
    }
    Ok(output)
}

fn measure_against(
    output: &mut PairOutput,
    reference: ArrayView1<f64>,
    input: &PairInput,
    settings: &Settings,
) -> AnalysisResult<()> {
    if reference.len() != output.lags.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Reference has {} lags, correlations have {}",
            reference.len(),
            output.lags.len()
        )));
    }
    let grid = &settings.stretching;

    let dvv = match grid.coda_vmin {
        Some(vmin) => {
            let half = (output.lags.len() - 1) / 2;
            let window = coda_window(
                input.distance,
                vmin,
                half as f64 * input.dt,
                input.dt,
                grid.coda_width,
            )?;
            output.coda = Some(window);
            stretch_in_window(output.windows.view(), reference, grid.range, grid.steps, &window)?
        }
        None => stretch(output.windows.view(), reference, grid.range, grid.steps)?,
    };
    output.dvv = Some(dvv);
    output.warp = Some(dtw(reference, output.stack.view(), settings.dtw.step_penalty)?);
    Ok(())
}

/// Process many pairs in parallel. Results keep the input order.
pub fn process_pairs(
    inputs: &[PairInput],
    settings: &Settings,
    reference: Option<ArrayView1<f64>>,
) -> Vec<AnalysisResult<PairOutput>> {
    tracing::info!(pairs = inputs.len(), "processing station pairs");
    inputs
        .par_iter()
        .enumerate()
        .map(|(index, input)| {
            let result = process_pair(input, settings, reference);
            if let Err(e) = &result {
                tracing::warn!(pair = index, error = %e, "pair failed");
            }
            result
        })
        .collect()
}
