//! Tensor ops the backbone needs that candle does not ship
//!
//! candle 0.8 only provides nearest-neighbour upsampling and fixed-kernel
//! pooling, so the two resampling ops used throughout the backbone are built
//! here from candle primitives:
//!
//! - [`bilinear_upsample`]: corner-unaligned (half-pixel-center) bilinear
//!   interpolation, expressed as two separable interpolation-matrix matmuls
//!   over the spatial dims.
//! - [`adaptive_avg_pool2d`]: average pooling to an arbitrary output grid,
//!   with the same bin boundaries PyTorch uses.

use candle_core::{Result, Tensor};

/// Build the `(out_len, in_len)` interpolation matrix for one spatial axis.
///
/// Rows hold the half-pixel-center weights: output index `i` samples the
/// source coordinate `(i + 0.5) * in/out - 0.5`, clamped into range, and
/// blends the two neighbouring source cells linearly.
fn interp_matrix(out_len: usize, in_len: usize, reference: &Tensor) -> Result<Tensor> {
    let scale = in_len as f64 / out_len as f64;
    let mut weights = vec![0f32; out_len * in_len];
    for i in 0..out_len {
        let src = ((i as f64 + 0.5) * scale - 0.5).max(0.0);
        let lo = (src.floor() as usize).min(in_len - 1);
        let hi = (lo + 1).min(in_len - 1);
        let frac = (src - lo as f64) as f32;
        weights[i * in_len + lo] += 1.0 - frac;
        weights[i * in_len + hi] += frac;
    }
    Tensor::from_vec(weights, (out_len, in_len), reference.device())?.to_dtype(reference.dtype())
}

/// Bilinearly upsample a `(batch, channels, h, w)` map by an integer factor.
pub fn bilinear_upsample(xs: &Tensor, scale: usize) -> Result<Tensor> {
    let (b, c, h, w) = xs.dims4()?;
    let (oh, ow) = (h * scale, w * scale);
    let rows = interp_matrix(oh, h, xs)?;
    let cols = interp_matrix(ow, w, xs)?;

    // (oh, h) x (b*c, h, w) x (w, ow), batched over b*c.
    let xs = xs.reshape((b * c, h, w))?;
    let xs = rows.unsqueeze(0)?.broadcast_matmul(&xs)?;
    let xs = xs.broadcast_matmul(&cols.transpose(0, 1)?.unsqueeze(0)?)?;
    xs.reshape((b, c, oh, ow))
}

/// Average-pool a `(batch, channels, h, w)` map to an `(out_h, out_w)` grid.
///
/// Bin `i` of an axis covers source cells `floor(i*n/out) .. ceil((i+1)*n/out)`,
/// so the op is exact average pooling when `out` divides `n` and degrades
/// gracefully (overlapping bins) when it does not.
pub fn adaptive_avg_pool2d(xs: &Tensor, out_h: usize, out_w: usize) -> Result<Tensor> {
    let (_b, _c, h, w) = xs.dims4()?;
    let mut rows = Vec::with_capacity(out_h);
    for i in 0..out_h {
        let h0 = i * h / out_h;
        let h1 = ((i + 1) * h).div_ceil(out_h);
        let slab = xs.narrow(2, h0, h1 - h0)?.mean_keepdim(2)?;
        let mut cells = Vec::with_capacity(out_w);
        for j in 0..out_w {
            let w0 = j * w / out_w;
            let w1 = ((j + 1) * w).div_ceil(out_w);
            cells.push(slab.narrow(3, w0, w1 - w0)?.mean_keepdim(3)?);
        }
        rows.push(Tensor::cat(&cells, 3)?);
    }
    Tensor::cat(&rows, 2)
}
