//! Escape-time fractal iteration
//!
//! The multi-core workload. It owns all of its state, so any number of copies
//! can run concurrently without synchronization.

/// Iterate `z <- z^2 + c` for every pixel of a `size`x`size` grid over
/// [-2, 2) x [-2, 2) and return the total iteration count.
pub fn mandelbrot(size: usize, max_iter: u32) -> u64 {
    let half = size as f64 / 2.0;
    let step = 4.0 / size as f64;
    let mut total: u64 = 0;

    for y in 0..size {
        let cy = (y as f64 - half) * step;
        for x in 0..size {
            let cx = (x as f64 - half) * step;
            total += u64::from(escape_time(cx, cy, max_iter));
        }
    }

    total
}

#[inline]
fn escape_time(cx: f64, cy: f64, max_iter: u32) -> u32 {
    let (mut zx, mut zy) = (0.0f64, 0.0f64);
    let mut iter = 0;
    while zx * zx + zy * zy < 4.0 && iter < max_iter {
        let next = zx * zx - zy * zy + cx;
        zy = 2.0 * zx * zy + cy;
        zx = next;
        iter += 1;
    }
    iter
}
