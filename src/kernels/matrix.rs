//! Dense single-precision matrix multiply
//!
//! Naive i-j-k loop on purpose: this measures plain floating-point throughput
//! through straightforward code, not a tuned GEMM.

/// Multiply two `n`x`n` pattern-filled matrices and return the top-left element.
pub fn matrix_multiply(n: usize) -> f32 {
    let len = n * n;
    let a: Vec<f32> = (0..len).map(|i| ((i % 100) + 1) as f32).collect();
    let b: Vec<f32> = (0..len).map(|i| ((i % 50) + 1) as f32).collect();
    let mut product = vec![0.0f32; len];

    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += a[i * n + k] * b[k * n + j];
            }
            product[i * n + j] = sum;
        }
    }

    product.first().copied().unwrap_or(0.0)
}
