//! Truncated Poisson weights for uniformization.

/// Compute normalized Poisson(λ) weights around the mode, truncating terms
/// whose unnormalized magnitude falls below `epsilon`. Returns the left
/// truncation point and the weights for `left..left + weights.len()`.
///
/// Working outward from the mode keeps the recurrence stable for large λ,
/// where `e^{-λ}` itself underflows; the final normalization folds the
/// discarded tail mass back into the kept terms.
pub fn poisson_weights(lambda: f64, epsilon: f64) -> (usize, Vec<f64>) {
    assert!(lambda >= 0.0 && lambda.is_finite());
    if lambda == 0.0 {
        return (0, vec![1.0]);
    }

    let mode = lambda.floor() as usize;

    // Downward from the mode: u_{k-1} = u_k * k / λ.
    let mut down = Vec::new();
    let mut u = 1.0f64;
    let mut k = mode;
    while k > 0 {
        u *= k as f64 / lambda;
        k -= 1;
        if u < epsilon {
            break;
        }
        down.push(u);
    }
    let left = mode - down.len();

    // Upward from the mode: u_{k+1} = u_k * λ / (k+1).
    let mut up = Vec::new();
    let mut u = 1.0f64;
    let mut k = mode;
    loop {
        u *= lambda / (k + 1) as f64;
        k += 1;
        if u < epsilon {
            break;
        }
        up.push(u);
    }

    let mut weights = Vec::with_capacity(down.len() + 1 + up.len());
    weights.extend(down.iter().rev());
    weights.push(1.0);
    weights.extend(up.iter());

    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    (left, weights)
}
