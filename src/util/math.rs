//! Numeric helpers for cost aggregation.

/// Fast approximation of `exp(x)` via `(1 + x/1024)^1024`.
///
/// Ten successive squarings replace the transcendental call. Accurate to
/// roughly 1e-3 relative error for small arguments; for very negative
/// arguments the relative error grows but the result still vanishes, which
/// is all the bilateral weight needs.
#[inline]
pub fn fast_exp(x: f64) -> f64 {
    let mut v = 1.0 + x / 1024.0;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v *= v;
    v
}
