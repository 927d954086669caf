/// Benjamin Graham's upper bound on a defensive investor's price:
/// `sqrt(22.5 * EPS * BVPS)`, where 22.5 = 15 (max P/E) * 1.5 (max P/B).
///
/// Undefined for non-positive EPS or book value per share.
pub fn graham_number(eps: f64, book_value_per_share: f64) -> Option<f64> {
    if eps <= 0.0 || book_value_per_share <= 0.0 {
        return None;
    }
    let value = (22.5 * eps * book_value_per_share).sqrt();
    value.is_finite().then_some(value)
}
