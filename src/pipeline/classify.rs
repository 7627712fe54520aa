use crate::models::AbnormalDirection;

/// Range-based abnormality. `Some(direction)` means abnormal.
///
/// Callers pass the raw parsed value and the raw-unit bounds; mixing in a
/// unit-converted value would compare across units.
pub fn classify(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> Option<AbnormalDirection> {
    let value = value?;
    if min.is_some_and(|lo| value < lo) {
        return Some(AbnormalDirection::Low);
    }
    if max.is_some_and(|hi| value > hi) {
        return Some(AbnormalDirection::High);
    }
    None
}
