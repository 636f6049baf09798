//! Small numeric helpers.

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(101.456, 2), 101.46);
        assert_eq!(round_to(-2.345_67, 2), -2.35);
        assert_eq!(round_to(55.55, 1), 55.6);
        assert_eq!(round_to(0.123_456, 4), 0.1235);
        assert_eq!(round_to(7.0, 0), 7.0);
    }
}
