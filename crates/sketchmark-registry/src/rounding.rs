//! Grading-scale rounding.
//!
//! Raw engine credits are rounded to the half-point grading scale before
//! they are surfaced to graders. Positive credits round up from 0.6 to the
//! next whole point and from 0.15 to the half point; deductions shrink
//! (toward zero) to the next whole point from a fraction of 0.5 and to the
//! half point from 0.35, otherwise they stick to the whole point below.

const ROUND_UP_FRACTION: f64 = 0.6;
const ROUND_HALF_FRACTION: f64 = 0.15;
const DEDUCT_UP_FRACTION: f64 = 0.5;
const DEDUCT_HALF_FRACTION: f64 = 0.35;

/// Round a credit value to the grading scale.
pub fn round_credits(credits: f64) -> f64 {
    let whole = credits.floor();
    let fraction = credits - whole;
    if credits >= 0.0 {
        if fraction >= ROUND_UP_FRACTION {
            whole + 1.0
        } else if fraction >= ROUND_HALF_FRACTION {
            whole + 0.5
        } else {
            whole
        }
    } else if fraction >= DEDUCT_UP_FRACTION {
        whole + 1.0
    } else if fraction >= DEDUCT_HALF_FRACTION {
        whole + 0.5
    } else {
        whole
    }
}

#[cfg(test)]
mod tests {
    use super::round_credits;

    #[test]
    fn positive_credits() {
        assert_eq!(round_credits(1.6), 2.0);
        assert_eq!(round_credits(1.5), 1.5);
        assert_eq!(round_credits(1.3), 1.5);
        assert_eq!(round_credits(1.1), 1.0);
        assert_eq!(round_credits(2.0), 2.0);
        assert_eq!(round_credits(0.0), 0.0);
    }

    #[test]
    fn negative_credits() {
        assert_eq!(round_credits(-1.85), -2.0);
        assert_eq!(round_credits(-1.6), -1.5);
        assert_eq!(round_credits(-1.5), -1.0);
        assert_eq!(round_credits(-1.0), -1.0);
        assert_eq!(round_credits(-0.25), 0.0);
    }
}
