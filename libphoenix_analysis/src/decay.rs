use time::Date;

/// Days between a source's production date and the measurement date.
pub fn days_elapsed(production: Date, measurement: Date) -> i64 {
    (measurement - production).whole_days()
}

/// Remaining activity of a radioactive source after `days` days, given its
/// initial activity and half-life in days.
pub fn remaining_activity(initial_activity: f64, half_life_days: f64, days: i64) -> f64 {
    let decay_constant = std::f64::consts::LN_2 / half_life_days;
    initial_activity * (-decay_constant * days as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn days_elapsed_counts_whole_days() {
        assert_eq!(days_elapsed(date!(2016 - 01 - 26), date!(2016 - 02 - 26)), 31);
        assert_eq!(days_elapsed(date!(2016 - 01 - 26), date!(2016 - 01 - 26)), 0);
    }

    #[test]
    fn one_half_life_halves_the_activity() {
        let remaining = remaining_activity(37_000_000.0, 1925.28, 1925);
        assert!((remaining / 37_000_000.0 - 0.5).abs() < 1e-3);
    }

    #[test]
    fn zero_days_leaves_activity_unchanged() {
        assert_eq!(remaining_activity(81_000.0, 157_788.0, 0), 81_000.0);
    }
}
