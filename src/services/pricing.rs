use crate::models::PriceType;

/// Price of a booking, fixed once at creation.
///
/// Per-hour services are charged pro rata on the booked minutes and rounded
/// to cents.
pub fn total_price(price: f64, price_type: PriceType, duration_minutes: i32) -> f64 {
    match price_type {
        PriceType::PerJob => price,
        PriceType::PerHour => {
            let raw = price * f64::from(duration_minutes) / 60.0;
            (raw * 100.0).round() / 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_hour_is_pro_rata() {
        assert_eq!(total_price(100.0, PriceType::PerHour, 90), 150.0);
        assert_eq!(total_price(100.0, PriceType::PerHour, 60), 100.0);
        assert_eq!(total_price(45.0, PriceType::PerHour, 20), 15.0);
    }

    #[test]
    fn test_per_job_ignores_duration() {
        assert_eq!(total_price(500.0, PriceType::PerJob, 90), 500.0);
        assert_eq!(total_price(500.0, PriceType::PerJob, 600), 500.0);
    }

    #[test]
    fn test_per_hour_rounds_to_cents() {
        assert_eq!(total_price(10.0, PriceType::PerHour, 7), 1.17);
    }
}
