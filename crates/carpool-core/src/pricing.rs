//! Route distance estimation and seat pricing.
//!
//! Prices are integer cents. The per-seat price of a ride is the trip cost
//! (`distance × rate`) split evenly across the offered seats and rounded to
//! the nearest cent.

use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, Result};

/// Default rate: 8.00 per kilometre.
pub const DEFAULT_RATE_PER_KM_CENTS: i64 = 800;

/// A city pair with a fixed road distance.
///
/// Matching is symmetric and uses substring containment on lowercased names,
/// so `"Chennai Central"` matches `chennai`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownRoute {
    /// One endpoint (lowercase).
    pub a: String,
    /// The other endpoint (lowercase).
    pub b: String,
    /// Road distance in kilometres.
    pub distance_km: f64,
}

impl KnownRoute {
    fn new(a: &str, b: &str, distance_km: f64) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            distance_km,
        }
    }

    fn matches(&self, source: &str, destination: &str) -> bool {
        (source.contains(&self.a) && destination.contains(&self.b))
            || (source.contains(&self.b) && destination.contains(&self.a))
    }
}

/// Result of pricing a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    /// Estimated distance in kilometres.
    pub distance_km: f64,
    /// Price per seat in cents.
    pub price_per_seat_cents: i64,
    /// Whole-trip cost in cents.
    pub trip_cost_cents: i64,
}

/// Pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Rate per kilometre in cents.
    pub rate_per_km_cents: i64,

    /// Routes with a fixed distance.
    pub known_routes: Vec<KnownRoute>,

    /// Lower bound for distances of unknown routes.
    pub fallback_min_km: u32,

    /// Upper bound (inclusive) for distances of unknown routes.
    pub fallback_max_km: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rate_per_km_cents: DEFAULT_RATE_PER_KM_CENTS,
            known_routes: vec![
                KnownRoute::new("chennai", "bangalore", 350.0),
                KnownRoute::new("mumbai", "pune", 150.0),
                KnownRoute::new("delhi", "agra", 230.0),
                KnownRoute::new("hyderabad", "vijayawada", 270.0),
                KnownRoute::new("kolkata", "durgapur", 170.0),
            ],
            fallback_min_km: 100,
            fallback_max_km: 500,
        }
    }
}

impl PricingConfig {
    /// Distance in kilometres between two places.
    ///
    /// Unknown routes get a distance derived from the normalized names, so the
    /// same pair always prices the same way in either direction.
    #[must_use]
    pub fn distance_km(&self, source: &str, destination: &str) -> f64 {
        let src = normalize(source);
        let dest = normalize(destination);

        if let Some(route) = self.known_routes.iter().find(|r| r.matches(&src, &dest)) {
            return route.distance_km;
        }

        let (lo, hi) = if src <= dest { (&src, &dest) } else { (&dest, &src) };
        let span = u64::from(self.fallback_max_km.saturating_sub(self.fallback_min_km)) + 1;
        let offset = fnv1a(format!("{lo}|{hi}").as_bytes()) % span;

        // span is bounded by u32, so the offset always fits
        f64::from(self.fallback_min_km) + f64::from(u32::try_from(offset).unwrap_or(0))
    }

    /// Price a route for the given number of offered seats.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::Validation` if either place name is blank.
    /// - `LifecycleError::InvalidSeatCount` if `seats` is zero.
    pub fn estimate(&self, source: &str, destination: &str, seats: u32) -> Result<RouteEstimate> {
        if source.trim().is_empty() || destination.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "source and destination are required".into(),
            ));
        }
        if seats == 0 {
            return Err(LifecycleError::InvalidSeatCount {
                seats,
                min: 1,
                max: u32::MAX,
            });
        }

        let distance_km = self.distance_km(source, destination);
        #[allow(clippy::cast_precision_loss)]
        let rate = self.rate_per_km_cents as f64;
        let trip = distance_km * rate;

        Ok(RouteEstimate {
            distance_km,
            price_per_seat_cents: round_cents(trip / f64::from(seats)),
            trip_cost_cents: round_cents(trip),
        })
    }
}

/// Format cents as a decimal amount with two places (`70000` → `"700.00"`).
#[must_use]
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[allow(clippy::cast_possible_truncation)]
fn round_cents(value: f64) -> i64 {
    value.round() as i64
}

fn normalize(place: &str) -> String {
    place.trim().to_lowercase()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_route_four_seats() {
        let pricing = PricingConfig::default();
        let est = pricing.estimate("Chennai", "Bangalore", 4).unwrap();
        assert!((est.distance_km - 350.0).abs() < f64::EPSILON);
        assert_eq!(est.price_per_seat_cents, 70_000);
        assert_eq!(est.trip_cost_cents, 280_000);
    }

    #[test]
    fn booking_two_seats_doubles_the_seat_price() {
        let est = PricingConfig::default()
            .estimate("chennai", "bangalore", 4)
            .unwrap();
        assert_eq!(est.price_per_seat_cents * 2, 140_000);
        assert_eq!(format_amount(est.price_per_seat_cents * 2), "1400.00");
    }

    #[test]
    fn known_routes_are_symmetric_and_substring_matched() {
        let pricing = PricingConfig::default();
        assert!((pricing.distance_km("Pune", "Mumbai") - 150.0).abs() < f64::EPSILON);
        assert!(
            (pricing.distance_km("New Delhi", "Agra Cantt") - 230.0).abs() < f64::EPSILON
        );
    }

    #[test]
    fn unknown_routes_are_deterministic_and_bounded() {
        let pricing = PricingConfig::default();
        let there = pricing.distance_km("Madurai", "Coimbatore");
        let back = pricing.distance_km("coimbatore ", "MADURAI");
        assert!((there - back).abs() < f64::EPSILON);
        assert!((100.0..=500.0).contains(&there));
    }

    #[test]
    fn uneven_split_rounds_to_nearest_cent() {
        let pricing = PricingConfig::default();
        // 150 km × 8.00 = 1200.00 over 7 seats = 171.428...
        let est = pricing.estimate("mumbai", "pune", 7).unwrap();
        assert_eq!(est.price_per_seat_cents, 17_143);
    }

    #[test]
    fn rejects_zero_seats_and_blank_places() {
        let pricing = PricingConfig::default();
        assert!(matches!(
            pricing.estimate("a", "b", 0),
            Err(LifecycleError::InvalidSeatCount { seats: 0, .. })
        ));
        assert!(matches!(
            pricing.estimate("  ", "b", 2),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(70_000), "700.00");
        assert_eq!(format_amount(17_143), "171.43");
        assert_eq!(format_amount(-5), "-0.05");
    }
}
