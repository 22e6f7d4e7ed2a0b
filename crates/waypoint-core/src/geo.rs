//! Great-circle distance on a spherical Earth.
//!
//! The Haversine metric is the only distance used by the engine, both for
//! route length and for geofence checks.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinate {
  pub const fn new(latitude: f64, longitude: f64) -> Self {
    Self { latitude, longitude }
  }

  /// `true` if latitude lies in `[-90, 90]` and longitude in `[-180, 180]`.
  pub fn is_valid(&self) -> bool {
    (-90.0..=90.0).contains(&self.latitude)
      && (-180.0..=180.0).contains(&self.longitude)
  }
}

/// Haversine distance between `a` and `b` in kilometres.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
  let lat1 = a.latitude.to_radians();
  let lat2 = b.latitude.to_radians();
  let delta_lat = (b.latitude - a.latitude).to_radians();
  let delta_lng = (b.longitude - a.longitude).to_radians();

  let h = (delta_lat / 2.0).sin().powi(2)
    + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);

  EARTH_RADIUS_KM * 2.0 * h.sqrt().asin()
}

/// `true` when `b` lies at or inside `radius_km` of `a`.
pub fn within_radius(a: Coordinate, b: Coordinate, radius_km: f64) -> bool {
  distance_km(a, b) <= radius_km
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_points_are_zero_apart() {
    let p = Coordinate::new(45.2671, 19.8335);
    assert_eq!(distance_km(p, p), 0.0);
  }

  #[test]
  fn distance_is_symmetric() {
    let a = Coordinate::new(44.7866, 20.4489);
    let b = Coordinate::new(45.2671, 19.8335);
    assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-12);
  }

  #[test]
  fn thousandth_of_a_degree_on_the_equator() {
    let d = distance_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.001));
    assert!((d - 0.1112).abs() < 1e-3, "got {d}");
  }

  #[test]
  fn london_to_paris() {
    let london = Coordinate::new(51.5074, -0.1278);
    let paris = Coordinate::new(48.8566, 2.3522);
    let d = distance_km(london, paris);
    assert!(d > 340.0 && d < 347.0, "got {d}");
  }

  #[test]
  fn radius_boundary_is_inclusive() {
    let a = Coordinate::new(0.0, 0.0);
    let b = Coordinate::new(0.0, 0.0004);
    let d = distance_km(a, b);
    assert!(within_radius(a, b, d));
    assert!(!within_radius(a, b, d - 1e-9));
  }

  #[test]
  fn coordinate_range_check() {
    assert!(Coordinate::new(90.0, -180.0).is_valid());
    assert!(!Coordinate::new(90.5, 0.0).is_valid());
    assert!(!Coordinate::new(0.0, 181.0).is_valid());
  }
}
