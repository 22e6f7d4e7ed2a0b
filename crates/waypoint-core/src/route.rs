//! Route distance, the Haversine length of a tour's key point sequence.

use uuid::Uuid;

use crate::{Error, Result, geo::distance_km, store::TourStore, tour::KeyPoint};

/// Sum of consecutive great-circle legs over `key_points` sorted by `order`.
///
/// Input order is irrelevant and gaps in `order` are tolerated. Fewer than
/// two points yield 0.
pub fn route_distance_km(key_points: &[KeyPoint]) -> f64 {
  if key_points.len() < 2 {
    return 0.0;
  }

  let mut ordered: Vec<&KeyPoint> = key_points.iter().collect();
  ordered.sort_by_key(|kp| kp.order);

  ordered
    .windows(2)
    .map(|leg| distance_km(leg[0].coordinate(), leg[1].coordinate()))
    .sum()
}

/// Reload the tour's key points, recompute its distance and persist it.
pub async fn recompute<S: TourStore>(store: &S, tour_id: Uuid) -> Result<f64> {
  let key_points = store
    .key_points_by_tour(tour_id)
    .await
    .map_err(Error::store)?;

  let distance = route_distance_km(&key_points);

  store
    .update_tour_distance(tour_id, distance)
    .await
    .map_err(Error::store)?;

  tracing::debug!(%tour_id, distance_km = distance, "route distance recomputed");
  Ok(distance)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kp(order: u32, latitude: f64, longitude: f64) -> KeyPoint {
    KeyPoint {
      key_point_id: Uuid::new_v4(),
      tour_id: Uuid::nil(),
      name: format!("P{order}"),
      description: String::new(),
      latitude,
      longitude,
      image: None,
      order,
    }
  }

  #[test]
  fn fewer_than_two_points_is_zero() {
    assert_eq!(route_distance_km(&[]), 0.0);
    assert_eq!(route_distance_km(&[kp(1, 45.0, 19.0)]), 0.0);
  }

  #[test]
  fn two_points_a_thousandth_of_a_degree_apart() {
    let d = route_distance_km(&[kp(1, 0.0, 0.0), kp(2, 0.0, 0.001)]);
    assert!((d - 0.111).abs() < 1e-3, "got {d}");
  }

  #[test]
  fn sorted_by_order_not_input_position() {
    // Visiting order 0 → 0.002 → 0.001 walks back on itself.
    let shuffled = [kp(3, 0.0, 0.001), kp(1, 0.0, 0.0), kp(2, 0.0, 0.002)];
    let straight = [kp(1, 0.0, 0.0), kp(2, 0.0, 0.001), kp(3, 0.0, 0.002)];

    let there_and_back = route_distance_km(&shuffled);
    let direct = route_distance_km(&straight);
    assert!(there_and_back > direct * 1.4, "{there_and_back} vs {direct}");
  }

  #[test]
  fn gaps_in_order_are_ignored() {
    let contiguous = [kp(1, 0.0, 0.0), kp(2, 0.0, 0.001), kp(3, 0.001, 0.001)];
    let gapped = [kp(2, 0.0, 0.0), kp(7, 0.0, 0.001), kp(40, 0.001, 0.001)];
    assert_eq!(route_distance_km(&contiguous), route_distance_km(&gapped));
  }

  #[test]
  fn recomputation_is_idempotent() {
    let points = [kp(1, 44.8, 20.4), kp(2, 44.81, 20.46), kp(3, 44.82, 20.45)];
    assert_eq!(route_distance_km(&points), route_distance_km(&points));
  }
}
