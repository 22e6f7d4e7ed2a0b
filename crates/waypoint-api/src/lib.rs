//! JSON REST API for Waypoint.
//!
//! Exposes an axum [`Router`] over the tour lifecycle and execution tracker.
//! Authentication is the gateway's job; handlers trust the forwarded
//! `X-User-ID` header (see [`identity::Caller`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1/tours", waypoint_api::api_router(state))
//! ```

pub mod error;
pub mod executions;
pub mod identity;
pub mod key_points;
pub mod tours;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use waypoint_core::{
  entitlement::PurchaseEntitlement,
  lifecycle::{LifecycleRules, TourLifecycle},
  store::TourStore,
  tracker::{ExecutionTracker, TrackerRules},
};

pub use error::ApiError;
pub use identity::Caller;

/// Services shared by every handler.
pub struct ApiState<S, P> {
  pub lifecycle: Arc<TourLifecycle<S, P>>,
  pub tracker:   Arc<ExecutionTracker<S, P>>,
}

impl<S, P> Clone for ApiState<S, P> {
  fn clone(&self) -> Self {
    Self {
      lifecycle: self.lifecycle.clone(),
      tracker:   self.tracker.clone(),
    }
  }
}

impl<S, P> ApiState<S, P>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  /// Build both services over one store and one purchase gate.
  pub fn new(
    store: Arc<S>,
    gate: Arc<P>,
    lifecycle_rules: LifecycleRules,
    tracker_rules: TrackerRules,
  ) -> Self {
    Self {
      lifecycle: Arc::new(TourLifecycle::new(store.clone(), gate.clone(), lifecycle_rules)),
      tracker:   Arc::new(ExecutionTracker::new(store, gate, tracker_rules)),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P>(state: ApiState<S, P>) -> Router<()>
where
  S: TourStore + 'static,
  P: PurchaseEntitlement + 'static,
{
  Router::new()
    // Tours
    .route("/", get(tours::mine::<S, P>))
    .route("/create-tour", post(tours::create::<S, P>))
    .route("/published", get(tours::published::<S, P>))
    .route("/{tour_id}", get(tours::get_one::<S, P>))
    .route("/{tour_id}/publish", put(tours::publish::<S, P>))
    .route("/{tour_id}/archive", put(tours::archive::<S, P>))
    .route("/{tour_id}/activate", put(tours::activate::<S, P>))
    .route("/{tour_id}/duration", post(tours::add_duration::<S, P>))
    // Key points
    .route(
      "/{tour_id}/keypoints",
      get(key_points::list::<S, P>).post(key_points::create::<S, P>),
    )
    .route(
      "/keypoints/{key_point_id}",
      put(key_points::update::<S, P>).delete(key_points::delete::<S, P>),
    )
    // Executions
    .route("/{tour_id}/start", post(executions::start::<S, P>))
    .route("/executions/active/{tour_id}", get(executions::active::<S, P>))
    .route("/executions/tour/{tour_id}", get(executions::by_tour::<S, P>))
    .route("/executions/{execution_id}", get(executions::get_one::<S, P>))
    .route(
      "/executions/{execution_id}/check-position",
      post(executions::check_position::<S, P>),
    )
    .route("/executions/{execution_id}/complete", put(executions::complete::<S, P>))
    .route("/executions/{execution_id}/abandon", put(executions::abandon::<S, P>))
    .with_state(state)
}
