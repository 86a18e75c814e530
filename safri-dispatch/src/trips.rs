use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, select, Sender};
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use safri_store::{changes, diff_children, ChildChange, RealtimeStore, StoreError};

use crate::{
    paths, AccountData, CustomerCard, DispatchContext, DispatchEvent, RideData, RideStatus,
    SmsGateway,
};

/// Where a driver is in their current trip.
///
/// One tagged union instead of a pile of booleans, so an invalid
/// combination cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripPhase {
    /// No ride is assigned. Entered at login and again after completion.
    #[default]
    Idle,
    /// An assignment was observed; the driver is heading to the pickup
    AwaitingArrival,
    Arrived,
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct TripState {
    pub phase: TripPhase,
    pub ride: Option<RideData>,
}

#[derive(Debug, Error)]
pub enum TripError {
    #[error("Transition is not allowed from the current phase")]
    InvalidTransition,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Follows one driver's assigned ride through its lifecycle.
///
/// The tracker watches the rides subtree; the moment a ride carrying the
/// driver's PIN turns up assigned, the trip leaves [TripPhase::Idle]. The
/// forward transitions are driven by the driver and each one writes the
/// ride's status back to the store. Nothing ever moves backwards.
pub struct TripTracker<S, G> {
    context: DispatchContext<S, G>,
    pin: String,
    state: Mutex<TripState>,
    stop: Sender<()>,
}

impl<S, G> TripTracker<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    pub fn spawn(context: &DispatchContext<S, G>, pin: &str) -> Arc<Self> {
        let (stop, stop_receiver) = bounded(1);

        let tracker = Arc::new(Self {
            context: context.clone(),
            pin: pin.to_string(),
            state: Default::default(),
            stop,
        });

        let me = Arc::downgrade(&tracker);
        let store = context.store.clone();

        thread::spawn(move || {
            let subscription = store.subscribe(&paths::rides());
            let mut previous = None;

            loop {
                select! {
                    recv(subscription.receiver()) -> msg => {
                        let Ok(snapshot) = msg else { break };

                        let changed = diff_children(previous.as_ref(), snapshot.value());
                        previous = snapshot.into_value();

                        let Some(tracker) = me.upgrade() else { break };

                        for change in changed {
                            tracker.observe(&change);
                        }
                    }
                    recv(stop_receiver) -> _ => break,
                }
            }
        });

        tracker
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }

    pub fn state(&self) -> TripState {
        self.state.lock().clone()
    }

    /// The profile of the customer being served, for the trip card.
    pub async fn customer(&self) -> Result<Option<CustomerCard>, TripError> {
        let Some(ride) = self.state.lock().ride.clone() else {
            return Ok(None);
        };

        let snapshot = self
            .context
            .store
            .get(&paths::users().child(&ride.customer_id))
            .await?;

        Ok(snapshot
            .decode::<AccountData>()
            .ok()
            .map(CustomerCard::from))
    }

    /// The driver announces they reached the pickup point. Pressing the
    /// button twice re-writes the same status and changes nothing else.
    pub async fn mark_arrived(&self) -> Result<(), TripError> {
        let (ride_id, repeat) = {
            let state = self.state.lock();

            match (state.phase, &state.ride) {
                (TripPhase::AwaitingArrival, Some(ride)) => (ride.ride_id.clone(), false),
                (TripPhase::Arrived, Some(ride)) => (ride.ride_id.clone(), true),
                _ => return Err(TripError::InvalidTransition),
            }
        };

        self.write_status(&ride_id, "arrived").await?;

        if repeat {
            return Ok(());
        }

        self.advance(TripPhase::Arrived, Some(ride_id));

        Ok(())
    }

    pub async fn start_ride(&self) -> Result<(), TripError> {
        let ride_id = {
            let state = self.state.lock();

            match (state.phase, &state.ride) {
                (TripPhase::Arrived, Some(ride)) => ride.ride_id.clone(),
                _ => return Err(TripError::InvalidTransition),
            }
        };

        self.write_status(&ride_id, "ongoing").await?;
        self.advance(TripPhase::Ongoing, Some(ride_id));

        Ok(())
    }

    /// Completes the trip: the ride record is closed out, the driver and
    /// the car become available again, and the tracker resets to idle.
    pub async fn end_ride(&self) -> Result<(), TripError> {
        let ride = {
            let state = self.state.lock();

            match (state.phase, &state.ride) {
                (TripPhase::Ongoing, Some(ride)) => ride.clone(),
                _ => return Err(TripError::InvalidTransition),
            }
        };

        self.write_status(&ride.ride_id, "completed").await?;

        // Post-completion housekeeping. The trip itself is already over,
        // so a failure here is logged and the records heal on the next
        // assignment attempt against them.
        let released = self
            .context
            .store
            .update(
                &paths::driver(&self.pin),
                changes([("status", json!("online"))]),
            )
            .await;

        if let Err(e) = released {
            warn!("Could not release driver {} after trip: {e}", self.pin);
        }

        if let Some(owner_uid) = &ride.rent_a_car_uid {
            let released = self
                .context
                .store
                .update(
                    &paths::owner_car(owner_uid, &ride.selected_car.registration_number),
                    changes([("status", json!("Idle"))]),
                )
                .await;

            if let Err(e) = released {
                warn!(
                    "Could not release car {} after trip: {e}",
                    ride.selected_car.registration_number
                );
            }
        }

        {
            let mut state = self.state.lock();
            state.phase = TripPhase::Idle;
            state.ride = None;
        }

        info!("Driver {} completed ride {}", self.pin, ride.ride_id);

        self.context.emit(DispatchEvent::TripPhaseChanged {
            driver_pin: self.pin.clone(),
            phase: TripPhase::Completed,
            ride_id: Some(ride.ride_id),
        });

        Ok(())
    }

    /// Reacts to a changed ride: an assignment carrying this driver's PIN
    /// pulls an idle tracker into the trip. The ride value comes straight
    /// off the fan-out, so nothing is re-read here.
    fn observe(&self, change: &ChildChange) {
        let value = match change {
            ChildChange::Added { value, .. } => value,
            ChildChange::Modified { value, .. } => value,
            ChildChange::Removed { .. } => return,
        };

        if self.state.lock().phase != TripPhase::Idle {
            return;
        }

        let Ok(ride) = serde_json::from_value::<RideData>(value.clone()) else {
            return;
        };

        let is_mine = ride
            .driver_info
            .as_ref()
            .map(|info| info.pin_code == self.pin)
            .unwrap_or(false);

        if !is_mine || ride.status != RideStatus::Assigned {
            return;
        }

        {
            let mut state = self.state.lock();

            // Re-check under the lock so two fan-outs cannot both enter
            if state.phase != TripPhase::Idle {
                return;
            }

            state.phase = TripPhase::AwaitingArrival;
            state.ride = Some(ride.clone());
        }

        info!("Driver {} picked up assignment {}", self.pin, ride.ride_id);

        self.context.emit(DispatchEvent::TripPhaseChanged {
            driver_pin: self.pin.clone(),
            phase: TripPhase::AwaitingArrival,
            ride_id: Some(ride.ride_id),
        });
    }

    async fn write_status(&self, ride_id: &str, status: &str) -> Result<(), TripError> {
        self.context
            .store
            .update(&paths::ride(ride_id), changes([("status", json!(status))]))
            .await?;

        Ok(())
    }

    fn advance(&self, phase: TripPhase, ride_id: Option<String>) {
        self.state.lock().phase = phase;

        self.context.emit(DispatchEvent::TripPhaseChanged {
            driver_pin: self.pin.clone(),
            phase,
            ride_id,
        });
    }
}

impl<S, G> Drop for TripTracker<S, G> {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use safri_impls::MemoryStore;
    use safri_store::RealtimeStore;

    use super::{TripError, TripPhase};
    use crate::{
        paths, CarData, CarStatus, Dispatch, DispatchEvent, DriverData, DriverStatus, LoggingSms,
        RideData, RideStatus,
    };

    async fn seeded() -> Dispatch<MemoryStore, LoggingSms> {
        let dispatch = Dispatch::new(MemoryStore::new(), LoggingSms);
        let store = dispatch.context().store;

        let ride = RideData::mock("ride-1", "customer-1", "ABC-1234");
        let driver = DriverData::mock("4821", "owner-1");
        let car = CarData::mock("ABC-1234");

        store
            .set(&paths::ride("ride-1"), serde_json::to_value(&ride).unwrap())
            .await
            .unwrap();
        store
            .set(
                &paths::driver("4821"),
                serde_json::to_value(&driver).unwrap(),
            )
            .await
            .unwrap();
        store
            .set(
                &paths::owner_car("owner-1", "ABC-1234"),
                serde_json::to_value(&car).unwrap(),
            )
            .await
            .unwrap();

        dispatch
    }

    fn wait_for_phase(dispatch: &Dispatch<MemoryStore, LoggingSms>, phase: TripPhase) {
        let deadline = Instant::now() + Duration::from_secs(5);

        while Instant::now() < deadline {
            let event = dispatch.next_event_within(Duration::from_millis(100));

            if let Some(DispatchEvent::TripPhaseChanged { phase: seen, .. }) = event {
                if seen == phase {
                    return;
                }
            }
        }

        panic!("timed out waiting for trip phase {phase:?}");
    }

    async fn ride(dispatch: &Dispatch<MemoryStore, LoggingSms>) -> RideData {
        dispatch
            .context()
            .store
            .get(&paths::ride("ride-1"))
            .await
            .unwrap()
            .decode()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn an_assignment_pulls_the_tracker_out_of_idle() {
        let dispatch = seeded().await;
        let tracker = dispatch.tracker("4821");

        assert_eq!(tracker.state().phase, TripPhase::Idle);

        dispatch
            .assignment
            .assign("owner-1", "ride-1", "4821")
            .await
            .unwrap();

        wait_for_phase(&dispatch, TripPhase::AwaitingArrival);

        let state = tracker.state();

        assert_eq!(state.phase, TripPhase::AwaitingArrival);
        assert_eq!(state.ride.unwrap().ride_id, "ride-1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn the_trip_walks_forward_and_never_backward() {
        let dispatch = seeded().await;
        let tracker = dispatch.tracker("4821");

        dispatch
            .assignment
            .assign("owner-1", "ride-1", "4821")
            .await
            .unwrap();
        wait_for_phase(&dispatch, TripPhase::AwaitingArrival);

        // Starting before arriving is refused
        assert!(matches!(
            tracker.start_ride().await,
            Err(TripError::InvalidTransition)
        ));

        tracker.mark_arrived().await.unwrap();
        assert_eq!(ride(&dispatch).await.status, RideStatus::Arrived);

        // A duplicate press re-writes the same status and nothing else
        tracker.mark_arrived().await.unwrap();
        assert_eq!(tracker.state().phase, TripPhase::Arrived);
        assert_eq!(ride(&dispatch).await.status, RideStatus::Arrived);

        tracker.start_ride().await.unwrap();
        assert_eq!(ride(&dispatch).await.status, RideStatus::Ongoing);

        // Once underway there is no way back to arrived
        assert!(matches!(
            tracker.mark_arrived().await,
            Err(TripError::InvalidTransition)
        ));

        tracker.end_ride().await.unwrap();

        assert_eq!(ride(&dispatch).await.status, RideStatus::Completed);
        assert_eq!(tracker.state().phase, TripPhase::Idle);
        assert!(tracker.state().ride.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completion_releases_the_driver_and_the_car() {
        let dispatch = seeded().await;
        let tracker = dispatch.tracker("4821");

        dispatch
            .assignment
            .assign("owner-1", "ride-1", "4821")
            .await
            .unwrap();
        wait_for_phase(&dispatch, TripPhase::AwaitingArrival);

        tracker.mark_arrived().await.unwrap();
        tracker.start_ride().await.unwrap();
        tracker.end_ride().await.unwrap();

        let store = dispatch.context().store;

        let driver: DriverData = store
            .get(&paths::driver("4821"))
            .await
            .unwrap()
            .decode()
            .unwrap();
        let car: CarData = store
            .get(&paths::owner_car("owner-1", "ABC-1234"))
            .await
            .unwrap()
            .decode()
            .unwrap();

        assert_eq!(driver.status, DriverStatus::Online);
        assert_eq!(car.status, CarStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transitions_require_an_assignment() {
        let dispatch = seeded().await;
        let tracker = dispatch.tracker("4821");

        assert!(matches!(
            tracker.mark_arrived().await,
            Err(TripError::InvalidTransition)
        ));
        assert!(matches!(
            tracker.end_ride().await,
            Err(TripError::InvalidTransition)
        ));
    }
}
