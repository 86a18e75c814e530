use chrono::Utc;
use log::info;
use serde_json::json;
use thiserror::Error;

use safri_store::{changes, RealtimeStore, StoreError};

use crate::{
    paths, util::random_string, CarSummary, DispatchContext, DispatchEvent, Location, RideData,
    RideStatus, SmsGateway,
};

/// Publishes ride requests into the store and manages their pre-assignment
/// lifecycle.
pub struct RideManager<S, G> {
    context: DispatchContext<S, G>,
}

#[derive(Debug, Error)]
pub enum RideError {
    #[error("Ride {0} does not exist")]
    NotFound(String),
    #[error("Ride does not belong to this customer")]
    NotYourRide,
    #[error("Ride can no longer be cancelled")]
    NotCancellable,
    #[error("Origin and destination are required")]
    MissingLocation,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct NewRide {
    pub customer_id: String,
    pub origin: Location,
    pub destination: Location,
    pub selected_car: CarSummary,
    pub distance: f64,
    pub duration: f64,
    pub fare: f64,
}

impl<S, G> RideManager<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    pub fn new(context: &DispatchContext<S, G>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Publishes a new ride request. The record lands in a single write,
    /// and every subscribed matcher picks it up from the fan-out.
    pub async fn request_ride(&self, new_ride: NewRide) -> Result<RideData, RideError> {
        if new_ride.origin.location_name.is_empty() || new_ride.destination.location_name.is_empty()
        {
            return Err(RideError::MissingLocation);
        }

        let ride = RideData {
            ride_id: random_string(20),
            customer_id: new_ride.customer_id,
            origin: new_ride.origin,
            destination: new_ride.destination,
            selected_car: new_ride.selected_car,
            distance: new_ride.distance,
            duration: new_ride.duration,
            fare: new_ride.fare,
            status: RideStatus::Requested,
            driver_info: None,
            rent_a_car_uid: None,
            requested_at: Utc::now(),
        };

        let path = paths::ride(&ride.ride_id);
        let value = serde_json::to_value(&ride).map_err(|source| StoreError::Decode {
            path: path.clone(),
            source,
        })?;

        self.context.store.set(&path, value).await?;

        info!(
            "Ride {} requested by {} for car {}",
            ride.ride_id, ride.customer_id, ride.selected_car.registration_number
        );

        self.context.emit(DispatchEvent::RideRequested { ride: ride.clone() });

        Ok(ride)
    }

    pub async fn ride_by_id(&self, ride_id: &str) -> Result<RideData, RideError> {
        let snapshot = self.context.store.get(&paths::ride(ride_id)).await?;

        if !snapshot.exists() {
            return Err(RideError::NotFound(ride_id.to_string()));
        }

        Ok(snapshot.decode()?)
    }

    /// Withdraws a ride request. Only the requesting customer can cancel,
    /// and only while the ride is still unassigned — the conditional
    /// update refuses anything an owner already won.
    pub async fn cancel_ride(&self, ride_id: &str, customer_uid: &str) -> Result<(), RideError> {
        let ride = self.ride_by_id(ride_id).await?;

        if ride.customer_id != customer_uid {
            return Err(RideError::NotYourRide);
        }

        let cancelled = self
            .context
            .store
            .update_if(
                &paths::ride(ride_id),
                "status",
                json!("requested"),
                changes([("status", json!("cancelled"))]),
            )
            .await?;

        if !cancelled {
            return Err(RideError::NotCancellable);
        }

        info!("Ride {ride_id} cancelled by its customer");

        self.context.emit(DispatchEvent::RideCancelled {
            ride_id: ride_id.to_string(),
        });

        Ok(())
    }

    /// Every ride the customer has requested, newest first.
    pub async fn history(&self, customer_uid: &str) -> Result<Vec<RideData>, RideError> {
        let snapshot = self.context.store.get(&paths::rides()).await?;

        let mut rides: Vec<RideData> = snapshot
            .decode_children::<RideData>()
            .into_iter()
            .filter(|ride| ride.customer_id == customer_uid)
            .collect();

        rides.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        Ok(rides)
    }
}

#[cfg(test)]
mod test {
    use safri_impls::MemoryStore;

    use super::{NewRide, RideError};
    use crate::{CarSummary, Dispatch, Location, LoggingSms, RideStatus};

    fn dispatch() -> Dispatch<MemoryStore, LoggingSms> {
        Dispatch::new(MemoryStore::new(), LoggingSms)
    }

    fn new_ride(customer: &str, registration: &str) -> NewRide {
        NewRide {
            customer_id: customer.to_string(),
            origin: Location {
                location_name: "Liberty Market".to_string(),
                lat: 31.5,
                lng: 74.3,
            },
            destination: Location {
                location_name: "Allama Iqbal Airport".to_string(),
                lat: 31.52,
                lng: 74.4,
            },
            selected_car: CarSummary {
                registration_number: registration.to_string(),
                manufacturer: "Toyota".to_string(),
                model: "Corolla".to_string(),
                year: 2020,
                color: "White".to_string(),
            },
            distance: 12.4,
            duration: 25.0,
            fare: 850.0,
        }
    }

    #[tokio::test]
    async fn requesting_publishes_the_ride() {
        let dispatch = dispatch();

        let ride = dispatch
            .rides
            .request_ride(new_ride("customer-1", "ABC-1234"))
            .await
            .unwrap();

        let stored = dispatch.rides.ride_by_id(&ride.ride_id).await.unwrap();

        assert_eq!(stored.status, RideStatus::Requested);
        assert_eq!(stored.selected_car.registration_number, "ABC-1234");
    }

    #[tokio::test]
    async fn only_the_customer_can_cancel() {
        let dispatch = dispatch();

        let ride = dispatch
            .rides
            .request_ride(new_ride("customer-1", "ABC-1234"))
            .await
            .unwrap();

        let result = dispatch.rides.cancel_ride(&ride.ride_id, "someone-else").await;

        assert!(matches!(result, Err(RideError::NotYourRide)));

        dispatch
            .rides
            .cancel_ride(&ride.ride_id, "customer-1")
            .await
            .unwrap();

        let stored = dispatch.rides.ride_by_id(&ride.ride_id).await.unwrap();

        assert_eq!(stored.status, RideStatus::Cancelled);
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_customer() {
        let dispatch = dispatch();

        dispatch
            .rides
            .request_ride(new_ride("customer-1", "ABC-1234"))
            .await
            .unwrap();
        dispatch
            .rides
            .request_ride(new_ride("customer-2", "XYZ-99"))
            .await
            .unwrap();

        let history = dispatch.rides.history("customer-1").await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].customer_id, "customer-1");
    }
}
