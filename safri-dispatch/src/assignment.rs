use log::{error, info};
use serde_json::json;
use thiserror::Error;

use safri_store::{changes, RealtimeStore, StoreError};

use crate::{
    paths, DispatchContext, DispatchEvent, DriverData, DriverStatus, RideData, SmsError,
    SmsGateway,
};

/// Commits a driver to a ride: SMS notification first, then the ride,
/// driver, and car records.
///
/// The ride transition is a conditional update on its status, so exactly
/// one owner can win a ride. The driver and car writes that follow are
/// compensated if they fail, instead of leaving a half-assigned trio of
/// records behind.
pub struct AssignmentWorkflow<S, G> {
    context: DispatchContext<S, G>,
}

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Ride {0} does not exist")]
    RideNotFound(String),
    #[error("Driver does not exist")]
    DriverNotFound,
    #[error("Driver belongs to a different fleet")]
    ForeignDriver,
    #[error("Driver is not online")]
    DriverUnavailable,
    #[error("Ride was already assigned")]
    AlreadyAssigned,
    #[error(transparent)]
    Sms(#[from] SmsError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<S, G> AssignmentWorkflow<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    pub fn new(context: &DispatchContext<S, G>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn assign(
        &self,
        owner_uid: &str,
        ride_id: &str,
        driver_pin: &str,
    ) -> Result<RideData, AssignmentError> {
        let store = &self.context.store;

        let ride_path = paths::ride(ride_id);
        let ride_snapshot = store.get(&ride_path).await?;

        if !ride_snapshot.exists() {
            return Err(AssignmentError::RideNotFound(ride_id.to_string()));
        }

        let ride: RideData = ride_snapshot.decode()?;

        let driver_snapshot = store.get(&paths::driver(driver_pin)).await?;

        if !driver_snapshot.exists() {
            return Err(AssignmentError::DriverNotFound);
        }

        let driver: DriverData = driver_snapshot.decode()?;

        if driver.rent_a_car_uid != owner_uid {
            return Err(AssignmentError::ForeignDriver);
        }

        if driver.status != DriverStatus::Online {
            return Err(AssignmentError::DriverUnavailable);
        }

        // The driver is notified before anything is written. A denied
        // permission or a failed send aborts the whole workflow with the
        // store untouched.
        self.context.sms.send(
            &driver.phone_number,
            &format!(
                "You have been assigned a ride. \
                 Please login to the Safri360 app with the PIN: {driver_pin}"
            ),
        )?;

        self.context.emit(DispatchEvent::SmsDispatched {
            phone_number: driver.phone_number.clone(),
        });

        // One conditional update decides the ride. A competing owner who
        // lost the race gets a clean refusal here, not a silent overwrite.
        let won = store
            .update_if(
                &ride_path,
                "status",
                json!("requested"),
                changes([
                    ("status", json!("assigned")),
                    (
                        "driverInfo",
                        serde_json::to_value(driver.info()).expect("driver info serializes"),
                    ),
                    ("rentACarUID", json!(owner_uid)),
                ]),
            )
            .await?;

        if !won {
            return Err(AssignmentError::AlreadyAssigned);
        }

        let booked = store
            .update(
                &paths::driver(driver_pin),
                changes([("status", json!("booked"))]),
            )
            .await;

        if let Err(e) = booked {
            self.revert_ride(ride_id).await;

            return Err(e.into());
        }

        let booked = store
            .update(
                &paths::owner_car(owner_uid, &ride.selected_car.registration_number),
                changes([("status", json!("booked"))]),
            )
            .await;

        if let Err(e) = booked {
            self.revert_driver(driver_pin).await;
            self.revert_ride(ride_id).await;

            return Err(e.into());
        }

        info!("Ride {ride_id} assigned to driver {driver_pin} by {owner_uid}");

        self.context.emit(DispatchEvent::RideAssigned {
            ride_id: ride_id.to_string(),
            owner_uid: owner_uid.to_string(),
            driver_pin: driver_pin.to_string(),
        });

        let assigned = store.get(&ride_path).await?;

        Ok(assigned.decode()?)
    }

    /// Compensation: puts the ride back on the market after a later write
    /// in the workflow failed.
    async fn revert_ride(&self, ride_id: &str) {
        let reverted = self
            .context
            .store
            .update(
                &paths::ride(ride_id),
                changes([
                    ("status", json!("requested")),
                    ("driverInfo", json!(null)),
                    ("rentACarUID", json!(null)),
                ]),
            )
            .await;

        if let Err(e) = reverted {
            // Nothing left to do but make the stranded record visible
            error!("Compensation failed, ride {ride_id} is stuck assigned: {e}");
        }
    }

    /// Compensation: frees the driver after the car write failed.
    async fn revert_driver(&self, driver_pin: &str) {
        let reverted = self
            .context
            .store
            .update(
                &paths::driver(driver_pin),
                changes([("status", json!("online"))]),
            )
            .await;

        if let Err(e) = reverted {
            error!("Compensation failed, driver {driver_pin} is stuck booked: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use safri_impls::{FaultyStore, MemoryStore};
    use safri_store::{RealtimeStore, StorePath};

    use super::AssignmentError;
    use crate::{
        paths, CarData, CarStatus, DenyingSms, Dispatch, DriverData, DriverStatus, FailingSms,
        LoggingSms, RideData, RideStatus, SmsGateway,
    };

    async fn seed<S, G>(dispatch: &Dispatch<S, G>)
    where
        S: RealtimeStore,
        G: SmsGateway,
    {
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
    }

    async fn ride_status<S, G>(dispatch: &Dispatch<S, G>) -> RideData
    where
        S: RealtimeStore,
        G: SmsGateway,
    {
        dispatch
            .context()
            .store
            .get(&paths::ride("ride-1"))
            .await
            .unwrap()
            .decode()
            .unwrap()
    }

    async fn driver_status<S, G>(dispatch: &Dispatch<S, G>) -> DriverStatus
    where
        S: RealtimeStore,
        G: SmsGateway,
    {
        dispatch
            .context()
            .store
            .get(&paths::driver("4821"))
            .await
            .unwrap()
            .decode::<DriverData>()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn successful_assignment_books_all_three_records() {
        let dispatch = Dispatch::new(MemoryStore::new(), LoggingSms);
        seed(&dispatch).await;

        let assigned = dispatch
            .assignment
            .assign("owner-1", "ride-1", "4821")
            .await
            .unwrap();

        assert_eq!(assigned.status, RideStatus::Assigned);
        assert_eq!(assigned.driver_info.unwrap().pin_code, "4821");
        assert_eq!(assigned.rent_a_car_uid.as_deref(), Some("owner-1"));

        assert_eq!(driver_status(&dispatch).await, DriverStatus::Booked);

        let car: CarData = dispatch
            .context()
            .store
            .get(&paths::owner_car("owner-1", "ABC-1234"))
            .await
            .unwrap()
            .decode()
            .unwrap();

        assert_eq!(car.status, CarStatus::Booked);
    }

    #[tokio::test]
    async fn denied_sms_permission_aborts_before_any_write() {
        let dispatch = Dispatch::new(MemoryStore::new(), DenyingSms);
        seed(&dispatch).await;

        let result = dispatch.assignment.assign("owner-1", "ride-1", "4821").await;

        assert!(matches!(result, Err(AssignmentError::Sms(_))));
        assert_eq!(ride_status(&dispatch).await.status, RideStatus::Requested);
        assert_eq!(driver_status(&dispatch).await, DriverStatus::Online);
    }

    #[tokio::test]
    async fn failed_send_aborts_before_any_write() {
        let dispatch = Dispatch::new(MemoryStore::new(), FailingSms);
        seed(&dispatch).await;

        let result = dispatch.assignment.assign("owner-1", "ride-1", "4821").await;

        assert!(matches!(result, Err(AssignmentError::Sms(_))));
        assert_eq!(ride_status(&dispatch).await.status, RideStatus::Requested);
    }

    #[tokio::test]
    async fn driver_write_failure_puts_the_ride_back_on_the_market() {
        let dispatch = Dispatch::new(FaultyStore::new(MemoryStore::new()), LoggingSms);
        seed(&dispatch).await;

        dispatch.context().store.fail_writes_at(&paths::drivers());

        let result = dispatch.assignment.assign("owner-1", "ride-1", "4821").await;

        assert!(matches!(result, Err(AssignmentError::Store(_))));

        let ride = ride_status(&dispatch).await;

        assert_eq!(ride.status, RideStatus::Requested);
        assert!(ride.driver_info.is_none());
        assert!(ride.rent_a_car_uid.is_none());
    }

    #[tokio::test]
    async fn car_write_failure_frees_the_driver_and_the_ride() {
        let dispatch = Dispatch::new(FaultyStore::new(MemoryStore::new()), LoggingSms);
        seed(&dispatch).await;

        dispatch
            .context()
            .store
            .fail_writes_at(&StorePath::parse("Rent A Car/owner-1/Cars"));

        let result = dispatch.assignment.assign("owner-1", "ride-1", "4821").await;

        assert!(matches!(result, Err(AssignmentError::Store(_))));
        assert_eq!(ride_status(&dispatch).await.status, RideStatus::Requested);
        assert_eq!(driver_status(&dispatch).await, DriverStatus::Online);
    }

    #[tokio::test]
    async fn losing_the_race_is_a_clean_refusal() {
        let dispatch = Dispatch::new(MemoryStore::new(), LoggingSms);
        seed(&dispatch).await;

        // A second owner who also carries ABC-1234 and their own driver
        let store = dispatch.context().store;
        let rival = DriverData::mock("9934", "owner-2");

        store
            .set(&paths::driver("9934"), serde_json::to_value(&rival).unwrap())
            .await
            .unwrap();
        store
            .set(
                &paths::owner_car("owner-2", "ABC-1234"),
                serde_json::to_value(&CarData::mock("ABC-1234")).unwrap(),
            )
            .await
            .unwrap();

        dispatch
            .assignment
            .assign("owner-1", "ride-1", "4821")
            .await
            .unwrap();

        let result = dispatch.assignment.assign("owner-2", "ride-1", "9934").await;

        assert!(matches!(result, Err(AssignmentError::AlreadyAssigned)));

        // The winner's assignment is intact and the loser's driver is free
        let ride = ride_status(&dispatch).await;

        assert_eq!(ride.driver_info.unwrap().pin_code, "4821");
        assert_eq!(
            store
                .get(&paths::driver("9934"))
                .await
                .unwrap()
                .decode::<DriverData>()
                .unwrap()
                .status,
            DriverStatus::Online
        );
    }

    #[tokio::test]
    async fn offline_drivers_cannot_be_assigned() {
        let dispatch = Dispatch::new(MemoryStore::new(), LoggingSms);
        seed(&dispatch).await;

        dispatch
            .context()
            .store
            .update(
                &paths::driver("4821"),
                safri_store::changes([("status", json!("offline"))]),
            )
            .await
            .unwrap();

        let result = dispatch.assignment.assign("owner-1", "ride-1", "4821").await;

        assert!(matches!(result, Err(AssignmentError::DriverUnavailable)));
    }

    #[tokio::test]
    async fn another_fleets_driver_is_refused() {
        let dispatch = Dispatch::new(MemoryStore::new(), LoggingSms);
        seed(&dispatch).await;

        let result = dispatch.assignment.assign("owner-2", "ride-1", "4821").await;

        assert!(matches!(result, Err(AssignmentError::ForeignDriver)));
    }
}
