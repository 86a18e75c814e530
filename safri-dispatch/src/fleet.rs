use log::{info, warn};
use thiserror::Error;

use safri_store::{RealtimeStore, StoreError};

use crate::{
    paths,
    util::{is_valid_phone_number, is_valid_registration, random_pin},
    CarData, CarStatus, DispatchContext, DispatchEvent, DriverData, DriverStatus, SmsGateway,
};

/// An owner's cars and drivers: the records the matcher and the
/// assignment workflow operate against.
pub struct Fleet<S, G> {
    context: DispatchContext<S, G>,
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Invalid registration number")]
    InvalidRegistration,
    #[error("Invalid phone number")]
    InvalidPhoneNumber,
    #[error("Car {0} is already registered")]
    DuplicateCar(String),
    #[error("Car {0} does not exist")]
    CarNotFound(String),
    #[error("No unused PIN could be generated")]
    PinSpaceExhausted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct NewCar {
    pub registration_number: String,
    pub manufacturer: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    pub average: f64,
}

impl<S, G> Fleet<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    /// The 4-digit PIN space is small, so generation gives up eventually
    /// rather than spinning on a crowded store.
    const MAX_PIN_ATTEMPTS: usize = 100;

    pub fn new(context: &DispatchContext<S, G>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn add_car(&self, owner_uid: &str, new_car: NewCar) -> Result<CarData, FleetError> {
        if !is_valid_registration(&new_car.registration_number) {
            return Err(FleetError::InvalidRegistration);
        }

        let path = paths::owner_car(owner_uid, &new_car.registration_number);

        if self.context.store.get(&path).await?.exists() {
            return Err(FleetError::DuplicateCar(new_car.registration_number));
        }

        let car = CarData {
            registration_number: new_car.registration_number,
            manufacturer: new_car.manufacturer,
            model: new_car.model,
            year: new_car.year,
            color: new_car.color,
            average: new_car.average,
            status: CarStatus::Idle,
        };

        let value = serde_json::to_value(&car).map_err(|source| StoreError::Decode {
            path: path.clone(),
            source,
        })?;

        self.context.store.set(&path, value).await?;

        info!(
            "Car {} added to fleet of {owner_uid}",
            car.registration_number
        );

        Ok(car)
    }

    pub async fn cars(&self, owner_uid: &str) -> Result<Vec<CarData>, FleetError> {
        let snapshot = self.context.store.get(&paths::owner_cars(owner_uid)).await?;

        Ok(snapshot.decode_children())
    }

    pub async fn remove_car(&self, owner_uid: &str, registration: &str) -> Result<(), FleetError> {
        let path = paths::owner_car(owner_uid, registration);

        if !self.context.store.get(&path).await?.exists() {
            return Err(FleetError::CarNotFound(registration.to_string()));
        }

        self.context.store.remove(&path).await?;

        Ok(())
    }

    /// Registers a driver by phone number. A fresh 4-digit PIN becomes
    /// the driver's key and credential, and is texted to them so they can
    /// log in. The driver starts offline with an incomplete profile.
    pub async fn add_driver(
        &self,
        owner_uid: &str,
        phone_number: &str,
    ) -> Result<DriverData, FleetError> {
        if !is_valid_phone_number(phone_number) {
            return Err(FleetError::InvalidPhoneNumber);
        }

        let pin = self.unused_pin().await?;

        let driver = DriverData {
            pin_code: pin.clone(),
            phone_number: phone_number.to_string(),
            rent_a_car_uid: owner_uid.to_string(),
            cnic: None,
            first_name: None,
            last_name: None,
            status: DriverStatus::Offline,
        };

        let path = paths::driver(&pin);
        let value = serde_json::to_value(&driver).map_err(|source| StoreError::Decode {
            path: path.clone(),
            source,
        })?;

        self.context.store.set(&path, value.clone()).await?;
        self.context
            .store
            .set(&paths::owner_driver(owner_uid, &pin), value)
            .await?;

        info!("Driver {pin} registered for {owner_uid}");

        // The login PIN reaches the driver out of band. A failed text is
        // not fatal: the record exists and the owner can resend.
        let message = format!("Your PIN is {pin}. Please use this PIN to login to the app.");

        match self.context.sms.send(phone_number, &message) {
            Ok(()) => self.context.emit(DispatchEvent::SmsDispatched {
                phone_number: phone_number.to_string(),
            }),
            Err(e) => warn!("Could not text login PIN to {phone_number}: {e}"),
        }

        Ok(driver)
    }

    /// Every driver registered by the owner, regardless of status.
    pub async fn drivers(&self, owner_uid: &str) -> Result<Vec<DriverData>, FleetError> {
        let snapshot = self.context.store.get(&paths::drivers()).await?;

        Ok(snapshot
            .decode_children::<DriverData>()
            .into_iter()
            .filter(|driver| driver.rent_a_car_uid == owner_uid)
            .collect())
    }

    /// The drivers an owner can assign right now.
    pub async fn available_drivers(&self, owner_uid: &str) -> Result<Vec<DriverData>, FleetError> {
        Ok(self
            .drivers(owner_uid)
            .await?
            .into_iter()
            .filter(|driver| driver.status == DriverStatus::Online)
            .collect())
    }

    async fn unused_pin(&self) -> Result<String, FleetError> {
        for _ in 0..Self::MAX_PIN_ATTEMPTS {
            let pin = random_pin();

            if !self.context.store.get(&paths::driver(&pin)).await?.exists() {
                return Ok(pin);
            }
        }

        Err(FleetError::PinSpaceExhausted)
    }
}
