//! All schemas that are exposed from endpoints are defined here
//! along with the conversions from the dispatch types

use serde::Serialize;
use utoipa::ToSchema;

use safri_dispatch::{
    AccountData, CandidateRide, CarData, CarStatus, CarSummary, CustomerCard, DriverData,
    DriverInfo, DriverStatus, Location as DispatchLocation, RideData, RideStatus, Role,
    SessionData, TripPhase, TripState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    uid: String,
    user_name: String,
    email: String,
    phone_number: String,
    is_online: bool,
    role: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverLoginResult {
    token: String,
    driver: Driver,
    /// True until the driver has filled in their personal details
    requires_profile: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    location_name: String,
    lat: f64,
    lng: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCar {
    registration_number: String,
    manufacturer: String,
    model: String,
    year: u16,
    color: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignedDriver {
    pin_code: String,
    phone_number: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    ride_id: String,
    customer_id: String,
    origin: Location,
    destination: Location,
    selected_car: SelectedCar,
    distance: f64,
    duration: f64,
    fare: f64,
    status: String,
    driver: Option<AssignedDriver>,
    rent_a_car_uid: Option<String>,
    requested_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    uid: String,
    user_name: String,
    phone_number: String,
    photo_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    ride: Ride,
    customer: Option<Customer>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    registration_number: String,
    manufacturer: String,
    model: String,
    year: u16,
    color: String,
    average: f64,
    status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pin_code: String,
    phone_number: String,
    rent_a_car_uid: String,
    cnic: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    phase: String,
    ride: Option<Ride>,
    customer: Option<Customer>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

pub fn ride_status_str(status: RideStatus) -> &'static str {
    match status {
        RideStatus::Requested => "requested",
        RideStatus::Assigned => "assigned",
        RideStatus::Arrived => "arrived",
        RideStatus::Ongoing => "ongoing",
        RideStatus::Completed => "completed",
        RideStatus::Cancelled => "cancelled",
    }
}

pub fn role_str(role: Role) -> &'static str {
    match role {
        Role::Rider => "rider",
        Role::RentACarOwner => "rentACarOwner",
        Role::FreightRider => "freightRider",
        Role::Driver => "driver",
    }
}

pub fn trip_phase_str(phase: TripPhase) -> &'static str {
    match phase {
        TripPhase::Idle => "idle",
        TripPhase::AwaitingArrival => "awaiting-arrival",
        TripPhase::Arrived => "arrived",
        TripPhase::Ongoing => "ongoing",
        TripPhase::Completed => "completed",
    }
}

impl ToSerialized<User> for AccountData {
    fn to_serialized(&self) -> User {
        User {
            uid: self.uid.clone(),
            user_name: self.user_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            is_online: self.is_online,
            role: role_str(self.role).to_string(),
        }
    }
}

impl ToSerialized<LoginResult> for (SessionData, AccountData) {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.0.token.clone(),
            user: self.1.to_serialized(),
        }
    }
}

impl ToSerialized<DriverLoginResult> for (SessionData, DriverData) {
    fn to_serialized(&self) -> DriverLoginResult {
        DriverLoginResult {
            token: self.0.token.clone(),
            driver: self.1.to_serialized(),
            requires_profile: !self.1.has_profile(),
        }
    }
}

impl ToSerialized<Location> for DispatchLocation {
    fn to_serialized(&self) -> Location {
        Location {
            location_name: self.location_name.clone(),
            lat: self.lat,
            lng: self.lng,
        }
    }
}

impl ToSerialized<SelectedCar> for CarSummary {
    fn to_serialized(&self) -> SelectedCar {
        SelectedCar {
            registration_number: self.registration_number.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            year: self.year,
            color: self.color.clone(),
        }
    }
}

impl ToSerialized<AssignedDriver> for DriverInfo {
    fn to_serialized(&self) -> AssignedDriver {
        AssignedDriver {
            pin_code: self.pin_code.clone(),
            phone_number: self.phone_number.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

impl ToSerialized<Ride> for RideData {
    fn to_serialized(&self) -> Ride {
        Ride {
            ride_id: self.ride_id.clone(),
            customer_id: self.customer_id.clone(),
            origin: self.origin.to_serialized(),
            destination: self.destination.to_serialized(),
            selected_car: self.selected_car.to_serialized(),
            distance: self.distance,
            duration: self.duration,
            fare: self.fare,
            status: ride_status_str(self.status).to_string(),
            driver: self.driver_info.as_ref().map(|d| d.to_serialized()),
            rent_a_car_uid: self.rent_a_car_uid.clone(),
            requested_at: self.requested_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Customer> for CustomerCard {
    fn to_serialized(&self) -> Customer {
        Customer {
            uid: self.uid.clone(),
            user_name: self.user_name.clone(),
            phone_number: self.phone_number.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

impl ToSerialized<Candidate> for CandidateRide {
    fn to_serialized(&self) -> Candidate {
        Candidate {
            ride: self.ride.to_serialized(),
            customer: self.customer.as_ref().map(|c| c.to_serialized()),
        }
    }
}

impl ToSerialized<Car> for CarData {
    fn to_serialized(&self) -> Car {
        Car {
            registration_number: self.registration_number.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            year: self.year,
            color: self.color.clone(),
            average: self.average,
            status: match self.status {
                CarStatus::Idle => "Idle".to_string(),
                CarStatus::Booked => "booked".to_string(),
            },
        }
    }
}

impl ToSerialized<Driver> for DriverData {
    fn to_serialized(&self) -> Driver {
        Driver {
            pin_code: self.pin_code.clone(),
            phone_number: self.phone_number.clone(),
            rent_a_car_uid: self.rent_a_car_uid.clone(),
            cnic: self.cnic.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            status: match self.status {
                DriverStatus::Offline => "offline".to_string(),
                DriverStatus::Online => "online".to_string(),
                DriverStatus::Booked => "booked".to_string(),
            },
        }
    }
}

impl ToSerialized<Trip> for (TripState, Option<CustomerCard>) {
    fn to_serialized(&self) -> Trip {
        Trip {
            phase: trip_phase_str(self.0.phase).to_string(),
            ride: self.0.ride.as_ref().map(|r| r.to_serialized()),
            customer: self.1.as_ref().map(|c| c.to_serialized()),
        }
    }
}
