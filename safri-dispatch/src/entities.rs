use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rider's trip request, tracked through its status lifecycle.
///
/// Field spellings follow the historical store layout, so records written
/// by older clients keep decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideData {
    #[serde(rename = "rideID")]
    pub ride_id: String,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub origin: Location,
    pub destination: Location,
    pub selected_car: CarSummary,
    /// Route distance in kilometers, as computed by the requesting client
    pub distance: f64,
    /// Estimated duration in minutes
    pub duration: f64,
    pub fare: f64,
    pub status: RideStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_info: Option<DriverInfo>,
    #[serde(
        rename = "rentACarUID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rent_a_car_uid: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Assigned,
    Arrived,
    Ongoing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_name: String,
    pub lat: f64,
    pub lng: f64,
}

/// The car a rider picked when requesting, denormalized into the ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarSummary {
    pub registration_number: String,
    pub manufacturer: String,
    pub model: String,
    pub year: u16,
    pub color: String,
}

/// The driver committed to a ride, denormalized into the ride when the
/// assignment lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverInfo {
    pub pin_code: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// A rental car in an owner's fleet, keyed by registration number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarData {
    pub registration_number: String,
    pub manufacturer: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    /// Fuel average in km/l
    pub average: f64,
    pub status: CarStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarStatus {
    /// The historical records spell the idle state capitalized and the
    /// booked state lowercase, so both spellings are kept as-is
    #[serde(rename = "Idle")]
    Idle,
    #[serde(rename = "booked")]
    Booked,
}

/// A driver registered by a rent-a-car owner. The PIN is both the primary
/// key and the login credential; personal details arrive on first login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverData {
    pub pin_code: String,
    pub phone_number: String,
    #[serde(rename = "RentACarUID")]
    pub rent_a_car_uid: String,
    #[serde(rename = "CNIC", default, skip_serializing_if = "Option::is_none")]
    pub cnic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub status: DriverStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Offline,
    Online,
    Booked,
}

impl DriverData {
    /// A driver must complete their profile before going online.
    pub fn has_profile(&self) -> bool {
        self.cnic.is_some() && self.first_name.is_some() && self.last_name.is_some()
    }

    pub fn info(&self) -> DriverInfo {
        DriverInfo {
            pin_code: self.pin_code.clone(),
            phone_number: self.phone_number.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// An account profile record, keyed by uid under its role's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub uid: String,
    pub user_name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub is_online: bool,
    pub role: Role,
}

/// The actor types of the platform. Drivers authenticate by PIN rather
/// than by account, but sessions still carry a role for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Rider,
    RentACarOwner,
    FreightRider,
    Driver,
}

/// Login session data for authentication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub token: String,
    /// The account uid, or the driver PIN for driver sessions
    pub uid: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// The profile details shown on a candidate or trip card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCard {
    pub uid: String,
    pub user_name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl From<AccountData> for CustomerCard {
    fn from(account: AccountData) -> Self {
        Self {
            uid: account.uid,
            user_name: account.user_name,
            phone_number: account.phone_number,
            photo_url: account.photo_url,
        }
    }
}

#[cfg(test)]
impl RideData {
    pub fn mock(ride_id: &str, customer_id: &str, registration: &str) -> Self {
        Self {
            ride_id: ride_id.to_string(),
            customer_id: customer_id.to_string(),
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
            status: RideStatus::Requested,
            driver_info: None,
            rent_a_car_uid: None,
            requested_at: Utc::now(),
        }
    }
}

#[cfg(test)]
impl CarData {
    pub fn mock(registration: &str) -> Self {
        Self {
            registration_number: registration.to_string(),
            manufacturer: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2020,
            color: "White".to_string(),
            average: 14.0,
            status: CarStatus::Idle,
        }
    }
}

#[cfg(test)]
impl DriverData {
    pub fn mock(pin: &str, owner_uid: &str) -> Self {
        Self {
            pin_code: pin.to_string(),
            phone_number: "+923001234567".to_string(),
            rent_a_car_uid: owner_uid.to_string(),
            cnic: Some("35202-1234567-8".to_string()),
            first_name: Some("Ahmed".to_string()),
            last_name: Some("Khan".to_string()),
            status: DriverStatus::Online,
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn ride_round_trips_through_the_store_spelling() {
        let ride = RideData::mock("ride-1", "customer-1", "ABC-1234");
        let value = serde_json::to_value(&ride).unwrap();

        assert!(value.get("rideID").is_some());
        assert!(value.get("customerID").is_some());
        assert_eq!(value["status"], json!("requested"));
        assert_eq!(value["selectedCar"]["registrationNumber"], json!("ABC-1234"));

        let decoded: RideData = serde_json::from_value(value).unwrap();

        assert_eq!(decoded, ride);
    }

    #[test]
    fn car_status_keeps_historical_spellings() {
        assert_eq!(serde_json::to_value(CarStatus::Idle).unwrap(), json!("Idle"));
        assert_eq!(
            serde_json::to_value(CarStatus::Booked).unwrap(),
            json!("booked")
        );
    }

    #[test]
    fn driver_without_details_has_no_profile() {
        let mut driver = DriverData::mock("4821", "owner-1");
        driver.cnic = None;

        assert!(!driver.has_profile());
    }
}
