use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

use safri_dispatch::{CarSummary, Location, Role};

/// The account roles a client can register and log in as. Drivers are
/// onboarded by owners and log in by PIN instead.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RoleSchema {
    Rider,
    RentACarOwner,
    FreightRider,
}

impl From<RoleSchema> for Role {
    fn from(value: RoleSchema) -> Self {
        match value {
            RoleSchema::Rider => Role::Rider,
            RoleSchema::RentACarOwner => Role::RentACarOwner,
            RoleSchema::FreightRider => Role::FreightRider,
        }
    }
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 2, max = 128))]
    pub user_name: String,
    #[validate(length(max = 128))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone_number: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
    pub role: RoleSchema,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 128))]
    pub email: String,
    #[validate(length(max = 64))]
    pub password: String,
    pub role: RoleSchema,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverLoginSchema {
    #[validate(length(equal = 4))]
    pub pin: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordSchema {
    #[validate(length(max = 64))]
    pub current_password: String,
    #[validate(length(min = 8, max = 64))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationSchema {
    pub location_name: String,
    pub lat: f64,
    pub lng: f64,
}

impl From<LocationSchema> for Location {
    fn from(value: LocationSchema) -> Self {
        Location {
            location_name: value.location_name,
            lat: value.lat,
            lng: value.lng,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelectedCarSchema {
    pub registration_number: String,
    pub manufacturer: String,
    pub model: String,
    pub year: u16,
    pub color: String,
}

impl From<SelectedCarSchema> for CarSummary {
    fn from(value: SelectedCarSchema) -> Self {
        CarSummary {
            registration_number: value.registration_number,
            manufacturer: value.manufacturer,
            model: value.model,
            year: value.year,
            color: value.color,
        }
    }
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRideSchema {
    pub origin: LocationSchema,
    pub destination: LocationSchema,
    pub selected_car: SelectedCarSchema,
    #[validate(range(min = 0.0))]
    pub distance: f64,
    #[validate(range(min = 0.0))]
    pub duration: f64,
    #[validate(range(min = 0.0))]
    pub fare: f64,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCarSchema {
    #[validate(length(max = 12))]
    pub registration_number: String,
    #[validate(length(min = 1, max = 64))]
    pub manufacturer: String,
    #[validate(length(min = 1, max = 64))]
    pub model: String,
    #[validate(range(min = 1960, max = 2100))]
    pub year: u16,
    #[validate(length(min = 1, max = 32))]
    pub color: String,
    #[validate(range(min = 0.0))]
    pub average: f64,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDriverSchema {
    #[validate(length(max = 20))]
    pub phone_number: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverProfileSchema {
    #[validate(length(max = 20))]
    pub cnic: String,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PresenceSchema {
    pub online: bool,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignSchema {
    #[validate(length(equal = 4))]
    pub driver_pin: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
