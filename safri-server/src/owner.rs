use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};

use safri_dispatch::{NewCar, Role};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{AssignSchema, NewCarSchema, NewDriverSchema, ValidatedJson},
    serialized::{Candidate, Car, Driver, Ride, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/owner/candidates",
    tag = "owner",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Candidate>)
    )
)]
async fn candidates(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Candidate>>> {
    let session = session.require(Role::RentACarOwner)?;

    let matcher = context.dispatch.matcher(&session.uid);
    let candidates = matcher.enriched_candidates().await;

    Ok(Json(candidates.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/owner/candidates/{id}/ignore",
    tag = "owner",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Ride was dismissed from this owner's list only")
    )
)]
async fn ignore(
    session: Session,
    State(context): State<ServerContext>,
    Path(ride_id): Path<String>,
) -> ServerResult<()> {
    let session = session.require(Role::RentACarOwner)?;

    context.dispatch.matcher(&session.uid).ignore(&ride_id);

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/owner/candidates/{id}/assign",
    tag = "owner",
    request_body = AssignSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Ride)
    )
)]
async fn assign(
    session: Session,
    State(context): State<ServerContext>,
    Path(ride_id): Path<String>,
    ValidatedJson(body): ValidatedJson<AssignSchema>,
) -> ServerResult<Json<Ride>> {
    let session = session.require(Role::RentACarOwner)?;

    let ride = context
        .dispatch
        .assignment
        .assign(&session.uid, &ride_id, &body.driver_pin)
        .await?;

    Ok(Json(ride.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/owner/cars",
    tag = "owner",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Car>)
    )
)]
async fn cars(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Car>>> {
    let session = session.require(Role::RentACarOwner)?;

    let cars = context.dispatch.fleet.cars(&session.uid).await?;

    Ok(Json(cars.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/owner/cars",
    tag = "owner",
    request_body = NewCarSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Car)
    )
)]
async fn add_car(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewCarSchema>,
) -> ServerResult<Json<Car>> {
    let session = session.require(Role::RentACarOwner)?;

    let car = context
        .dispatch
        .fleet
        .add_car(
            &session.uid,
            NewCar {
                registration_number: body.registration_number,
                manufacturer: body.manufacturer,
                model: body.model,
                year: body.year,
                color: body.color,
                average: body.average,
            },
        )
        .await?;

    Ok(Json(car.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/owner/cars/{registration}",
    tag = "owner",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Car was removed from the fleet")
    )
)]
async fn remove_car(
    session: Session,
    State(context): State<ServerContext>,
    Path(registration): Path<String>,
) -> ServerResult<()> {
    let session = session.require(Role::RentACarOwner)?;

    context
        .dispatch
        .fleet
        .remove_car(&session.uid, &registration)
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/owner/drivers",
    tag = "owner",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Driver>)
    )
)]
async fn drivers(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Driver>>> {
    let session = session.require(Role::RentACarOwner)?;

    let drivers = context.dispatch.fleet.drivers(&session.uid).await?;

    Ok(Json(drivers.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/owner/drivers/available",
    tag = "owner",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Driver>)
    )
)]
async fn available_drivers(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Driver>>> {
    let session = session.require(Role::RentACarOwner)?;

    let drivers = context
        .dispatch
        .fleet
        .available_drivers(&session.uid)
        .await?;

    Ok(Json(drivers.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/owner/drivers",
    tag = "owner",
    request_body = NewDriverSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Driver)
    )
)]
async fn add_driver(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewDriverSchema>,
) -> ServerResult<Json<Driver>> {
    let session = session.require(Role::RentACarOwner)?;

    let driver = context
        .dispatch
        .fleet
        .add_driver(&session.uid, &body.phone_number)
        .await?;

    Ok(Json(driver.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/candidates", get(candidates))
        .route("/candidates/:id/ignore", post(ignore))
        .route("/candidates/:id/assign", post(assign))
        .route("/cars", get(cars))
        .route("/cars", post(add_car))
        .route("/cars/:registration", delete(remove_car))
        .route("/drivers", get(drivers))
        .route("/drivers", post(add_driver))
        .route("/drivers/available", get(available_drivers))
}
