use axum::{
    extract::State,
    routing::{get, post},
    Json,
};

use safri_dispatch::{NewDriverProfile, Role};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{DriverProfileSchema, PresenceSchema, ValidatedJson},
    serialized::{Driver, ToSerialized, Trip},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/driver/profile",
    tag = "driver",
    request_body = DriverProfileSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Driver)
    )
)]
async fn complete_profile(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<DriverProfileSchema>,
) -> ServerResult<Json<Driver>> {
    let session = session.require(Role::Driver)?;

    let driver = context
        .dispatch
        .auth
        .complete_driver_profile(
            &session.uid,
            NewDriverProfile {
                cnic: body.cnic,
                first_name: body.first_name,
                last_name: body.last_name,
            },
        )
        .await?;

    Ok(Json(driver.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/driver/presence",
    tag = "driver",
    request_body = PresenceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Driver status was written")
    )
)]
async fn presence(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<PresenceSchema>,
) -> ServerResult<()> {
    let session = session.require(Role::Driver)?;

    context
        .dispatch
        .presence
        .set_driver_online(&session.uid, body.online)
        .await?;

    // Going online also arms the trip tracker for this driver
    if body.online {
        context.dispatch.tracker(&session.uid);
    }

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/driver/trip",
    tag = "driver",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Trip)
    )
)]
async fn trip(session: Session, State(context): State<ServerContext>) -> ServerResult<Json<Trip>> {
    let session = session.require(Role::Driver)?;

    let tracker = context.dispatch.tracker(&session.uid);
    let customer = tracker.customer().await?;

    Ok(Json((tracker.state(), customer).to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/driver/trip/arrived",
    tag = "driver",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Ride was marked arrived")
    )
)]
async fn arrived(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    let session = session.require(Role::Driver)?;

    context.dispatch.tracker(&session.uid).mark_arrived().await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/driver/trip/start",
    tag = "driver",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Ride was marked ongoing")
    )
)]
async fn start(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    let session = session.require(Role::Driver)?;

    context.dispatch.tracker(&session.uid).start_ride().await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/driver/trip/end",
    tag = "driver",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Ride was completed and the trip reset")
    )
)]
async fn end(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    let session = session.require(Role::Driver)?;

    context.dispatch.tracker(&session.uid).end_ride().await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/profile", post(complete_profile))
        .route("/presence", post(presence))
        .route("/trip", get(trip))
        .route("/trip/arrived", post(arrived))
        .route("/trip/start", post(start))
        .route("/trip/end", post(end))
}
