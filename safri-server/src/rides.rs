use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};

use safri_dispatch::NewRide;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewRideSchema, ValidatedJson},
    serialized::{Ride, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/rides",
    tag = "rides",
    request_body = NewRideSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Ride)
    )
)]
async fn request_ride(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRideSchema>,
) -> ServerResult<Json<Ride>> {
    let session = session.require_customer()?;

    let ride = context
        .dispatch
        .rides
        .request_ride(NewRide {
            customer_id: session.uid,
            origin: body.origin.into(),
            destination: body.destination.into(),
            selected_car: body.selected_car.into(),
            distance: body.distance,
            duration: body.duration,
            fare: body.fare,
        })
        .await?;

    Ok(Json(ride.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rides/history",
    tag = "rides",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Ride>)
    )
)]
async fn history(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Ride>>> {
    let session = session.require_customer()?;

    let rides = context.dispatch.rides.history(&session.uid).await?;

    Ok(Json(rides.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rides/{id}",
    tag = "rides",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Ride)
    )
)]
async fn ride(
    _session: Session,
    State(context): State<ServerContext>,
    Path(ride_id): Path<String>,
) -> ServerResult<Json<Ride>> {
    let ride = context.dispatch.rides.ride_by_id(&ride_id).await?;

    Ok(Json(ride.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rides/{id}/cancel",
    tag = "rides",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Ride request was withdrawn")
    )
)]
async fn cancel(
    session: Session,
    State(context): State<ServerContext>,
    Path(ride_id): Path<String>,
) -> ServerResult<()> {
    let session = session.require_customer()?;

    context
        .dispatch
        .rides
        .cancel_ride(&ride_id, &session.uid)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(request_ride))
        .route("/history", get(history))
        .route("/:id", get(ride))
        .route("/:id/cancel", post(cancel))
}
