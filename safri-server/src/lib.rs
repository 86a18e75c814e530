mod auth;
mod context;
mod docs;
mod driver;
mod errors;
mod owner;
mod rides;
mod schemas;
mod serialized;
mod sse;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use log::info;
use safri_dispatch::LiveDispatch;
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;

use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9360;

pub type Router = axum::Router<ServerContext>;

/// Starts the Safri 360 server on top of a dispatch instance.
pub async fn run_server(dispatch: Arc<LiveDispatch>) {
    let port = env::var("SAFRI_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext {
        dispatch,
        sse: ServerSentEvents::new(),
    };

    tokio::spawn(forward_events(context.clone()));

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/rides", rides::router())
        .nest("/owner", owner::router())
        .nest("/driver", driver::router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}

/// Pumps dispatch events into the SSE fan-out for as long as the
/// dispatch side lives.
async fn forward_events(context: ServerContext) {
    loop {
        let dispatch = context.dispatch.clone();

        let event = spawn_blocking(move || dispatch.wait_for_event())
            .await
            .expect("event loop task joins");

        match event {
            Some(event) => context.sse.broadcast(event.into()),
            None => break,
        }
    }
}
