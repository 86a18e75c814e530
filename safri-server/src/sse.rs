use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};
use utoipa::ToSchema;

use safri_dispatch::DispatchEvent;
use safri_store::Id;

use crate::{
    context::ServerContext,
    serialized::{role_str, trip_phase_str, Ride, ToSerialized},
    Router,
};

type ConnectionId = Id<Connection>;

/// The dispatch events as they appear on the wire.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A rider published a new ride request
    RideRequested { ride: Ride },
    /// A rider withdrew a ride request
    RideCancelled { ride_id: String },
    /// An owner's candidate list changed
    CandidatesChanged {
        owner_uid: String,
        rides: Vec<Ride>,
    },
    /// A driver was committed to a ride
    RideAssigned {
        ride_id: String,
        owner_uid: String,
        driver_pin: String,
    },
    /// A driver's trip moved through its lifecycle
    TripPhaseChanged {
        driver_pin: String,
        phase: String,
        ride_id: Option<String>,
    },
    /// An actor toggled their online flag
    PresenceChanged {
        uid: String,
        role: String,
        online: bool,
    },
    /// An SMS left the gateway
    SmsDispatched { phone_number: String },
}

impl From<DispatchEvent> for ServerEvent {
    fn from(value: DispatchEvent) -> Self {
        match value {
            DispatchEvent::RideRequested { ride } => Self::RideRequested {
                ride: ride.to_serialized(),
            },
            DispatchEvent::RideCancelled { ride_id } => Self::RideCancelled { ride_id },
            DispatchEvent::CandidatesChanged { owner_uid, rides } => Self::CandidatesChanged {
                owner_uid,
                rides: rides.to_serialized(),
            },
            DispatchEvent::RideAssigned {
                ride_id,
                owner_uid,
                driver_pin,
            } => Self::RideAssigned {
                ride_id,
                owner_uid,
                driver_pin,
            },
            DispatchEvent::TripPhaseChanged {
                driver_pin,
                phase,
                ride_id,
            } => Self::TripPhaseChanged {
                driver_pin,
                phase: trip_phase_str(phase).to_string(),
                ride_id,
            },
            DispatchEvent::PresenceChanged { uid, role, online } => Self::PresenceChanged {
                uid,
                role: role_str(role).to_string(),
                online,
            },
            DispatchEvent::SmsDispatched { phone_number } => Self::SmsDispatched { phone_number },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            connection.send(event.clone())
        }
    }

    fn connect(&self) -> ConnectionHandle {
        let connection = Connection::new();
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        let next_event = pending_messages
            .pop()
            .map(|m| serde_json::to_string(&m).expect("serializes properly"));

        if let Some(event) = next_event {
            return Poll::Ready(Some(Ok(Event::default().data(event))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from the dispatch system",
            body = ServerEvent
        )
    )
)]
async fn event_stream(State(context): State<ServerContext>) -> Sse<ConnectionHandle> {
    Sse::new(context.sse.connect()).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}
