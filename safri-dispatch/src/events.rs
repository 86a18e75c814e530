use crossbeam::channel::{Receiver, Sender};

use crate::{RideData, Role, TripPhase};

pub type EventSender = Sender<DispatchEvent>;
pub type EventReceiver = Receiver<DispatchEvent>;

/// Events emitted by the dispatch system, consumed by the server's
/// event stream.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A rider published a new ride request
    RideRequested { ride: RideData },
    /// A rider withdrew a ride request before it was assigned
    RideCancelled { ride_id: String },
    /// An owner's candidate list changed
    CandidatesChanged {
        owner_uid: String,
        rides: Vec<RideData>,
    },
    /// The assignment workflow committed a driver to a ride
    RideAssigned {
        ride_id: String,
        owner_uid: String,
        driver_pin: String,
    },
    /// A driver's trip moved through its lifecycle
    TripPhaseChanged {
        driver_pin: String,
        phase: TripPhase,
        /// The ride the phase belongs to, absent once the trip resets
        ride_id: Option<String>,
    },
    /// An actor toggled their online flag
    PresenceChanged {
        uid: String,
        role: Role,
        online: bool,
    },
    /// An SMS left the gateway
    SmsDispatched { phone_number: String },
}
