//! The store layout, inherited from the backing service's historical
//! schema. Everything else in the crate goes through these builders so
//! the spelling lives in one place.

use safri_store::StorePath;

use crate::Role;

pub fn rides() -> StorePath {
    StorePath::parse("Rides")
}

pub fn ride(ride_id: &str) -> StorePath {
    rides().child(ride_id)
}

pub fn drivers() -> StorePath {
    StorePath::parse("Drivers")
}

pub fn driver(pin: &str) -> StorePath {
    drivers().child(pin)
}

pub fn rent_a_car(owner_uid: &str) -> StorePath {
    StorePath::parse("Rent A Car").child(owner_uid)
}

pub fn owner_cars(owner_uid: &str) -> StorePath {
    rent_a_car(owner_uid).child("Cars")
}

pub fn owner_car(owner_uid: &str, registration: &str) -> StorePath {
    owner_cars(owner_uid).child(registration)
}

pub fn owner_drivers(owner_uid: &str) -> StorePath {
    rent_a_car(owner_uid).child("Drivers")
}

pub fn owner_driver(owner_uid: &str, pin: &str) -> StorePath {
    owner_drivers(owner_uid).child(pin)
}

pub fn users() -> StorePath {
    StorePath::parse("Users")
}

pub fn freight_riders() -> StorePath {
    StorePath::parse("Freight Riders")
}

/// The collection an account of the given role lives in.
///
/// Owner profiles share their subtree with their `Cars` and `Drivers`
/// collections; profile decoding ignores those children.
pub fn accounts(role: Role) -> StorePath {
    match role {
        Role::Rider => users(),
        Role::RentACarOwner => StorePath::parse("Rent A Car"),
        Role::FreightRider => freight_riders(),
        Role::Driver => drivers(),
    }
}

pub fn account(role: Role, uid: &str) -> StorePath {
    accounts(role).child(uid)
}

pub fn sessions() -> StorePath {
    StorePath::parse("Sessions")
}

pub fn session(token: &str) -> StorePath {
    sessions().child(token)
}
