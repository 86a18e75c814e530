mod events;
mod path;
mod snapshot;
mod store;
mod subscription;
mod util;

pub use events::*;
pub use path::*;
pub use snapshot::*;
pub use store::*;
pub use subscription::*;
pub use util::*;
