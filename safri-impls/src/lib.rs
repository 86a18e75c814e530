mod faulty_store;
mod memory_store;

pub use faulty_store::*;
pub use memory_store::*;
