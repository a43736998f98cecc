//! Domain models for the care-facility records.

mod medication;
mod observation;
mod order;
mod resident;
pub(crate) mod timestamp;

pub use medication::*;
pub use observation::*;
pub use order::*;
pub use resident::*;
