//! Pipeline-native entities (spec §3): Payer, MRF Descriptor, Organization,
//! Provider, Rate, and the Quality Flags attached to each Rate.

mod mrf_descriptor;
mod organization;
mod payer;
mod provider;
mod quality;
mod rate;

pub use mrf_descriptor::*;
pub use organization::*;
pub use payer::*;
pub use provider::*;
pub use quality::*;
pub use rate::*;
