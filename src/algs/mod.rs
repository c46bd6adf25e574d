//! Communication backends and the collectives built on them.

pub mod communicator;
pub mod exchange;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, PhaseTags, ThreadComm, Wait};
pub use exchange::{agree_on_success, allgather_varcount, exchange_payloads};
