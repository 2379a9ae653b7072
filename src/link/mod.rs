//! Simulated low-power wireless link layer.
//!
//! This is the engine side of the system: devices with PHY/MAC state, a
//! shared medium with pluggable propagation models, and the data-service
//! primitives the node layer consumes. The engine reports completions and
//! arrivals through the narrow `DataHandler` interface; it never knows the
//! concrete node type behind it.
//!
//! ## Module organization
//!
//! - `address`: short addresses, PAN ids, resolution rules
//! - `mac`: MAC state, request/confirm/indication primitives, frames
//! - `phy`: PHY state and radio timing constants
//! - `medium`: the shared medium, delivery and acknowledgement logic
//! - `device`: the device object binding all of the above together
//! - `propagation`: loss and delay models attached to the medium

pub mod address;
pub mod device;
pub mod mac;
pub mod medium;
pub mod phy;
pub mod propagation;

pub use address::{AddressConfig, AddressParseError, PanConfig, PanId, ShortAddress};
pub use device::Device;
pub use mac::{AddressMode, DataConfirm, DataHandler, DataRequest, MacStatus, Packet};
pub use medium::Medium;
