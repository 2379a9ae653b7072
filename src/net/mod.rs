//! Core network model.
//!
//! The triad with the real design decisions lives here:
//! - `protocol`: the upper-layer capability interface and dispatch contract
//! - `node`: protocol stack ownership and the bridge to the link layer
//! - `wsn`: batch deployment onto a shared medium with randomized geometry
//!
//! `point` supplies the coordinate value type, and `ping_pong` is the
//! stock concrete protocol.

pub mod node;
pub mod ping_pong;
pub mod point;
pub mod protocol;
pub mod wsn;

pub use node::{Node, SendRequest};
pub use ping_pong::PingPong;
pub use point::{Point, Point2, Point3, Vector2, Vector3};
pub use protocol::{Protocol, TxOutcome};
pub use wsn::{PositionAllocator, RandomRectangleAllocator, Wsn};
