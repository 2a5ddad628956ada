//! Order domain types: sides, kinds, time-in-force policies, lifecycle
//! status, and the [`Order`] record itself.

mod base;
mod kind;
mod side;
mod status;
mod time_in_force;

pub use base::{Order, OrderId};
pub use kind::OrderKind;
pub use side::Side;
pub use status::OrderStatus;
pub use time_in_force::TimeInForce;
