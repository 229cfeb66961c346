//! Core systems for Lattice Grid.
//!
//! This crate provides the plumbing shared by the collection view engine:
//!
//! - **Signal/Slot System**: Type-safe change notification ([`Signal`])
//! - **Scope Guards**: Non-reentrant regions and suppression flags
//!   ([`CallGuard`], [`SuppressFlag`])
//! - **Logging**: `tracing` targets and performance spans ([`logging`])
//!
//! # Signal/Slot Example
//!
//! ```
//! use lattice_grid_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```

mod error;
pub mod guard;
pub mod logging;
pub mod signal;

pub use error::GuardError;
pub use guard::{CallGuard, CallScope, SuppressFlag, SuppressScope};
pub use logging::PerfSpan;
pub use signal::{ConnectionId, Signal};
