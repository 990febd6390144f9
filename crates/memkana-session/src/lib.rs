//! Player session management for memkana.
//!
//! This crate holds everything the server remembers about a game while
//! it is being played:
//!
//! 1. **Identity**: anonymous guest names and opaque ids ([`identity`])
//! 2. **Session state**: one game per connection ([`Session`])
//! 3. **Registry**: all open connections' sessions ([`SessionRegistry`])
//! 4. **Timers**: server-side stopwatches ([`TimerBook`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)   ← drives sessions from decoded messages
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides Pair, PlayerName
//! ```

mod error;
pub mod identity;
mod registry;
mod session;
mod timer;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Completion, DurationAnomaly, Session, SessionState};
pub use timer::{DEFAULT_MAX_TIMER_AGE, TimerBook, TimerStart};
