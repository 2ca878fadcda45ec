//! # stockroom-dialog
//!
//! Conversation state machine for Stockroom.
//!
//! Maps an operator's sequence of selections and text inputs to
//! inventory-engine calls. One session per operator (a [`Stage`] held
//! in the [`SessionRegistry`]), created on first contact and reset
//! whenever a flow completes or is cancelled. The transport is
//! external: events come in as tagged [`Event`] values, renders go
//! out as transport-agnostic [`Reply`] values.
//!
//! ```ignore
//! let dialog = Dialog::new(engine, AccessPolicy::new(vec![42]), resolver);
//! let reply = dialog.handle(42, Event::Start).await;
//! for choice in &reply.choices {
//!     // choice.select.token() is what the transport echoes back
//! }
//! ```

pub mod dialog;
pub mod event;
pub mod reply;
pub mod resolver;
pub mod session;

// ── re-exports ───────────────────────────────────────────────────────

pub use dialog::{AccessPolicy, Dialog};
pub use event::{AdminAction, Event, MenuAction, Select};
pub use reply::{Choice, Reply};
pub use resolver::{CodeResolver, ResolveError};
pub use session::{FormatOrigin, Intent, SessionRegistry, Stage};
