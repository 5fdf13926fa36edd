//! Best-effort notification fan-out.
//!
//! The Lifecycle Controller emits a [`NotificationEvent`] after each committed transition and the
//! [`NotificationDispatcher`] fans it out to every registered [`NotificationChannel`]. Delivery is
//! strictly best-effort: a failing channel is logged and skipped, and never affects the lifecycle
//! operation that produced the event.

mod channels;
mod dispatcher;
mod event;

pub use channels::{InAppChannel, LogChannel};
pub use dispatcher::{ChannelError, ChannelFuture, NotificationChannel, NotificationDispatcher};
pub use event::{Audience, NotificationEvent};
