//! Typed MIDI channel-voice codec and per-category event dispatch.
//!
//! Raw bytes from a `midir` input port are decoded into [`Message`]s,
//! classified and fanned out to per-channel handlers on an [`EventBus`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use midi_bus::{EventBus, EventChannel, InputPort};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Arc::new(EventBus::new());
//! bus.subscribe(EventChannel::Note, |msg, delta_time| {
//!     println!("+{delta_time:.3}s {msg:?}");
//!     Ok(())
//! })?;
//!
//! let mut input = InputPort::try_new("my client".into(), bus)?;
//! input.refresh()?;
//!
//! let first_port = input.list().next();
//! if let Some(port_name) = first_port {
//!     input.connect(port_name)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod bytes;

pub mod event;
pub use event::{classify, EventBus, EventChannel};

pub mod msg;
pub use msg::{decode, Channel, Message, MessageType};

pub mod port;
pub use port::{InputPort, OutputPort};
