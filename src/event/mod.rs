//! Event classification and fan-out for decoded MIDI messages.
//!
//! Every decoded message reaches the `message` channel; channel-voice
//! messages additionally reach their category channel (note messages reach
//! both `note` and the finer `note_on` / `note_off`). The [`EventBus`]
//! holds at most one handler per channel and delivers synchronously on the
//! dispatching thread.

use crossbeam_channel as channel;
use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Mutex,
};

use crate::msg::{Message, MessageType};

mod error;
pub use error::{HandlerError, SubscriptionError};

/// Named channel a subscriber can listen on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EventChannel {
    /// Universal channel, fired for every decoded message.
    Message,
    /// Both Note On and Note Off.
    Note,
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PitchBend,
}

impl EventChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Note => "note",
            Self::NoteOn => "note_on",
            Self::NoteOff => "note_off",
            Self::ControlChange => "control_change",
            Self::ProgramChange => "program_change",
            Self::PitchBend => "pitch_bend",
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channels a message of the given type is delivered to.
///
/// Pure function; `EventChannel::Message` always comes first.
pub fn classify(message_type: MessageType) -> &'static [EventChannel] {
    match message_type {
        MessageType::NoteOn => &[
            EventChannel::Message,
            EventChannel::Note,
            EventChannel::NoteOn,
        ],
        MessageType::NoteOff => &[
            EventChannel::Message,
            EventChannel::Note,
            EventChannel::NoteOff,
        ],
        MessageType::ControlChange => &[EventChannel::Message, EventChannel::ControlChange],
        MessageType::ProgramChange => &[EventChannel::Message, EventChannel::ProgramChange],
        MessageType::PitchBend => &[EventChannel::Message, EventChannel::PitchBend],
        MessageType::Raw => &[EventChannel::Message],
    }
}

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Box<dyn FnMut(&Message, f64) -> HandlerResult + Send>;

/// Fan-out point between the receive path and user handlers.
///
/// At most one handler per [`EventChannel`]; subscribing to an occupied
/// channel is an error, replace requires an explicit [`EventBus::unsubscribe`].
///
/// [`EventBus::dispatch`] holds the handler map lock while it runs, so it
/// always sees a consistent handler set and [`EventBus::clear`] is atomic
/// with respect to an in-flight dispatch. Handlers must not call
/// `subscribe` / `unsubscribe` from within a dispatch.
pub struct EventBus {
    handlers: Mutex<BTreeMap<EventChannel, Handler>>,
    err_tx: Option<channel::Sender<HandlerError>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(BTreeMap::new()),
            err_tx: None,
        }
    }

    /// A bus which forwards [`HandlerError`]s to `err_tx` instead of the log.
    pub fn with_error_sender(err_tx: channel::Sender<HandlerError>) -> Self {
        Self {
            handlers: Mutex::new(BTreeMap::new()),
            err_tx: Some(err_tx),
        }
    }

    /// Registers `handler` for `channel`.
    ///
    /// Strict policy: fails with [`SubscriptionError::AlreadySubscribed`]
    /// if the channel already has a handler.
    pub fn subscribe<F>(&self, chan: EventChannel, handler: F) -> Result<(), SubscriptionError>
    where
        F: FnMut(&Message, f64) -> HandlerResult + Send + 'static,
    {
        let mut handlers = self.handlers.lock().unwrap();
        match handlers.entry(chan) {
            Entry::Occupied(_) => Err(SubscriptionError::AlreadySubscribed(chan)),
            Entry::Vacant(entry) => {
                entry.insert(Box::new(handler));
                Ok(())
            }
        }
    }

    /// Removes the handler for `channel`. No-op if none is registered.
    pub fn unsubscribe(&self, chan: EventChannel) {
        self.handlers.lock().unwrap().remove(&chan);
    }

    /// Removes all handlers. Called on port close so stale handlers cannot
    /// fire after the session ends.
    pub fn clear(&self) {
        self.handlers.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().unwrap().is_empty()
    }

    /// Delivers `message` to every subscribed handler of its channels.
    ///
    /// Synchronous: returns once all applicable handlers have run. Each
    /// invocation is isolated; a handler returning an error or panicking is
    /// reported as a [`HandlerError`] and never aborts delivery to the
    /// remaining channels.
    pub fn dispatch(&self, message: &Message, delta_time: f64) {
        let mut handlers = self.handlers.lock().unwrap();

        for &chan in classify(message.message_type()) {
            let Some(handler) = handlers.get_mut(&chan) else {
                continue;
            };

            match panic::catch_unwind(AssertUnwindSafe(|| handler(message, delta_time))) {
                Ok(Ok(())) => (),
                Ok(Err(source)) => self.report(HandlerError::Failed {
                    channel: chan,
                    source,
                }),
                Err(_) => self.report(HandlerError::Panicked { channel: chan }),
            }
        }
    }

    fn report(&self, err: HandlerError) {
        match self.err_tx {
            Some(ref err_tx) => {
                if let Err(send_err) = err_tx.send(err) {
                    log::error!("Handler error sink gone: {}", send_err.into_inner());
                }
            }
            None => log::error!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{decode, Message};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn note_on() -> Message {
        decode(&[0x90, 0x3c, 0x7f]).unwrap()
    }

    fn counter_handler(
        count: &Arc<AtomicUsize>,
    ) -> impl FnMut(&Message, f64) -> HandlerResult + Send + 'static {
        let count = count.clone();
        move |_msg, _delta| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn classify_always_includes_message() {
        for message_type in [
            MessageType::NoteOn,
            MessageType::NoteOff,
            MessageType::ControlChange,
            MessageType::ProgramChange,
            MessageType::PitchBend,
            MessageType::Raw,
        ] {
            assert_eq!(classify(message_type)[0], EventChannel::Message);
        }
    }

    #[test]
    fn classify_note_types() {
        assert!(classify(MessageType::NoteOn).contains(&EventChannel::Note));
        assert!(classify(MessageType::NoteOff).contains(&EventChannel::Note));
        assert!(classify(MessageType::NoteOn).contains(&EventChannel::NoteOn));
        assert!(classify(MessageType::NoteOff).contains(&EventChannel::NoteOff));
        assert_eq!(classify(MessageType::Raw), &[EventChannel::Message]);
    }

    #[test]
    fn dispatch_reaches_only_applicable_channels() {
        let bus = EventBus::new();
        let note_count = Arc::new(AtomicUsize::new(0));
        let cc_count = Arc::new(AtomicUsize::new(0));
        let msg_count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventChannel::Note, counter_handler(&note_count))
            .unwrap();
        bus.subscribe(EventChannel::ControlChange, counter_handler(&cc_count))
            .unwrap();
        bus.subscribe(EventChannel::Message, counter_handler(&msg_count))
            .unwrap();

        bus.dispatch(&note_on(), 0.0);

        assert_eq!(note_count.load(Ordering::SeqCst), 1);
        assert_eq!(msg_count.load(Ordering::SeqCst), 1);
        assert_eq!(cc_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispatch_passes_delta_time() {
        let bus = EventBus::new();
        let (tx, rx) = crossbeam_channel::unbounded();

        bus.subscribe(EventChannel::Message, move |msg, delta| {
            tx.send((msg.clone(), delta)).unwrap();
            Ok(())
        })
        .unwrap();

        bus.dispatch(&note_on(), 0.25);

        let (msg, delta) = rx.try_recv().unwrap();
        assert_eq!(msg, note_on());
        assert_eq!(delta, 0.25);
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let bus = EventBus::new();
        bus.subscribe(EventChannel::Note, |_msg, _delta| Ok(()))
            .unwrap();

        assert_eq!(
            bus.subscribe(EventChannel::Note, |_msg, _delta| Ok(())),
            Err(SubscriptionError::AlreadySubscribed(EventChannel::Note))
        );

        // An explicit unsubscribe frees the channel again.
        bus.unsubscribe(EventChannel::Note);
        assert!(bus.subscribe(EventChannel::Note, |_msg, _delta| Ok(())).is_ok());
    }

    #[test]
    fn unsubscribed_handler_never_fires() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventChannel::Note, counter_handler(&count))
            .unwrap();
        bus.unsubscribe(EventChannel::Note);
        bus.dispatch(&note_on(), 0.0);

        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Idempotent on a vacant channel.
        bus.unsubscribe(EventChannel::Note);
        bus.unsubscribe(EventChannel::PitchBend);
    }

    #[test]
    fn clear_removes_all_handlers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventChannel::Message, counter_handler(&count))
            .unwrap();
        bus.subscribe(EventChannel::Note, counter_handler(&count))
            .unwrap();
        assert!(!bus.is_empty());

        bus.clear();
        assert!(bus.is_empty());

        bus.dispatch(&note_on(), 0.0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_handler_does_not_abort_dispatch() {
        let (err_tx, err_rx) = crossbeam_channel::unbounded();
        let bus = EventBus::with_error_sender(err_tx);
        let note_count = Arc::new(AtomicUsize::new(0));

        // `message` is dispatched before `note`.
        bus.subscribe(EventChannel::Message, |_msg, _delta| {
            Err("boom".into())
        })
        .unwrap();
        bus.subscribe(EventChannel::Note, counter_handler(&note_count))
            .unwrap();

        bus.dispatch(&note_on(), 0.0);

        assert_eq!(note_count.load(Ordering::SeqCst), 1);
        let err = err_rx.try_recv().unwrap();
        assert_eq!(err.channel(), EventChannel::Message);
        assert!(matches!(err, HandlerError::Failed { .. }));
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let (err_tx, err_rx) = crossbeam_channel::unbounded();
        let bus = EventBus::with_error_sender(err_tx);
        let note_count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventChannel::Message, |_msg, _delta| {
            panic!("handler gone wrong")
        })
        .unwrap();
        bus.subscribe(EventChannel::Note, counter_handler(&note_count))
            .unwrap();

        bus.dispatch(&note_on(), 0.0);

        assert_eq!(note_count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err_rx.try_recv().unwrap(),
            HandlerError::Panicked {
                channel: EventChannel::Message,
            }
        ));
    }

    #[test]
    fn clear_is_safe_against_concurrent_dispatch() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventChannel::Message, counter_handler(&count))
            .unwrap();

        let dispatcher = {
            let bus = bus.clone();
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    bus.dispatch(&note_on(), 0.0);
                }
            })
        };

        bus.clear();
        dispatcher.join().unwrap();

        // Whatever ran before the clear was counted; nothing fires anymore.
        let settled = count.load(Ordering::SeqCst);
        bus.dispatch(&note_on(), 0.0);
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }
}
