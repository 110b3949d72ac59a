//! `midir`-backed device sessions.
//!
//! Two non-inheriting capability types: [`InputPort`] owns the receive side
//! and feeds every delivered packet through decode → classify → dispatch on
//! the shared [`EventBus`]; [`OutputPort`] owns the send side. Port names
//! are the user-facing handle, enumeration skips the client's own ports.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    bytes,
    event::EventBus,
    msg::{self, Message},
};

mod error;
pub use error::Error;

/// Converts `midir`'s absolute microsecond timestamps into seconds elapsed
/// since the previously received packet. First packet: 0.0.
#[derive(Debug, Default)]
struct DeltaClock(Option<u64>);

impl DeltaClock {
    fn delta_secs(&mut self, timestamp: u64) -> f64 {
        let delta = self.0.map_or(0, |prev| timestamp.saturating_sub(prev));
        self.0 = Some(timestamp);

        delta as f64 / 1_000_000.0
    }
}

struct ReceiveState {
    bus: Arc<EventBus>,
    clock: DeltaClock,
}

/// Receive path, invoked on the driver's delivery thread.
fn on_raw_message(timestamp: u64, buf: &[u8], state: &mut ReceiveState) {
    let delta_time = state.clock.delta_secs(timestamp);

    match msg::decode(buf) {
        Ok(message) => state.bus.dispatch(&message, delta_time),
        // One malformed packet must not terminate the receive path.
        Err(err) => log::warn!(
            "Dropping MIDI message {}: {err}",
            bytes::Displayable::from(buf)
        ),
    }
}

fn refresh_ports<IO: midir::MidiIO>(
    io: &IO,
    client_name: &str,
    cur: &mut Option<Arc<str>>,
    map: &mut BTreeMap<Arc<str>, IO::Port>,
) -> Result<(), Error> {
    map.clear();

    let mut prev = cur.take();
    for port in io.ports().iter() {
        let name = io.port_name(port)?;
        if name.starts_with(client_name) {
            // One of our own ports.
            continue;
        }

        if let Some(ref prev_name) = prev {
            if prev_name.as_ref() == name {
                *cur = prev.take();
            }
        }

        map.insert(name.into(), port.clone());
    }

    Ok(())
}

enum InputConn {
    Connected(midir::MidiInputConnection<ReceiveState>),
    Disconnected(midir::MidiInput),
    None,
}

impl Default for InputConn {
    fn default() -> Self {
        Self::None
    }
}

/// Input-capable session: enumerates ports, connects by name and routes
/// received messages to the [`EventBus`].
pub struct InputPort {
    map: BTreeMap<Arc<str>, midir::MidiInputPort>,
    cur: Option<Arc<str>>,
    conn: InputConn,
    bus: Arc<EventBus>,
    client_name: Arc<str>,
}

impl InputPort {
    pub fn try_new(client_name: Arc<str>, bus: Arc<EventBus>) -> Result<Self, Error> {
        let midi_in = midir::MidiInput::new(&client_name)?;

        Ok(Self {
            map: BTreeMap::new(),
            cur: None,
            conn: InputConn::Disconnected(midi_in),
            bus,
            client_name,
        })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Names of the available input ports, in order.
    pub fn list(&self) -> impl Iterator<Item = Arc<str>> + '_ {
        self.map.keys().cloned()
    }

    /// Name of the currently connected port, if any.
    pub fn cur(&self) -> Option<Arc<str>> {
        self.cur.clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.conn, InputConn::Connected(_))
    }

    /// Filters out sysex, timing or active-sense traffic at the driver
    /// level. Takes effect on the next connection.
    pub fn ignore(&mut self, filter: midir::Ignore) {
        if let InputConn::Disconnected(ref mut midi_in) = self.conn {
            midi_in.ignore(filter);
        }
    }

    /// Rescans the available input ports, keeping the current selection
    /// when its port is still present.
    pub fn refresh(&mut self) -> Result<(), Error> {
        let temp_conn = midir::MidiInput::new(&format!("{} refresh In ports", self.client_name))?;
        refresh_ports(&temp_conn, &self.client_name, &mut self.cur, &mut self.map)
    }

    /// Connects to the port named `port_name` and starts delivering
    /// decoded messages to the bus.
    pub fn connect(&mut self, port_name: Arc<str>) -> Result<(), Error> {
        let port = self
            .map
            .get(&port_name)
            .ok_or_else(|| Error::PortNotFound(port_name.clone()))?
            .clone();

        self.disconnect();

        let midi_in = match std::mem::take(&mut self.conn) {
            InputConn::Disconnected(midi_in) => midi_in,
            _ => unreachable!(),
        };

        let state = ReceiveState {
            bus: self.bus.clone(),
            clock: DeltaClock::default(),
        };

        match midi_in.connect(&port, &self.client_name, on_raw_message, state) {
            Ok(conn) => {
                self.conn = InputConn::Connected(conn);
            }
            Err(err) => {
                self.conn = InputConn::Disconnected(err.into_inner());
                let err = Error::Connection(port_name);
                log::error!("{err}");
                return Err(err);
            }
        }

        log::info!("Connected for Input to {port_name}");
        self.cur = Some(port_name);

        Ok(())
    }

    /// Clears the bus, then closes the native connection: no handler can
    /// fire once the session has ended.
    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }

        self.bus.clear();

        match std::mem::take(&mut self.conn) {
            InputConn::Connected(conn) => {
                let (midi_in, _state) = conn.close();
                self.conn = InputConn::Disconnected(midi_in);
            }
            _ => unreachable!(),
        }

        if let Some(cur) = self.cur.take() {
            log::debug!("Disconnected Input from {cur}");
        }
    }
}

impl Drop for InputPort {
    fn drop(&mut self) {
        self.disconnect();
    }
}

enum OutputConn {
    Connected(midir::MidiOutputConnection),
    Disconnected(midir::MidiOutput),
    None,
}

impl Default for OutputConn {
    fn default() -> Self {
        Self::None
    }
}

/// Output-capable session: enumerates ports, connects by name and sends
/// encoded messages.
pub struct OutputPort {
    map: BTreeMap<Arc<str>, midir::MidiOutputPort>,
    cur: Option<Arc<str>>,
    conn: OutputConn,
    client_name: Arc<str>,
}

impl OutputPort {
    pub fn try_new(client_name: Arc<str>) -> Result<Self, Error> {
        let midi_out = midir::MidiOutput::new(&client_name)?;

        Ok(Self {
            map: BTreeMap::new(),
            cur: None,
            conn: OutputConn::Disconnected(midi_out),
            client_name,
        })
    }

    /// Names of the available output ports, in order.
    pub fn list(&self) -> impl Iterator<Item = Arc<str>> + '_ {
        self.map.keys().cloned()
    }

    /// Name of the currently connected port, if any.
    pub fn cur(&self) -> Option<Arc<str>> {
        self.cur.clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.conn, OutputConn::Connected(_))
    }

    /// Rescans the available output ports, keeping the current selection
    /// when its port is still present.
    pub fn refresh(&mut self) -> Result<(), Error> {
        let temp_conn = midir::MidiOutput::new(&format!("{} refresh Out ports", self.client_name))?;
        refresh_ports(&temp_conn, &self.client_name, &mut self.cur, &mut self.map)
    }

    pub fn connect(&mut self, port_name: Arc<str>) -> Result<(), Error> {
        let port = self
            .map
            .get(&port_name)
            .ok_or_else(|| Error::PortNotFound(port_name.clone()))?
            .clone();

        self.disconnect();

        let midi_out = match std::mem::take(&mut self.conn) {
            OutputConn::Disconnected(midi_out) => midi_out,
            _ => unreachable!(),
        };

        match midi_out.connect(&port, &self.client_name) {
            Ok(conn) => {
                self.conn = OutputConn::Connected(conn);
            }
            Err(err) => {
                self.conn = OutputConn::Disconnected(err.into_inner());
                let err = Error::Connection(port_name);
                log::error!("{err}");
                return Err(err);
            }
        }

        log::info!("Connected for Output to {port_name}");
        self.cur = Some(port_name);

        Ok(())
    }

    /// Encodes `message` and sends it out the connected port.
    pub fn send(&mut self, message: &Message) -> Result<(), Error> {
        self.send_raw(&message.to_bytes())
    }

    pub fn send_raw(&mut self, buf: &[u8]) -> Result<(), Error> {
        match self.conn {
            OutputConn::Connected(ref mut conn) => {
                conn.send(buf).map_err(|err| {
                    log::error!(
                        "Failed to send MIDI message {}: {err}",
                        bytes::Displayable::from(buf)
                    );
                    err
                })?;

                Ok(())
            }
            _ => {
                log::warn!("Attempt to send a message, but MIDI Out is not connected");
                Err(Error::NotConnected)
            }
        }
    }

    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }

        match std::mem::take(&mut self.conn) {
            OutputConn::Connected(conn) => {
                let midi_out = conn.close();
                self.conn = OutputConn::Disconnected(midi_out);
            }
            _ => unreachable!(),
        }

        if let Some(cur) = self.cur.take() {
            log::debug!("Disconnected Output from {cur}");
        }
    }
}
