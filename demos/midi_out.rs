use std::{thread, time::Duration};

use midi_bus::{Channel, Message, OutputPort};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut output = OutputPort::try_new("midi-bus sender".into())?;
    output.refresh()?;

    let first_port = output.list().next();
    let Some(port_name) = first_port else {
        eprintln!("No MIDI output port available");
        return Ok(());
    };

    output.connect(port_name.clone())?;
    println!("Sending middle C to {port_name}");

    let channel = Channel::try_new(1)?;
    output.send(&Message::note_on(channel, 0x3c, 0x7f)?)?;
    thread::sleep(Duration::from_millis(500));
    output.send(&Message::note_off(channel, 0x3c, 0x2f)?)?;

    output.disconnect();

    Ok(())
}
