use std::sync::Arc;

use midi_bus::{EventBus, EventChannel, InputPort, Message};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .init();

    let bus = Arc::new(EventBus::new());

    bus.subscribe(EventChannel::Message, |msg, delta_time| {
        println!("+{delta_time:.3}s {msg:?}");
        Ok(())
    })?;

    bus.subscribe(EventChannel::Note, |msg, _delta_time| {
        if let Message::NoteOn {
            channel,
            note,
            velocity,
        } = msg
        {
            println!("note {note} on channel {channel}, velocity {velocity}");
        }
        Ok(())
    })?;

    let mut input = InputPort::try_new("midi-bus monitor".into(), bus)?;
    input.ignore(midir::Ignore::ActiveSense);
    input.refresh()?;

    let ports: Vec<_> = input.list().collect();
    if ports.is_empty() {
        eprintln!("No MIDI input port available");
        return Ok(());
    }

    for (idx, name) in ports.iter().enumerate() {
        println!("{idx}: {name}");
    }

    input.connect(ports[0].clone())?;
    println!("Monitoring {}. Press Enter to quit.", ports[0]);

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    input.disconnect();

    Ok(())
}
