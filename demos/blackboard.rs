//! Demonstrates the global sheet as a blackboard shared by loosely coupled
//! components.
//!
//! A sensor publishes readings, a monitor reacts to them through observers,
//! and a report reads whatever is on the board at the end. None of them hold
//! a reference to each other.
//!
//! Run with: cargo run --example blackboard

use sovran_sheet::{global, GlobalConfig, SheetError};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default, PartialEq)]
struct Reading {
    celsius: f32,
}

#[derive(Clone, Debug, Default)]
struct Alerts {
    messages: Vec<String>,
}

fn main() -> Result<(), SheetError> {
    global::configure(GlobalConfig::default())?;

    let _monitor = Monitor::attach(30.0)?;
    let history = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&history);
    global::on_keyed_write(move |room: &String, reading: &Reading| {
        if let Ok(mut history) = sink.lock() {
            history.push(format!("{}: {:.1}C", room, reading.celsius));
        }
    })?
    .detach();

    sensor("kitchen", &[21.0, 24.5, 31.2])?;
    sensor("garage", &[12.0, 11.5])?;

    report()?;

    println!("\nHistory:");
    if let Ok(history) = history.lock() {
        for entry in history.iter() {
            println!("  {}", entry);
        }
    }

    global::reset();

    // After reset the board is gone until configured again
    match global::read_value::<Alerts>() {
        Err(e) => println!("\nAfter reset: {}", e),
        Ok(_) => println!("\nAfter reset: still configured?"),
    }
    Ok(())
}

fn sensor(room: &str, samples: &[f32]) -> Result<(), SheetError> {
    for &celsius in samples {
        global::write_keyed_value(room.to_string(), Reading { celsius })?;
    }
    Ok(())
}

fn report() -> Result<(), SheetError> {
    println!("Latest readings:");
    for room in ["kitchen", "garage", "attic"] {
        let reading = global::read_keyed_value::<String, Reading>(&room.to_string())?;
        if global::has_keyed_value::<String, Reading>(&room.to_string())? {
            println!("  {}: {:.1}C", room, reading.celsius);
        } else {
            println!("  {}: no data", room);
        }
    }

    let alerts = global::read_value::<Alerts>()?;
    println!("Alerts ({}):", alerts.messages.len());
    for message in &alerts.messages {
        println!("  {}", message);
    }
    Ok(())
}

/// Raises an alert whenever any room goes over the threshold.
struct Monitor {
    _subscription: sovran_sheet::Subscription,
}

impl Monitor {
    fn attach(threshold: f32) -> Result<Self, SheetError> {
        let subscription = global::on_keyed_write(move |room: &String, reading: &Reading| {
            if reading.celsius > threshold {
                let message = format!("{} is at {:.1}C", room, reading.celsius);
                // Observers may write back to the board
                if let Ok(values) = global::values() {
                    values.update(|alerts: &mut Alerts| alerts.messages.push(message));
                }
            }
        })?;
        Ok(Self {
            _subscription: subscription,
        })
    }
}
