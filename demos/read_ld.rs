// Example usage of the LD reader

use motec_ld::{read_ld_file, Result};
use tracing::{debug, info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/session.ld".to_string());

    // Decode the whole file
    let file = read_ld_file(&path)?;

    info!("Header:\n{}", file.header);
    if let Some(vehicle) = file
        .header
        .event
        .as_ref()
        .and_then(|e| e.venue.as_ref())
        .and_then(|v| v.vehicle.as_ref())
    {
        info!("Vehicle: {} ({}, {} kg)", vehicle.id, vehicle.vehicle_type, vehicle.weight);
    }

    // List all channels
    info!("Available channels:");
    for chan in &file.channels {
        info!("  {}", chan);
        if let (Some(first), Some(last)) = (chan.samples.first(), chan.samples.last()) {
            debug!("      first={}, last={}", first, last);
        }
    }

    // Look up a channel by name and apply its display scaling
    if let Some(chan) = file.channel("Engine RPM") {
        let scaled = chan.scaled_samples();
        info!("Engine RPM: {} samples, peak {:?}", scaled.len(), scaled.iter().cloned().reduce(f64::max));
    }

    // Dump the layout as JSON
    match serde_json::to_string_pretty(&file.header) {
        Ok(json) => debug!("header json:\n{}", json),
        Err(e) => debug!("json serialize error: {}", e),
    }

    let log = file.to_data_log(&path);
    info!("Rebuilt log: {} channels, {:.1}s", log.channel_count(), log.duration());

    Ok(())
}
