use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Reservation, ScheduleEvent};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for schedule watchers, one channel per equipment.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<ScheduleEvent>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to one equipment's events. Creates the channel if needed.
    pub fn subscribe(&self, equipment: &str) -> broadcast::Receiver<ScheduleEvent> {
        let sender = self
            .channels
            .entry(equipment.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish on the event's equipment channel. No-op if nobody is listening.
    pub fn send(&self, event: &ScheduleEvent) {
        if let Some(sender) = self.channels.get(event.equipment()) {
            let _ = sender.send(event.clone());
        }
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort team notification: a `mailto:` compose link for a successful
/// booking. Whether anything is actually sent is up to the booker's mail
/// client — there is no delivery tracking and no retry.
pub fn mailto_link(reservation: &Reservation, recipients: &[String]) -> String {
    let subject = format!("Lab booking: {}", reservation.equipment);
    let body = format!(
        "Hi team, I booked {} on {} from {} to {}.",
        reservation.equipment,
        reservation.window.date,
        reservation.window.start.format("%H:%M"),
        reservation.window.end.format("%H:%M"),
    );
    format!(
        "mailto:{}?subject={}&body={}",
        recipients.join(","),
        percent_encode(&subject),
        percent_encode(&body)
    )
}

/// Percent-encode a `mailto:` query value. Keeps the RFC 3986 unreserved
/// set, escapes everything else byte-wise.
fn percent_encode(input: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
