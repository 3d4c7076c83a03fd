use anyhow::Context;

use crate::models::{Booking, BookingStatus};

const ICS_TIME: &str = "%Y%m%dT%H%M%SZ";

/// Renders a single-event calendar for a booking.
pub fn generate_ics(
    booking: &Booking,
    service_title: &str,
    professional_name: &str,
) -> anyhow::Result<String> {
    let dtstart = booking.scheduled_at.format(ICS_TIME);
    let dtend = booking
        .ends_at()
        .with_context(|| format!("booking {} ends out of range", booking.id))?
        .format(ICS_TIME);
    let dtstamp = booking.updated_at.format(ICS_TIME);
    let uid = format!("{}@marketplace", booking.id);

    let summary = escape_text(&format!("{service_title} with {professional_name}"));
    let description = escape_text(booking.notes.as_deref().unwrap_or("No additional notes"));
    let status = match booking.status {
        BookingStatus::Cancelled => "CANCELLED",
        BookingStatus::Pending => "TENTATIVE",
        _ => "CONFIRMED",
    };

    Ok(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Marketplace//Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    ))
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
