use crate::model::{CalendarEvent, Details, Reservation, ResourceType, Status};

/// Who is looking at the calendar. Personal data is filtered here and
/// nowhere downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    /// Unauthenticated: slot occupancy only, placeholder titles.
    Public,
    /// A signed-in resident: full detail on their own records.
    Resident(String),
    /// Staff: full detail on everything.
    Admin,
}

/// The active set plus completed appear on the grid. Cancelled and rejected
/// freed their slot and stay off it.
fn shows_on_calendar(status: Status) -> bool {
    status.is_active() || status == Status::Completed
}

/// CSS hook per status. Exhaustive so a new status cannot silently fall
/// through to a default style.
pub(crate) fn color_class(status: Status) -> &'static str {
    match status {
        Status::Pending => "slot-pending",
        Status::Approved => "slot-approved",
        Status::Booked => "slot-booked",
        Status::NeedsApproval => "slot-needs-approval",
        Status::Completed => "slot-completed",
        Status::Cancelled => "slot-cancelled",
        Status::Rejected => "slot-rejected",
    }
}

fn title_for(record: &Reservation, viewer: &Viewer) -> String {
    let entitled = match viewer {
        Viewer::Admin => true,
        Viewer::Resident(id) => *id == record.requested_by.id,
        Viewer::Public => false,
    };
    if entitled {
        match &record.details {
            Details::Court { purpose, .. } => {
                format!("{purpose} ({})", record.requested_by.name)
            }
            Details::Ambulance { patient_name, destination, .. } => {
                format!("Transport to {destination} ({patient_name})")
            }
        }
    } else {
        match record.resource_type {
            ResourceType::Court => "Reserved".to_string(),
            ResourceType::Ambulance => "Ambulance engaged".to_string(),
        }
    }
}

/// Project records to renderable calendar entries. Lazy and restartable:
/// one pass per call, no state kept between calls.
pub fn project<'a, I>(records: I, viewer: &'a Viewer) -> impl Iterator<Item = CalendarEvent> + 'a
where
    I: Iterator<Item = &'a Reservation> + 'a,
{
    records
        .filter(|r| shows_on_calendar(r.status))
        .map(move |r| CalendarEvent {
            id: r.id,
            title: title_for(r, viewer),
            start: r.window.start_instant(),
            end: r.window.end_instant(),
            color_class: color_class(r.status),
        })
}
