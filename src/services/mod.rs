pub mod ai;
pub mod availability;
pub mod booking_link;
pub mod calendar;
pub mod conversation;
pub mod directory;
pub mod extraction;
pub mod messaging;
pub mod reminders;
pub mod router;
pub mod stages;
