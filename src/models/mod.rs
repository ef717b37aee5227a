pub mod appointment;
pub mod conversation;
pub mod patient;
pub mod reminder;
pub mod schedule;

pub use appointment::{Appointment, AppointmentStatus, FormTracking};
pub use conversation::{
    Conversation, ConversationMessage, ConversationRecord, Field, PatientType, Stage,
};
pub use patient::{NewPatient, PatientDirectoryEntry};
pub use reminder::{Reminder, ReminderKind, ReminderPlan, ReminderStatus};
pub use schedule::{ScheduleEntry, ScheduleRow, Slot};
