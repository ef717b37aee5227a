//! Booking commit and cancellation. Both run in a single immediate transaction so patient-id
//! allocation and schedule capacity cannot race with another writer.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, TransactionBehavior};

use super::queries::{self, TIME_FORMAT};
use crate::errors::BookingError;
use crate::models::{Appointment, AppointmentStatus, NewPatient, PatientType, Slot};
use crate::services::directory::next_patient_id;

/// Everything needed to write one confirmed appointment.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub confirmation_id: String,
    /// Known directory id for returning patients; new patients get one allocated.
    pub existing_patient_id: Option<String>,
    pub patient: NewPatient,
    pub patient_name: String,
    /// As collected in conversation, `MM/DD/YYYY`.
    pub date_of_birth: String,
    pub phone: String,
    pub email: String,
    pub slot: Slot,
    pub patient_type: PatientType,
    pub insurance_carrier: String,
    pub member_id: String,
    pub group_number: String,
    pub booked_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub appointment: Appointment,
    pub schedule_id: i64,
    pub new_patient: bool,
}

/// `CONF-YYYYMMDDHHMMSS-XXXX`, the suffix taken from a random uuid.
pub fn confirmation_id(now: NaiveDateTime) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect();
    format!("CONF-{}-{}", now.format("%Y%m%d%H%M%S"), suffix.to_uppercase())
}

/// Rejects a slot that overlaps a confirmed appointment with the same doctor.
fn ensure_unbooked(conn: &Connection, slot: &Slot) -> Result<(), BookingError> {
    let overlapping: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE status = 'confirmed' AND doctor = ?1 COLLATE NOCASE AND appointment_date = ?2
           AND time(appointment_time) < time(?4)
           AND time(?3) < time(appointment_time, '+' || duration_minutes || ' minutes')",
        params![
            slot.doctor,
            slot.date.format(queries::DATE_FORMAT).to_string(),
            slot.time.format(TIME_FORMAT).to_string(),
            slot.ends_at().time().format(TIME_FORMAT).to_string(),
        ],
        |row| row.get(0),
    )?;
    if overlapping > 0 {
        return Err(BookingError::CapacityExhausted);
    }
    Ok(())
}

/// Reserves one unit of capacity on the first schedule row that covers the slot.
fn reserve_capacity(conn: &Connection, slot: &Slot) -> Result<i64, BookingError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM schedule
         WHERE doctor_name = ?1 COLLATE NOCASE AND location = ?2 COLLATE NOCASE
           AND date = ?3 AND start_time <= ?4 AND end_time >= ?5
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(
        params![
            slot.doctor,
            slot.location,
            slot.date.format(queries::DATE_FORMAT).to_string(),
            slot.time.format(TIME_FORMAT).to_string(),
            slot.ends_at().time().format(TIME_FORMAT).to_string(),
        ],
        |row| row.get::<_, i64>(0),
    )?;
    let mut covering = vec![];
    for row in rows {
        covering.push(row?);
    }

    if covering.is_empty() {
        return Err(BookingError::NoScheduleWindow);
    }

    for id in covering {
        let reserved = conn.execute(
            "UPDATE schedule SET booked_slots = booked_slots + 1
             WHERE id = ?1 AND booked_slots < available_slots",
            params![id],
        )?;
        if reserved == 1 {
            return Ok(id);
        }
    }
    Err(BookingError::CapacityExhausted)
}

/// Writes the appointment, reserves capacity and inserts or updates the patient row.
/// Nothing is written unless every step succeeds.
pub fn commit_booking(
    conn: &mut Connection,
    request: &BookingRequest,
) -> Result<BookingReceipt, BookingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    ensure_unbooked(&tx, &request.slot)?;
    let schedule_id = reserve_capacity(&tx, &request.slot)?;

    let (patient_id, new_patient) = match &request.existing_patient_id {
        Some(id) => {
            queries::update_last_visit(&tx, id, request.slot.date)?;
            (id.clone(), false)
        }
        None => {
            let ids = queries::list_patient_ids(&tx)?;
            let id = next_patient_id(ids.iter().map(String::as_str));
            queries::insert_patient(&tx, &request.patient.clone().with_id(id.clone()))?;
            (id, true)
        }
    };

    let appointment = Appointment {
        confirmation_id: request.confirmation_id.clone(),
        patient_name: request.patient_name.clone(),
        patient_id,
        date_of_birth: request.date_of_birth.clone(),
        phone: request.phone.clone(),
        email: request.email.clone(),
        doctor: request.slot.doctor.clone(),
        location: request.slot.location.clone(),
        appointment_date: request.slot.date,
        appointment_time: request.slot.time,
        duration_minutes: request.slot.duration_minutes,
        patient_type: request.patient_type.as_str().to_string(),
        insurance_carrier: request.insurance_carrier.clone(),
        member_id: request.member_id.clone(),
        group_number: request.group_number.clone(),
        booked_at: request.booked_at,
        status: AppointmentStatus::Confirmed,
    };
    queries::insert_appointment(&tx, &appointment, Some(schedule_id))?;

    tx.commit()?;

    tracing::info!(
        confirmation_id = %appointment.confirmation_id,
        patient_id = %appointment.patient_id,
        schedule_id,
        new_patient,
        "booking committed"
    );

    Ok(BookingReceipt {
        appointment,
        schedule_id,
        new_patient,
    })
}

/// Cancels a confirmed appointment, gives its capacity back to the schedule row and stops
/// any reminders that have not gone out yet. Returns false when there was nothing to cancel.
pub fn cancel_appointment(conn: &mut Connection, confirmation_id: &str) -> anyhow::Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let cancelled = tx.execute(
        "UPDATE appointments SET status = 'cancelled'
         WHERE confirmation_id = ?1 AND status = 'confirmed'",
        params![confirmation_id],
    )?;
    if cancelled == 0 {
        return Ok(false);
    }

    tx.execute(
        "UPDATE schedule SET booked_slots = booked_slots - 1
         WHERE id = (SELECT schedule_id FROM appointments WHERE confirmation_id = ?1)
           AND booked_slots > 0",
        params![confirmation_id],
    )?;
    tx.execute(
        "UPDATE reminders SET status = 'cancelled'
         WHERE confirmation_id = ?1 AND status = 'scheduled'",
        params![confirmation_id],
    )?;

    tx.commit()?;
    tracing::info!(confirmation_id, "appointment cancelled");
    Ok(true)
}
