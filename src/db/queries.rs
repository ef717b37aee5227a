use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentStatus, Conversation, ConversationRecord, FormTracking,
    PatientDirectoryEntry, Reminder, ReminderKind, ReminderStatus, ScheduleEntry, Slot,
};
use crate::models::schedule::parse_clock;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid timestamp {s:?}: {e}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| anyhow::anyhow!("invalid date {s:?}: {e}"))
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<anyhow::Result<T>>>,
) -> anyhow::Result<Vec<T>> {
    let mut out = vec![];
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

// ── Conversations ──

/// The live conversation for a session. Expired sessions read as absent.
pub fn get_conversation(
    conn: &Connection,
    session_key: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Option<Conversation>> {
    let now = now.format(TIMESTAMP_FORMAT).to_string();
    let row = conn
        .query_row(
            "SELECT session_key, record, last_activity, expires_at FROM conversations
             WHERE session_key = ?1 AND expires_at > ?2",
            params![session_key, now],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((session_key, record_json, last_activity, expires_at)) = row else {
        return Ok(None);
    };

    let record: ConversationRecord = match serde_json::from_str(&record_json) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(session = %session_key, error = %e, "unreadable conversation record, starting over");
            ConversationRecord::new()
        }
    };

    Ok(Some(Conversation {
        session_key,
        record,
        last_activity: parse_timestamp(&last_activity)?,
        expires_at: parse_timestamp(&expires_at)?,
    }))
}

pub fn save_conversation(conn: &Connection, conv: &Conversation) -> anyhow::Result<()> {
    let record_json = serde_json::to_string(&conv.record)?;
    let last_activity = conv.last_activity.format(TIMESTAMP_FORMAT).to_string();
    let expires_at = conv.expires_at.format(TIMESTAMP_FORMAT).to_string();

    conn.execute(
        "INSERT INTO conversations (session_key, stage, record, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(session_key) DO UPDATE SET
           stage = excluded.stage,
           record = excluded.record,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![
            conv.session_key,
            conv.record.conversation_stage.as_str(),
            record_json,
            last_activity,
            expires_at
        ],
    )?;
    Ok(())
}

pub fn delete_conversation(conn: &Connection, session_key: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM conversations WHERE session_key = ?1",
        params![session_key],
    )?;
    Ok(count > 0)
}

pub fn expire_old_conversations(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
    let now = now.format(TIMESTAMP_FORMAT).to_string();
    let count = conn.execute("DELETE FROM conversations WHERE expires_at <= ?1", params![now])?;
    Ok(count)
}

// ── Patients ──

pub fn list_patients(conn: &Connection) -> anyhow::Result<Vec<PatientDirectoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT patient_id, first_name, last_name, date_of_birth, phone_number, email,
                preferred_doctor, location, last_visit_date
         FROM patients ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PatientDirectoryEntry {
            patient_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            date_of_birth: row.get(3)?,
            phone_number: row.get(4)?,
            email: row.get(5)?,
            preferred_doctor: row.get(6)?,
            location: row.get(7)?,
            last_visit_date: row.get(8)?,
        })
    })?;

    let mut patients = vec![];
    for row in rows {
        patients.push(row?);
    }
    Ok(patients)
}

pub fn list_patient_ids(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT patient_id FROM patients")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn insert_patient(conn: &Connection, patient: &PatientDirectoryEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, phone_number,
                               email, preferred_doctor, location, last_visit_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            patient.patient_id,
            patient.first_name,
            patient.last_name,
            patient.date_of_birth,
            patient.phone_number,
            patient.email,
            patient.preferred_doctor,
            patient.location,
            patient.last_visit_date,
        ],
    )?;
    Ok(())
}

pub fn update_last_visit(
    conn: &Connection,
    patient_id: &str,
    visit_date: NaiveDate,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE patients SET last_visit_date = ?1 WHERE patient_id = ?2",
        params![visit_date.format(DATE_FORMAT).to_string(), patient_id],
    )?;
    Ok(count > 0)
}

pub fn count_rows(conn: &Connection, table: Table) -> anyhow::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

/// Tables that can be counted by name.
#[derive(Debug, Clone, Copy)]
pub enum Table {
    Patients,
    Schedule,
    Appointments,
    Reminders,
}

impl Table {
    fn name(&self) -> &'static str {
        match self {
            Table::Patients => "patients",
            Table::Schedule => "schedule",
            Table::Appointments => "appointments",
            Table::Reminders => "reminders",
        }
    }
}

// ── Schedule ──

pub fn list_schedule(conn: &Connection) -> anyhow::Result<Vec<ScheduleEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_name, location, date, start_time, end_time, available_slots, booked_slots
         FROM schedule ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_schedule_row(row)))?;
    collect(rows)
}

pub fn insert_schedule_entry(conn: &Connection, entry: &ScheduleEntry) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO schedule (doctor_name, location, date, start_time, end_time, available_slots, booked_slots)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.doctor_name,
            entry.location,
            entry.date.format(DATE_FORMAT).to_string(),
            entry.start_time.format(TIME_FORMAT).to_string(),
            entry.end_time.format(TIME_FORMAT).to_string(),
            entry.available_slots,
            entry.booked_slots,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_schedule_row(row: &rusqlite::Row) -> anyhow::Result<ScheduleEntry> {
    let date: String = row.get(3)?;
    let start_time: String = row.get(4)?;
    let end_time: String = row.get(5)?;

    Ok(ScheduleEntry {
        id: row.get(0)?,
        doctor_name: row.get(1)?,
        location: row.get(2)?,
        date: parse_date(&date)?,
        start_time: parse_clock(&start_time)?,
        end_time: parse_clock(&end_time)?,
        available_slots: row.get(6)?,
        booked_slots: row.get(7)?,
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "confirmation_id, patient_name, patient_id, date_of_birth, phone, email, \
     doctor, location, appointment_date, appointment_time, duration_minutes, patient_type, \
     insurance_carrier, member_id, group_number, booked_at, status";

pub fn insert_appointment(
    conn: &Connection,
    appointment: &Appointment,
    schedule_id: Option<i64>,
) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS}, schedule_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        params![
            appointment.confirmation_id,
            appointment.patient_name,
            appointment.patient_id,
            appointment.date_of_birth,
            appointment.phone,
            appointment.email,
            appointment.doctor,
            appointment.location,
            appointment.appointment_date.format(DATE_FORMAT).to_string(),
            appointment.appointment_time.format(TIME_FORMAT).to_string(),
            appointment.duration_minutes,
            appointment.patient_type,
            appointment.insurance_carrier,
            appointment.member_id,
            appointment.group_number,
            appointment.booked_at.format(TIMESTAMP_FORMAT).to_string(),
            appointment.status.as_str(),
            schedule_id,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(
    conn: &Connection,
    confirmation_id: &str,
) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE confirmation_id = ?1"),
        params![confirmation_id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE status = ?1 \
                 ORDER BY appointment_date ASC, appointment_time ASC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 ORDER BY appointment_date ASC, appointment_time ASC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;
    collect(rows)
}

/// Time taken by confirmed appointments on or after `from`.
pub fn confirmed_slots(conn: &Connection, from: NaiveDate) -> anyhow::Result<Vec<Slot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE status = 'confirmed' AND appointment_date >= ?1
         ORDER BY appointment_date ASC, appointment_time ASC"
    ))?;
    let rows = stmt.query_map(params![from.format(DATE_FORMAT).to_string()], |row| {
        Ok(parse_appointment_row(row).map(|appt| appt.slot()))
    })?;
    collect(rows)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let appointment_date: String = row.get(8)?;
    let appointment_time: String = row.get(9)?;
    let booked_at: String = row.get(15)?;
    let status: String = row.get(16)?;

    Ok(Appointment {
        confirmation_id: row.get(0)?,
        patient_name: row.get(1)?,
        patient_id: row.get(2)?,
        date_of_birth: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        doctor: row.get(6)?,
        location: row.get(7)?,
        appointment_date: parse_date(&appointment_date)?,
        appointment_time: parse_clock(&appointment_time)?,
        duration_minutes: row.get(10)?,
        patient_type: row.get(11)?,
        insurance_carrier: row.get(12)?,
        member_id: row.get(13)?,
        group_number: row.get(14)?,
        booked_at: parse_timestamp(&booked_at)?,
        status: AppointmentStatus::parse(&status),
    })
}

// ── Form tracking ──

pub fn insert_form_tracking(conn: &Connection, tracking: &FormTracking) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO form_tracking (patient_id, patient_name, email, appointment_date, appointment_time,
                                    sent_at, forms_completed, forms_returned, reminder_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tracking.patient_id,
            tracking.patient_name,
            tracking.email,
            tracking.appointment_date.format(DATE_FORMAT).to_string(),
            tracking.appointment_time.format(TIME_FORMAT).to_string(),
            tracking.sent_at.format(TIMESTAMP_FORMAT).to_string(),
            tracking.forms_completed,
            tracking.forms_returned,
            tracking.reminder_count,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_form_tracking(conn: &Connection, patient_id: &str) -> anyhow::Result<Vec<FormTracking>> {
    let mut stmt = conn.prepare(
        "SELECT patient_id, patient_name, email, appointment_date, appointment_time, sent_at,
                forms_completed, forms_returned, reminder_count
         FROM form_tracking WHERE patient_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![patient_id], |row| Ok(parse_form_tracking_row(row)))?;
    collect(rows)
}

fn parse_form_tracking_row(row: &rusqlite::Row) -> anyhow::Result<FormTracking> {
    let appointment_date: String = row.get(3)?;
    let appointment_time: String = row.get(4)?;
    let sent_at: String = row.get(5)?;

    Ok(FormTracking {
        patient_id: row.get(0)?,
        patient_name: row.get(1)?,
        email: row.get(2)?,
        appointment_date: parse_date(&appointment_date)?,
        appointment_time: parse_clock(&appointment_time)?,
        sent_at: parse_timestamp(&sent_at)?,
        forms_completed: row.get(6)?,
        forms_returned: row.get(7)?,
        reminder_count: row.get(8)?,
    })
}

// ── Reminders ──

const REMINDER_COLUMNS: &str = "reminder_id, confirmation_id, patient_id, patient_name, email, phone, \
     appointment_date, appointment_time, doctor, location, reminder_number, reminder_date, \
     reminder_time, reminder_type, message_template, status, sms_sent, email_sent, \
     response_received, created_at";

pub fn insert_reminders(conn: &Connection, reminders: &[Reminder]) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO reminders ({REMINDER_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
    ))?;
    for r in reminders {
        stmt.execute(params![
            r.reminder_id,
            r.confirmation_id,
            r.patient_id,
            r.patient_name,
            r.email,
            r.phone,
            r.appointment_date.format(DATE_FORMAT).to_string(),
            r.appointment_time.format(TIME_FORMAT).to_string(),
            r.doctor,
            r.location,
            r.reminder_number,
            r.reminder_date.format(DATE_FORMAT).to_string(),
            r.reminder_time.format(TIME_FORMAT).to_string(),
            r.reminder_type.as_str(),
            r.message_template,
            r.status.as_str(),
            r.sms_sent,
            r.email_sent,
            r.response_received,
            r.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }
    Ok(())
}

pub fn list_reminders(conn: &Connection) -> anyhow::Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         ORDER BY reminder_date ASC, reminder_time ASC, reminder_id ASC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_reminder_row(row)))?;
    collect(rows)
}

/// Scheduled reminders whose due time is at or before `now`, oldest first.
pub fn due_reminders(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         WHERE status = 'scheduled' AND (reminder_date || ' ' || reminder_time) <= ?1
         ORDER BY reminder_date ASC, reminder_time ASC, reminder_id ASC"
    ))?;
    let now = now.format("%Y-%m-%d %H:%M").to_string();
    let rows = stmt.query_map(params![now], |row| Ok(parse_reminder_row(row)))?;
    collect(rows)
}

pub fn record_reminder_delivery(
    conn: &Connection,
    reminder_id: &str,
    sms_sent: bool,
    email_sent: bool,
    status: ReminderStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE reminders SET sms_sent = ?1, email_sent = ?2, status = ?3
         WHERE reminder_id = ?4 AND status = 'scheduled'",
        params![sms_sent, email_sent, status.as_str(), reminder_id],
    )?;
    Ok(count > 0)
}

fn parse_reminder_row(row: &rusqlite::Row) -> anyhow::Result<Reminder> {
    let appointment_date: String = row.get(6)?;
    let appointment_time: String = row.get(7)?;
    let reminder_date: String = row.get(11)?;
    let reminder_time: String = row.get(12)?;
    let reminder_type: String = row.get(13)?;
    let status: String = row.get(15)?;
    let created_at: String = row.get(19)?;

    Ok(Reminder {
        reminder_id: row.get(0)?,
        confirmation_id: row.get(1)?,
        patient_id: row.get(2)?,
        patient_name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        appointment_date: parse_date(&appointment_date)?,
        appointment_time: parse_clock(&appointment_time)?,
        doctor: row.get(8)?,
        location: row.get(9)?,
        reminder_number: row.get(10)?,
        reminder_date: parse_date(&reminder_date)?,
        reminder_time: parse_clock(&reminder_time)?,
        reminder_type: ReminderKind::parse(&reminder_type),
        message_template: row.get(14)?,
        status: ReminderStatus::parse(&status),
        sms_sent: row.get(16)?,
        email_sent: row.get(17)?,
        response_received: row.get(18)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::Stage;
    use chrono::{Duration, NaiveTime};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn conversation(key: &str, expires_at: &str) -> Conversation {
        let mut record = ConversationRecord::new();
        record.patient_name = Some("Jane Smith".to_string());
        record.conversation_stage = Stage::Lookup;
        Conversation {
            session_key: key.to_string(),
            record,
            last_activity: ts("2025-03-01 09:00:00"),
            expires_at: ts(expires_at),
        }
    }

    #[test]
    fn test_conversation_round_trip_and_expiry() {
        let conn = init_db(":memory:").unwrap();
        save_conversation(&conn, &conversation("s1", "2025-03-01 10:00:00")).unwrap();

        let live = get_conversation(&conn, "s1", ts("2025-03-01 09:30:00")).unwrap().unwrap();
        assert_eq!(live.record.patient_name.as_deref(), Some("Jane Smith"));
        assert_eq!(live.record.conversation_stage, Stage::Lookup);

        assert!(get_conversation(&conn, "s1", ts("2025-03-01 10:00:00")).unwrap().is_none());
        assert_eq!(expire_old_conversations(&conn, ts("2025-03-01 10:00:01")).unwrap(), 1);
    }

    #[test]
    fn test_save_conversation_upserts() {
        let conn = init_db(":memory:").unwrap();
        let mut conv = conversation("s1", "2025-03-01 10:00:00");
        save_conversation(&conn, &conv).unwrap();
        conv.record.email = Some("jane@example.com".to_string());
        conv.expires_at += Duration::minutes(30);
        save_conversation(&conn, &conv).unwrap();

        let loaded = get_conversation(&conn, "s1", ts("2025-03-01 10:15:00")).unwrap().unwrap();
        assert_eq!(loaded.record.email.as_deref(), Some("jane@example.com"));
        assert!(delete_conversation(&conn, "s1").unwrap());
        assert!(!delete_conversation(&conn, "s1").unwrap());
    }

    #[test]
    fn test_schedule_round_trip() {
        let conn = init_db(":memory:").unwrap();
        let entry = ScheduleEntry {
            id: 0,
            doctor_name: "Dr. Lee".to_string(),
            location: "Uptown Center".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            available_slots: 4,
            booked_slots: 1,
        };
        let id = insert_schedule_entry(&conn, &entry).unwrap();
        let rows = list_schedule(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].remaining(), 3);
        assert_eq!(count_rows(&conn, Table::Schedule).unwrap(), 1);
    }

    #[test]
    fn test_patients_keep_insertion_order() {
        let conn = init_db(":memory:").unwrap();
        for (id, first) in [("P002", "Bea"), ("P001", "Al")] {
            insert_patient(
                &conn,
                &PatientDirectoryEntry {
                    patient_id: id.to_string(),
                    first_name: first.to_string(),
                    last_name: "Stone".to_string(),
                    date_of_birth: "1980-01-01".to_string(),
                    phone_number: String::new(),
                    email: String::new(),
                    preferred_doctor: String::new(),
                    location: String::new(),
                    last_visit_date: String::new(),
                },
            )
            .unwrap();
        }
        let patients = list_patients(&conn).unwrap();
        assert_eq!(patients[0].patient_id, "P002");
        assert_eq!(list_patient_ids(&conn).unwrap().len(), 2);
        assert!(update_last_visit(&conn, "P001", NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()).unwrap());
        assert_eq!(list_patients(&conn).unwrap()[1].last_visit_date, "2025-03-10");
    }
}
