//! CSV seeding of the patient directory and schedule, and the directory export.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use rusqlite::Connection;

use super::queries::{self, Table};
use crate::models::{PatientDirectoryEntry, ScheduleRow};

/// Imports patient rows from CSV. Returns the number of rows written.
pub fn import_patients<R: Read>(conn: &Connection, reader: R) -> anyhow::Result<usize> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut imported = 0;
    for (index, result) in csv_reader.deserialize::<PatientDirectoryEntry>().enumerate() {
        let patient = match result {
            Ok(patient) => patient,
            Err(e) => {
                tracing::warn!(row = index + 1, error = %e, "skipping unreadable patient row");
                continue;
            }
        };
        queries::insert_patient(conn, &patient)
            .with_context(|| format!("failed to import patient {}", patient.patient_id))?;
        imported += 1;
    }
    Ok(imported)
}

/// Imports schedule rows from CSV. Rows with unparseable dates or times are skipped.
pub fn import_schedule<R: Read>(conn: &Connection, reader: R) -> anyhow::Result<usize> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut imported = 0;
    for (index, result) in csv_reader.deserialize::<ScheduleRow>().enumerate() {
        let entry = match result.map_err(anyhow::Error::from).and_then(ScheduleRow::into_entry) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(row = index + 1, error = %e, "skipping unreadable schedule row");
                continue;
            }
        };
        queries::insert_schedule_entry(conn, &entry)?;
        imported += 1;
    }
    Ok(imported)
}

/// Seeds an empty table from a CSV file. Missing files and non-empty tables are left alone.
fn seed_table(
    conn: &Connection,
    table: Table,
    path: &str,
    import: fn(&Connection, std::fs::File) -> anyhow::Result<usize>,
) -> anyhow::Result<usize> {
    if path.is_empty() || !Path::new(path).exists() {
        return Ok(0);
    }
    if queries::count_rows(conn, table)? > 0 {
        tracing::debug!(path, ?table, "table already populated, skipping seed");
        return Ok(0);
    }
    let file = std::fs::File::open(path).with_context(|| format!("failed to open {path}"))?;
    let imported = import(conn, file)?;
    tracing::info!(path, ?table, imported, "seeded table from CSV");
    Ok(imported)
}

pub fn seed_patients(conn: &Connection, path: &str) -> anyhow::Result<usize> {
    seed_table(conn, Table::Patients, path, import_patients)
}

pub fn seed_schedule(conn: &Connection, path: &str) -> anyhow::Result<usize> {
    seed_table(conn, Table::Schedule, path, import_schedule)
}

/// Writes the patient directory as CSV with the spreadsheet's column names.
pub fn export_patients<W: Write>(conn: &Connection, writer: W) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for patient in queries::list_patients(conn)? {
        csv_writer.serialize(&patient)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    const PATIENTS: &str = "\
patient_id,first_name,last_name,date_of_birth,phone_number,email,preferred_doctor,location,last_visit_date
P001,Jane,Smith,1985-04-12,555-111-2222,jane@example.com,Dr. Lee,Uptown Center,2024-11-02
P002,Omar,Haddad,1972-09-30,555-333-4444,omar@example.com,Dr. Johnson,Downtown Clinic,
";

    const SCHEDULE: &str = "\
doctor_name,location,date,start_time,end_time,available_slots,booked_slots
Dr. Lee,Uptown Center,2025-03-10,09:00,12:00,6,1
Dr. Lee,Uptown Center,03/11/2025,09:00,12:00,6,0
Dr. Johnson,Downtown Clinic,2025-03-10,13:00,17:00,8,0
";

    #[test]
    fn test_import_patients() {
        let conn = init_db(":memory:").unwrap();
        assert_eq!(import_patients(&conn, PATIENTS.as_bytes()).unwrap(), 2);
        let patients = queries::list_patients(&conn).unwrap();
        assert_eq!(patients[1].last_visit_date, "");
        assert_eq!(patients[0].full_name(), "Jane Smith");
    }

    #[test]
    fn test_import_schedule_skips_bad_rows() {
        let conn = init_db(":memory:").unwrap();
        assert_eq!(import_schedule(&conn, SCHEDULE.as_bytes()).unwrap(), 2);
        let rows = queries::list_schedule(&conn).unwrap();
        assert_eq!(rows[0].remaining(), 5);
        assert_eq!(rows[1].doctor_name, "Dr. Johnson");
    }

    #[test]
    fn test_seed_only_fills_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.csv");
        std::fs::write(&path, SCHEDULE).unwrap();
        let path = path.to_str().unwrap();

        let conn = init_db(":memory:").unwrap();
        assert_eq!(seed_schedule(&conn, path).unwrap(), 2);
        assert_eq!(seed_schedule(&conn, path).unwrap(), 0);
        assert_eq!(seed_patients(&conn, "does/not/exist.csv").unwrap(), 0);
    }

    #[test]
    fn test_export_round_trips_columns() {
        let conn = init_db(":memory:").unwrap();
        import_patients(&conn, PATIENTS.as_bytes()).unwrap();

        let mut out = Vec::new();
        export_patients(&conn, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("patient_id,first_name,last_name,date_of_birth,phone_number,email,preferred_doctor,location,last_visit_date")
        );
        assert!(lines.next().unwrap().starts_with("P001,Jane,Smith,1985-04-12"));
    }
}
