use chrono::Duration;

use crate::models::Appointment;

/// Text values in iCalendar escape backslashes, separators and newlines.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

pub fn generate_ics(appt: &Appointment, clinic_name: &str) -> String {
    let start = appt.starts_at();
    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (start + Duration::minutes(i64::from(appt.duration_minutes)))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = appt.booked_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@medbook", appt.confirmation_id);

    let summary = escape(&format!("{} appointment with {}", clinic_name, appt.doctor));
    let location = escape(&appt.location);
    let description = escape(&format!(
        "Confirmation {}. Please arrive 15 minutes early and bring a photo ID and your insurance card.",
        appt.confirmation_id
    ));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Medbook//Patient Scheduling//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         LOCATION:{location}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::NaiveDateTime;

    fn appointment(at: &str, duration_minutes: u32) -> Appointment {
        let start = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap();
        Appointment {
            confirmation_id: "CONF-20250310100000-AB12".to_string(),
            patient_name: "Alice Brown".to_string(),
            patient_id: "P007".to_string(),
            date_of_birth: "02/03/1980".to_string(),
            phone: "555-111-2222".to_string(),
            email: "alice@example.com".to_string(),
            doctor: "Dr. Martinez".to_string(),
            location: "West Side Clinic".to_string(),
            appointment_date: start.date(),
            appointment_time: start.time(),
            duration_minutes,
            patient_type: "new".to_string(),
            insurance_carrier: "Cigna".to_string(),
            member_id: "CIG12345678".to_string(),
            group_number: "GRP200".to_string(),
            booked_at: NaiveDateTime::parse_from_str("2025-03-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            status: AppointmentStatus::Confirmed,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&appointment("2025-03-15 14:00:00", 60), "Medical Clinic");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T150000"));
        assert!(ics.contains("DTSTAMP:20250310T100000"));
        assert!(ics.contains("SUMMARY:Medical Clinic appointment with Dr. Martinez"));
        assert!(ics.contains("LOCATION:West Side Clinic"));
        assert!(ics.contains("UID:CONF-20250310100000-AB12@medbook"));
        assert!(ics.contains("END:VCALENDAR"));
    }

    #[test]
    fn test_follow_up_length_and_escaping() {
        let ics = generate_ics(&appointment("2025-04-01 09:30:00", 30), "Smith, Jones; Partners");
        assert!(ics.contains("DTEND:20250401T100000"));
        assert!(ics.contains("SUMMARY:Smith\\, Jones\\; Partners appointment"));
    }
}
