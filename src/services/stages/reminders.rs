use super::format::{clock, long_date};
use super::{apology, Turn};
use crate::db::queries::{self, DATE_FORMAT};
use crate::models::{Appointment, ConversationRecord, ReminderPlan};
use crate::services::reminders::{plan_reminders, reminder_rows};

/// Stores the three reminders for the confirmed appointment. They go out later from the
/// background dispatcher.
pub fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let Some(confirmation_id) = record.confirmation_id.clone() else {
        return "I need to confirm your appointment before setting up reminders.".to_string();
    };

    let scheduled = turn.state.conn().and_then(|conn| {
        let appointment = queries::get_appointment(&conn, &confirmation_id)?
            .ok_or_else(|| anyhow::anyhow!("appointment {confirmation_id} not found"))?;
        let plans = plan_reminders(
            &appointment.appointment_date.format(DATE_FORMAT).to_string(),
            turn.now.date(),
        );
        let rows = reminder_rows(&appointment, &plans, turn.now);

        let tx = conn.unchecked_transaction()?;
        queries::insert_reminders(&tx, &rows)?;
        tx.commit()?;
        Ok((appointment, plans))
    });

    let (appointment, plans) = match scheduled {
        Ok(scheduled) => scheduled,
        Err(e) => {
            tracing::error!(error = %e, %confirmation_id, "failed to schedule reminders");
            return apology(turn, "setting up your reminders");
        }
    };

    tracing::info!(%confirmation_id, count = plans.len(), "reminders scheduled");
    record.reminders_scheduled = true;
    activated_reply(record, &appointment, &plans)
}

fn activated_reply(record: &ConversationRecord, appt: &Appointment, plans: &[ReminderPlan]) -> String {
    let schedule = plans
        .iter()
        .map(|plan| {
            format!(
                "{}. {} at {}: {}",
                plan.number,
                long_date(plan.date),
                clock(plan.time),
                plan.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let patient_type = record
        .patient_type
        .map(|t| t.visit_label())
        .unwrap_or("Appointment");

    format!(
        "REMINDER SYSTEM ACTIVATED\n\n\
         I've set up 3 automated reminders by email and SMS:\n\n\
         {schedule}\n\n\
         Email reminders: {}\n\
         SMS reminders: {}\n\n\
         APPOINTMENT BOOKING COMPLETE!\n\n\
         SUMMARY:\n\
         Patient: {} ({patient_type})\n\
         Appointment: {} at {}\n\
         Provider: {} at {}\n\
         Duration: {} minutes\n\
         Insurance: {}\n\
         Confirmation: {}\n\n\
         Is there anything else I can help you with regarding your appointment?",
        appt.email,
        appt.phone,
        appt.patient_name,
        long_date(appt.appointment_date),
        clock(appt.appointment_time),
        appt.doctor,
        appt.location,
        appt.duration_minutes,
        appt.insurance_carrier,
        appt.confirmation_id,
    )
}
