use super::format::{join_words, numbered_slots};
use super::insurance::CARRIER_PROMPT;
use super::{apology, Turn};
use crate::db::queries;
use crate::models::{ConversationRecord, Field, Slot};
use crate::services::availability::{alternatives, available_slots, select_slot, SlotQuery};
use crate::services::booking_link::{claims_booked, BookingLinkProvider};
use crate::services::extraction::clinic;

/// Offers slots for the chosen doctor and location and resolves the patient's pick.
pub async fn handle(turn: &Turn<'_>, record: &mut ConversationRecord) -> String {
    let Some(patient_type) = record.patient_type else {
        return "I need to look up your records before I can check availability.".to_string();
    };
    let duration = record
        .appointment_duration
        .unwrap_or_else(|| patient_type.appointment_minutes());

    if record.slots_exhausted {
        switch_preference(turn.message, record);
    }

    if let Some(slot) = select_slot(turn.message, &record.presented_slots).cloned() {
        return hold(record, &slot);
    }

    let mut preface = None;
    if let Some(links) = turn.state.booking_links.as_deref() {
        if claims_booked(turn.message) {
            match external_booking(links, record, duration).await {
                Some(slot) => return hold(record, &slot),
                None => {
                    preface = Some(
                        "I couldn't find a booking under your email address yet, so here are the \
                         times I can offer directly."
                            .to_string(),
                    )
                }
            }
        }
    }

    let reply = offer(turn, record, duration).await;
    match preface {
        Some(preface) => format!("{preface}\n\n{reply}"),
        None => reply,
    }
}

/// After a dead end, naming another known doctor or location replaces the preference.
fn switch_preference(message: &str, record: &mut ConversationRecord) {
    let choices = [
        (Field::PreferredDoctor, clinic::doctor(message), record.preferred_doctor.clone()),
        (Field::Location, clinic::location(message), record.location.clone()),
    ];
    for (field, chosen, current) in choices {
        if let Some(chosen) = chosen {
            if current.as_deref() != Some(chosen.as_str()) {
                tracing::info!(field = field.as_str(), value = %chosen, "preference replaced by patient");
                record.replace_preference(field, chosen);
            }
        }
    }
}

/// Stores the chosen slot in the record. Capacity is only taken when the booking commits.
fn hold(record: &mut ConversationRecord, slot: &Slot) -> String {
    record.appointment_date = Some(slot.date);
    record.appointment_time = Some(slot.time);
    record.presented_slots.clear();
    record.slots_exhausted = false;

    format!(
        "Perfect! I've noted {} for your {}-minute appointment with {} at {}.\n\n{CARRIER_PROMPT}",
        slot.describe(),
        slot.duration_minutes,
        slot.doctor,
        slot.location,
    )
}

async fn external_booking(
    links: &dyn BookingLinkProvider,
    record: &ConversationRecord,
    duration: u32,
) -> Option<Slot> {
    let email = record.email.as_deref()?;
    let doctor = record.preferred_doctor.clone()?;
    let location = record.location.clone()?;

    match links.latest_booking(email).await {
        Ok(Some(start)) => {
            tracing::info!(%start, "booking found through scheduling link");
            Some(Slot {
                date: start.date(),
                time: start.time(),
                doctor,
                location,
                duration_minutes: duration,
            })
        }
        Ok(None) => {
            tracing::info!("patient reported a link booking but none was found");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to check scheduling link bookings");
            None
        }
    }
}

async fn offer(turn: &Turn<'_>, record: &mut ConversationRecord, duration: u32) -> String {
    let (Some(doctor), Some(location)) = (record.preferred_doctor.clone(), record.location.clone())
    else {
        return "I need to know your preferred doctor and location before I can check availability."
            .to_string();
    };

    let loaded = turn.state.conn().and_then(|conn| {
        let rows = queries::list_schedule(&conn)?;
        let taken = queries::confirmed_slots(&conn, turn.now.date())?;
        Ok((rows, taken))
    });
    let (rows, taken) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(error = %e, "failed to load schedule");
            return apology(turn, "checking availability");
        }
    };

    let query = SlotQuery {
        limit: turn.state.config.slot_list_limit,
        not_before: Some(turn.now),
        taken: &taken,
        ..SlotQuery::for_pair(&doctor, &location, duration)
    };
    let slots = available_slots(&rows, &query);

    if slots.is_empty() {
        record.presented_slots.clear();
        record.slots_exhausted = true;
        let others = alternatives(&rows, &query);
        tracing::info!(%doctor, %location, alternatives = others.len(), "no slots available");
        return dead_end(turn, &doctor, &location, duration, &others);
    }

    let mut reply = format!(
        "Great! {doctor} has the following {duration}-minute appointment slots available at {location}:\n\n{}\n\n\
         Which time slot would you prefer? You can reply with the number.",
        numbered_slots(&slots)
    );
    record.presented_slots = slots;
    record.slots_exhausted = false;

    if let Some(links) = turn.state.booking_links.as_deref() {
        match links.create_link(duration).await {
            Ok(url) => reply.push_str(&format!(
                "\n\nYou can also book online here: {url}\nJust reply \"booked\" once you're done."
            )),
            Err(e) => tracing::warn!(error = %e, "failed to create scheduling link"),
        }
    }
    reply
}

fn dead_end(
    turn: &Turn<'_>,
    doctor: &str,
    location: &str,
    duration: u32,
    others: &[(String, String)],
) -> String {
    let mut reply = format!(
        "I'm sorry, but {doctor} doesn't have any available {duration}-minute slots at {location} right now."
    );
    if others.is_empty() {
        reply.push_str(" None of our other doctors or locations have openings either.");
    } else {
        let pairs: Vec<String> = others.iter().map(|(d, l)| format!("{d} at {l}")).collect();
        reply.push_str(&format!(
            " These have openings: {}. Just tell me which doctor or location you'd like instead.",
            join_words(&pairs)
        ));
    }
    reply.push_str(&format!(
        " You can also call our office at {} to check for later dates.",
        turn.state.config.office_phone
    ));
    reply
}
