use chrono::{Duration, Local, NaiveDateTime};
use serde::Serialize;

use crate::db::queries;
use crate::models::{Conversation, ConversationRecord, Stage};
use crate::services::router;
use crate::services::stages::{self, Turn};
use crate::state::AppState;

/// The result of one patient utterance.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub stage: Stage,
    pub record: ConversationRecord,
}

pub async fn process_message(
    state: &AppState,
    session_key: &str,
    message: &str,
) -> anyhow::Result<TurnOutcome> {
    process_message_at(state, session_key, message, Local::now().naive_local()).await
}

/// Runs exactly one stage handler for `message` and stores the updated conversation.
pub async fn process_message_at(
    state: &AppState,
    session_key: &str,
    message: &str,
    now: NaiveDateTime,
) -> anyhow::Result<TurnOutcome> {
    // Load or create conversation
    let mut conv = {
        let conn = state.conn()?;
        queries::get_conversation(&conn, session_key, now)?
    }
    .unwrap_or_else(|| new_conversation(session_key, now));

    let record = &mut conv.record;
    record.push_user(message);

    let current = record.conversation_stage;
    let stage = router::entry_stage(record, current);
    if stage != current {
        tracing::info!(
            session = session_key,
            from = current.as_str(),
            to = stage.as_str(),
            "missing upstream data, falling back"
        );
    }

    let turn = Turn { state, message, now };
    let reply = stages::handle(stage, &turn, record).await;

    let next = router::next_stage(record, stage);
    tracing::info!(
        session = session_key,
        handled = stage.as_str(),
        next = next.as_str(),
        "turn processed"
    );
    record.conversation_stage = next;
    record.push_assistant(&reply);

    conv.last_activity = now;
    conv.expires_at = now + Duration::minutes(state.config.session_ttl_minutes);

    {
        let conn = state.conn()?;
        queries::save_conversation(&conn, &conv)?;
    }

    Ok(TurnOutcome {
        reply,
        stage: next,
        record: conv.record,
    })
}

/// The live record for a session, if it has not expired.
pub fn get_record(state: &AppState, session_key: &str) -> anyhow::Result<Option<ConversationRecord>> {
    let conn = state.conn()?;
    let conv = queries::get_conversation(&conn, session_key, Local::now().naive_local())?;
    Ok(conv.map(|c| c.record))
}

/// Drops a session so its next message starts over at the greeting.
pub fn reset_conversation(state: &AppState, session_key: &str) -> anyhow::Result<bool> {
    let conn = state.conn()?;
    let removed = queries::delete_conversation(&conn, session_key)?;
    tracing::info!(session = session_key, removed, "conversation reset");
    Ok(removed)
}

fn new_conversation(session_key: &str, now: NaiveDateTime) -> Conversation {
    Conversation {
        session_key: session_key.to_string(),
        record: ConversationRecord::new(),
        last_activity: now,
        expires_at: now,
    }
}
