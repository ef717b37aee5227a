use std::env;

use crate::services::availability::MAX_SLOTS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub clinic_name: String,
    /// Number quoted to patients when the conversation cannot continue on its own.
    pub office_phone: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub sendgrid_api_key: String,
    pub sendgrid_from_email: String,
    pub calendly_api_key: String,
    pub patients_csv: String,
    pub schedule_csv: String,
    pub slot_list_limit: usize,
    pub session_ttl_minutes: i64,
    pub reminder_poll_secs: u64,
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "medbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            clinic_name: env::var("CLINIC_NAME").unwrap_or_else(|_| "Medical Clinic".to_string()),
            office_phone: env::var("OFFICE_PHONE").unwrap_or_else(|_| "(555) 123-4567".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "none".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            sendgrid_from_email: env::var("SENDGRID_FROM_EMAIL").unwrap_or_default(),
            calendly_api_key: env::var("CALENDLY_API_KEY").unwrap_or_default(),
            patients_csv: env::var("PATIENTS_CSV").unwrap_or_else(|_| "data/patients.csv".to_string()),
            schedule_csv: env::var("SCHEDULE_CSV")
                .unwrap_or_else(|_| "data/doctor_schedules.csv".to_string()),
            slot_list_limit: parsed("SLOT_LIST_LIMIT", MAX_SLOTS).clamp(1, MAX_SLOTS),
            session_ttl_minutes: parsed("SESSION_TTL_MINUTES", 60).max(1),
            reminder_poll_secs: parsed("REMINDER_POLL_SECS", 300).max(1),
        }
    }

    pub fn twilio_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_phone_number.is_empty()
    }

    pub fn sendgrid_configured(&self) -> bool {
        !self.sendgrid_api_key.is_empty() && !self.sendgrid_from_email.is_empty()
    }
}

impl Default for AppConfig {
    /// Defaults with every external service switched off.
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            admin_token: "changeme".to_string(),
            clinic_name: "Medical Clinic".to_string(),
            office_phone: "(555) 123-4567".to_string(),
            llm_provider: "none".to_string(),
            groq_api_key: String::new(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
            sendgrid_api_key: String::new(),
            sendgrid_from_email: String::new(),
            calendly_api_key: String::new(),
            patients_csv: String::new(),
            schedule_csv: String::new(),
            slot_list_limit: MAX_SLOTS,
            session_ttl_minutes: 60,
            reminder_poll_secs: 300,
        }
    }
}
