use serde::{Deserialize, Serialize};

/// A patient row in the directory. Column names match the patients spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientDirectoryEntry {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub preferred_doctor: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub last_visit_date: String,
}

impl PatientDirectoryEntry {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A new patient's details before an id has been allocated.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub phone_number: String,
    pub email: String,
    pub preferred_doctor: String,
    pub location: String,
    pub last_visit_date: String,
}

impl NewPatient {
    pub fn with_id(self, patient_id: String) -> PatientDirectoryEntry {
        PatientDirectoryEntry {
            patient_id,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            phone_number: self.phone_number,
            email: self.email,
            preferred_doctor: self.preferred_doctor,
            location: self.location,
            last_visit_date: self.last_visit_date,
        }
    }
}
