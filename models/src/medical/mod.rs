// models/src/medical/mod.rs
pub mod appointment;
pub mod diagnosis;
pub mod login;
pub mod patient;
pub mod user;

pub use appointment::*;
pub use diagnosis::*;
pub use login::*;
pub use patient::*;
pub use user::*;

/// Trimmed value of an optional body field, `None` when absent or blank.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Names of the required fields that are absent or blank.
pub fn missing_fields<'a>(fields: &[(&'a str, &Option<String>)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| non_blank(value).is_none())
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_counts_as_missing() {
        let name = Some("  ".to_string());
        let contact = Some("555".to_string());
        let missing = missing_fields(&[("patientName", &name), ("contact", &contact), ("dob", &None)]);
        assert_eq!(missing, vec!["patientName", "dob"]);
    }
}
