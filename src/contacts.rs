use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, SafetyError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub is_active: bool,
}

/// The user's trusted contacts. Only active guardians follow new trips.
#[derive(Debug, Default)]
pub struct GuardianRoster {
    guardians: Vec<Guardian>,
}

impl GuardianRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Guardian] {
        &self.guardians
    }

    /// New guardians start inactive.
    pub fn add(&mut self, name: &str, phone: &str) -> Result<Guardian> {
        let (name, phone) = (name.trim(), phone.trim());
        if name.is_empty() || phone.is_empty() {
            return Err(SafetyError::invalid(
                "please provide both name and phone number",
            ));
        }

        let guardian = Guardian {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            is_active: false,
        };
        log::info!("{} has been added to the guardians list", guardian.name);
        self.guardians.push(guardian.clone());
        Ok(guardian)
    }

    pub fn toggle(&mut self, id: &str) -> Result<Guardian> {
        let guardian = self
            .guardians
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| SafetyError::invalid(format!("unknown guardian {id}")))?;
        guardian.is_active = !guardian.is_active;
        Ok(guardian.clone())
    }

    pub fn remove(&mut self, id: &str) -> Result<Guardian> {
        let pos = self
            .guardians
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| SafetyError::invalid(format!("unknown guardian {id}")))?;
        Ok(self.guardians.remove(pos))
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.guardians
            .iter()
            .filter(|g| g.is_active)
            .map(|g| g.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_requires_name_and_phone() {
        let mut roster = GuardianRoster::new();
        assert!(roster.add("  ", "+27 82 123 4567").is_err());
        assert!(roster.add("Mom", "").is_err());
        let mom = roster.add(" Mom ", "+27 82 123 4567").unwrap();
        assert_eq!(mom.name, "Mom");
        assert!(!mom.is_active);
    }

    #[test]
    fn only_active_guardians_follow_trips() {
        let mut roster = GuardianRoster::new();
        let mom = roster.add("Mom", "+27 82 123 4567").unwrap();
        let sister = roster.add("Sister Sarah", "+27 83 987 6543").unwrap();
        assert!(roster.active_ids().is_empty());

        roster.toggle(&mom.id).unwrap();
        assert_eq!(roster.active_ids(), vec![mom.id.clone()]);

        roster.toggle(&mom.id).unwrap();
        roster.toggle(&sister.id).unwrap();
        assert_eq!(roster.active_ids(), vec![sister.id.clone()]);
    }

    #[test]
    fn remove_and_unknown_ids() {
        let mut roster = GuardianRoster::new();
        let lisa = roster.add("Best Friend Lisa", "+27 84 555 1234").unwrap();
        assert!(roster.toggle("nope").is_err());
        assert_eq!(roster.remove(&lisa.id).unwrap(), lisa);
        assert!(roster.all().is_empty());
    }
}
