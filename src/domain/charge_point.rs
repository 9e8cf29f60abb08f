//! Charge point identity and liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A charge point as seen by the processor: identity plus liveness, not
/// wire-level session state (that belongs to the bus).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePointInfo {
    pub id: String,
    pub vendor: String,
    pub model: String,
    pub online: bool,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Connector ids this charge point has reported at least once. The
    /// state store has no list-by-prefix primitive, so the façade needs
    /// this index to answer "list connectors for client".
    #[serde(default)]
    pub known_connector_ids: Vec<u32>,
}

impl ChargePointInfo {
    pub fn boot(id: impl Into<String>, vendor: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            vendor: vendor.into(),
            model: model.into(),
            online: true,
            registered_at: now,
            last_seen: now,
            known_connector_ids: Vec::new(),
        }
    }

    pub fn note_connector(&mut self, connector_id: u32) {
        if !self.known_connector_ids.contains(&connector_id) {
            self.known_connector_ids.push(connector_id);
            self.known_connector_ids.sort_unstable();
        }
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_seen = at;
        self.online = true;
    }

    pub fn set_offline(&mut self) {
        self.online = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_marks_online() {
        let cp = ChargePointInfo::boot("CP01", "Acme", "X1");
        assert!(cp.online);
        assert_eq!(cp.id, "CP01");
    }

    #[test]
    fn set_offline_clears_flag() {
        let mut cp = ChargePointInfo::boot("CP01", "Acme", "X1");
        cp.set_offline();
        assert!(!cp.online);
    }
}
