//! Connector status, the per-(charge point, connector) state machine target
//! of StatusNotification and the transaction lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    Available,
    Preparing,
    Charging,
    SuspendedEV,
    SuspendedEVSE,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "Available",
            Self::Preparing => "Preparing",
            Self::Charging => "Charging",
            Self::SuspendedEV => "SuspendedEV",
            Self::SuspendedEVSE => "SuspendedEVSE",
            Self::Finishing => "Finishing",
            Self::Reserved => "Reserved",
            Self::Unavailable => "Unavailable",
            Self::Faulted => "Faulted",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ConnectorState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Available" => Self::Available,
            "Preparing" => Self::Preparing,
            "Charging" => Self::Charging,
            "SuspendedEV" => Self::SuspendedEV,
            "SuspendedEVSE" => Self::SuspendedEVSE,
            "Finishing" => Self::Finishing,
            "Reserved" => Self::Reserved,
            "Unavailable" => Self::Unavailable,
            "Faulted" => Self::Faulted,
            other => return Err(format!("unknown connector status: {other}")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorStatus {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub status: ConnectorState,
    pub error_code: Option<String>,
    pub active_transaction_id: Option<i64>,
}

impl ConnectorStatus {
    pub fn new(charge_point_id: impl Into<String>, connector_id: u32) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            connector_id,
            status: ConnectorState::Available,
            error_code: None,
            active_transaction_id: None,
        }
    }

    pub fn set_status(&mut self, status: ConnectorState, error_code: Option<String>) {
        self.status = status;
        self.error_code = error_code;
    }

    pub fn attach_transaction(&mut self, transaction_id: i64) {
        self.active_transaction_id = Some(transaction_id);
    }

    pub fn clear_transaction_if(&mut self, transaction_id: i64) {
        if self.active_transaction_id == Some(transaction_id) {
            self.active_transaction_id = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connector_is_available() {
        let c = ConnectorStatus::new("CP01", 1);
        assert_eq!(c.status, ConnectorState::Available);
        assert!(c.active_transaction_id.is_none());
    }

    #[test]
    fn clear_transaction_only_matches_owner() {
        let mut c = ConnectorStatus::new("CP01", 1);
        c.attach_transaction(1000);
        c.clear_transaction_if(1001);
        assert_eq!(c.active_transaction_id, Some(1000));
        c.clear_transaction_if(1000);
        assert!(c.active_transaction_id.is_none());
    }

    #[test]
    fn status_roundtrips_through_display_and_parse() {
        for s in [
            ConnectorState::Available,
            ConnectorState::Preparing,
            ConnectorState::Charging,
            ConnectorState::SuspendedEV,
            ConnectorState::SuspendedEVSE,
            ConnectorState::Finishing,
            ConnectorState::Reserved,
            ConnectorState::Unavailable,
            ConnectorState::Faulted,
        ] {
            let parsed: ConnectorState = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
