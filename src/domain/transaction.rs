//! Transaction domain entity: a single charging session bracketed by
//! StartTransaction/StopTransaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Active,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub id: i64,
    pub charge_point_id: String,
    pub connector_id: u32,
    pub id_tag: String,
    pub meter_start: i64,
    pub current_meter: i64,
    pub started_at: DateTime<Utc>,
    pub status: TransactionStatus,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<String>,
}

impl TransactionInfo {
    pub fn start(
        id: i64,
        charge_point_id: impl Into<String>,
        connector_id: u32,
        id_tag: impl Into<String>,
        meter_start: i64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            charge_point_id: charge_point_id.into(),
            connector_id,
            id_tag: id_tag.into(),
            meter_start,
            current_meter: meter_start,
            started_at,
            status: TransactionStatus::Active,
            stopped_at: None,
            stop_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    pub fn stop(&mut self, meter_stop: i64, reason: Option<String>, stopped_at: DateTime<Utc>) {
        self.current_meter = meter_stop.max(self.current_meter);
        self.status = TransactionStatus::Stopped;
        self.stopped_at = Some(stopped_at);
        self.stop_reason = reason;
    }

    /// Applies a meter reading, dropping it (with the decision left to the
    /// caller to log) if it is lower than the current reading.
    pub fn apply_meter_reading(&mut self, reading: i64) -> bool {
        if reading < self.current_meter {
            return false;
        }
        self.current_meter = reading;
        true
    }

    pub fn energy_consumed(&self) -> i64 {
        self.current_meter - self.meter_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> TransactionInfo {
        TransactionInfo::start(1000, "CP01", 1, "TAG-001", 1000, Utc::now())
    }

    #[test]
    fn start_is_active_with_meter_at_start_value() {
        let tx = sample_tx();
        assert!(tx.is_active());
        assert_eq!(tx.current_meter, tx.meter_start);
    }

    #[test]
    fn stop_sets_stopped_and_clamps_meter() {
        let mut tx = sample_tx();
        tx.stop(5000, Some("Local".into()), Utc::now());
        assert_eq!(tx.status, TransactionStatus::Stopped);
        assert_eq!(tx.current_meter, 5000);
        assert!(!tx.is_active());
    }

    #[test]
    fn apply_meter_reading_rejects_lower_values() {
        let mut tx = sample_tx();
        assert!(tx.apply_meter_reading(1500));
        assert_eq!(tx.current_meter, 1500);
        assert!(!tx.apply_meter_reading(1200));
        assert_eq!(tx.current_meter, 1500);
    }

    #[test]
    fn energy_consumed_reflects_current_meter() {
        let mut tx = sample_tx();
        tx.apply_meter_reading(2500);
        assert_eq!(tx.energy_consumed(), 1500);
    }

    #[test]
    fn stop_clamps_meter_to_the_higher_of_stop_and_current() {
        let mut tx = sample_tx();
        tx.apply_meter_reading(3000);
        tx.stop(2500, None, Utc::now());
        assert_eq!(tx.current_meter, 3000);
    }
}
