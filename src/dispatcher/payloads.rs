//! Typed shapes for the inbound OCPP 1.6 Core messages this dispatcher
//! understands, plus the total-match parse from `(action, payload)` into
//! [`InboundRequest`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootNotificationPayload {
    pub charge_point_vendor: String,
    pub charge_point_model: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotificationPayload {
    pub connector_id: u32,
    pub status: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionPayload {
    pub connector_id: u32,
    pub id_tag: String,
    pub meter_start: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTransactionPayload {
    pub transaction_id: i64,
    pub meter_stop: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledValue {
    pub value: String,
    #[serde(default)]
    pub measurand: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterValueEntry {
    pub timestamp: DateTime<Utc>,
    pub sampled_value: Vec<SampledValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterValuesPayload {
    pub connector_id: u32,
    #[serde(default)]
    pub transaction_id: Option<i64>,
    pub meter_value: Vec<MeterValueEntry>,
}

impl MeterValuesPayload {
    /// The most recent `Energy.Active.Import.Register` reading, in Wh, if
    /// one is present and parses as a non-negative integer.
    pub fn latest_energy_register_reading(&self) -> Option<i64> {
        self.meter_value
            .iter()
            .max_by_key(|entry| entry.timestamp)
            .and_then(|entry| {
                entry
                    .sampled_value
                    .iter()
                    .find(|sv| {
                        sv.measurand.as_deref().unwrap_or("Energy.Active.Import.Register")
                            == "Energy.Active.Import.Register"
                    })
                    .and_then(|sv| sv.value.parse::<i64>().ok())
                    .filter(|v| *v >= 0)
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct GetConfigurationPayload {
    #[serde(default)]
    pub key: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeConfigurationPayload {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizePayload {
    pub id_tag: String,
}

#[derive(Debug)]
pub enum InboundRequest {
    BootNotification(BootNotificationPayload),
    Heartbeat,
    StatusNotification(StatusNotificationPayload),
    StartTransaction(StartTransactionPayload),
    StopTransaction(StopTransactionPayload),
    MeterValues(MeterValuesPayload),
    GetConfiguration(GetConfigurationPayload),
    ChangeConfiguration(ChangeConfigurationPayload),
    Authorize(AuthorizePayload),
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
}

#[derive(Debug)]
pub struct UnsupportedAction(pub String);

/// Total match over the OCPP 1.6 Core + RemoteTrigger action set this
/// processor understands. Anything else is `Err(UnsupportedAction)`,
/// which the caller maps onto an OCPP `NotSupported` CallError.
pub fn parse_inbound(action: &str, payload: Value) -> Result<InboundRequest, UnsupportedAction> {
    let unsupported = || UnsupportedAction(action.to_string());

    match action {
        "BootNotification" => serde_json::from_value(payload)
            .map(InboundRequest::BootNotification)
            .map_err(|_| unsupported()),
        "Heartbeat" => Ok(InboundRequest::Heartbeat),
        "StatusNotification" => serde_json::from_value(payload)
            .map(InboundRequest::StatusNotification)
            .map_err(|_| unsupported()),
        "StartTransaction" => serde_json::from_value(payload)
            .map(InboundRequest::StartTransaction)
            .map_err(|_| unsupported()),
        "StopTransaction" => serde_json::from_value(payload)
            .map(InboundRequest::StopTransaction)
            .map_err(|_| unsupported()),
        "MeterValues" => serde_json::from_value(payload)
            .map(InboundRequest::MeterValues)
            .map_err(|_| unsupported()),
        "GetConfiguration" => serde_json::from_value(payload)
            .map(InboundRequest::GetConfiguration)
            .map_err(|_| unsupported()),
        "ChangeConfiguration" => serde_json::from_value(payload)
            .map(InboundRequest::ChangeConfiguration)
            .map_err(|_| unsupported()),
        "Authorize" => serde_json::from_value(payload)
            .map(InboundRequest::Authorize)
            .map_err(|_| unsupported()),
        "DiagnosticsStatusNotification" => Ok(InboundRequest::DiagnosticsStatusNotification),
        "FirmwareStatusNotification" => Ok(InboundRequest::FirmwareStatusNotification),
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_boot_notification() {
        let req = parse_inbound(
            "BootNotification",
            json!({"chargePointVendor": "Acme", "chargePointModel": "X1"}),
        )
        .unwrap();
        assert!(matches!(req, InboundRequest::BootNotification(_)));
    }

    #[test]
    fn unknown_action_is_unsupported() {
        assert!(parse_inbound("DataTransfer", json!({})).is_err());
    }

    #[test]
    fn latest_energy_reading_picks_the_newest_sample() {
        let payload: MeterValuesPayload = serde_json::from_value(json!({
            "connectorId": 1,
            "transactionId": 1000,
            "meterValue": [
                {"timestamp": "2026-01-01T00:00:00Z", "sampledValue": [{"value": "1500", "measurand": "Energy.Active.Import.Register"}]},
                {"timestamp": "2026-01-01T00:05:00Z", "sampledValue": [{"value": "1800", "measurand": "Energy.Active.Import.Register"}]}
            ]
        }))
        .unwrap();
        assert_eq!(payload.latest_energy_register_reading(), Some(1800));
    }
}
