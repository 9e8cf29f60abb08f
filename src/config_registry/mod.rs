//! Configuration Registry: per-key defaults, validators and read-only
//! flags, merged with per-client overrides held in the state store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::state_store::{config_override_key, StateStore};
use crate::support::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeResult {
    Accepted,
    Rejected,
    RebootRequired,
    NotSupported,
}

#[derive(Debug, Clone)]
pub enum Validator {
    IntRange(i64, i64),
    Boolean,
    CsvSubset(&'static [&'static str]),
}

impl Validator {
    fn accepts(&self, value: &str) -> bool {
        match self {
            Validator::IntRange(lo, hi) => value
                .parse::<i64>()
                .map(|n| n >= *lo && n <= *hi)
                .unwrap_or(false),
            Validator::Boolean => matches!(value.to_ascii_lowercase().as_str(), "true" | "false"),
            Validator::CsvSubset(allowed) => {
                if value.is_empty() {
                    return true;
                }
                value.split(',').all(|token| allowed.contains(&token.trim()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub default_value: String,
    pub read_only: bool,
    pub reboot_required: bool,
    pub validator: Option<Validator>,
}

impl ConfigEntry {
    fn writable(default_value: &str, reboot_required: bool, validator: Validator) -> Self {
        Self {
            default_value: default_value.to_string(),
            read_only: false,
            reboot_required,
            validator: Some(validator),
        }
    }

    fn read_only(default_value: &str) -> Self {
        Self {
            default_value: default_value.to_string(),
            read_only: true,
            reboot_required: false,
            validator: None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfigValue {
    pub value: String,
    pub read_only: bool,
}

fn default_table() -> HashMap<&'static str, ConfigEntry> {
    let mut t = HashMap::new();
    t.insert(
        "HeartbeatInterval",
        ConfigEntry::writable("300", false, Validator::IntRange(0, 86_400)),
    );
    t.insert(
        "ConnectionTimeOut",
        ConfigEntry::writable("60", false, Validator::IntRange(0, 3_600)),
    );
    t.insert(
        "MeterValueSampleInterval",
        ConfigEntry::writable("60", false, Validator::IntRange(0, 3_600)),
    );
    t.insert(
        "MeterValuesSampledData",
        ConfigEntry::writable(
            "Energy.Active.Import.Register",
            false,
            Validator::CsvSubset(&[
                "Energy.Active.Import.Register",
                "Power.Active.Import",
                "Current.Import",
                "Voltage",
                "SoC",
            ]),
        ),
    );
    t.insert(
        "MeterValuesAlignedData",
        ConfigEntry::writable(
            "Energy.Active.Import.Register",
            false,
            Validator::CsvSubset(&["Energy.Active.Import.Register", "Power.Active.Import"]),
        ),
    );
    t.insert(
        "ClockAlignedDataInterval",
        ConfigEntry::writable("0", false, Validator::IntRange(0, 86_400)),
    );
    t.insert(
        "StopTxnSampledData",
        ConfigEntry::writable(
            "",
            false,
            Validator::CsvSubset(&["Energy.Active.Import.Register", "Power.Active.Import"]),
        ),
    );
    t.insert(
        "StopTxnAlignedData",
        ConfigEntry::writable(
            "",
            false,
            Validator::CsvSubset(&["Energy.Active.Import.Register", "Power.Active.Import"]),
        ),
    );
    t.insert(
        "LocalAuthorizeOffline",
        ConfigEntry::writable("true", false, Validator::Boolean),
    );
    t.insert(
        "LocalPreAuthorize",
        ConfigEntry::writable("false", false, Validator::Boolean),
    );
    t.insert(
        "AuthorizeRemoteTxRequests",
        ConfigEntry::writable("false", false, Validator::Boolean),
    );
    t.insert(
        "WebSocketPingInterval",
        ConfigEntry::writable("60", true, Validator::IntRange(0, 3_600)),
    );
    t.insert(
        "ResetRetries",
        ConfigEntry::writable("3", false, Validator::IntRange(0, 10)),
    );
    t.insert(
        "BlinkRepeat",
        ConfigEntry::writable("3", false, Validator::IntRange(0, 100)),
    );
    t.insert(
        "LightIntensity",
        ConfigEntry::writable("100", false, Validator::IntRange(0, 100)),
    );

    t.insert("SupportedFeatureProfiles", ConfigEntry::read_only("Core,RemoteTrigger"));
    t.insert("ChargeProfileMaxStackLevel", ConfigEntry::read_only("1"));
    t.insert(
        "ChargingScheduleAllowedChargingRateUnit",
        ConfigEntry::read_only("Current"),
    );
    t.insert("ChargingScheduleMaxPeriods", ConfigEntry::read_only("1"));
    t.insert("MaxChargingProfilesInstalled", ConfigEntry::read_only("1"));
    t.insert(
        "ConnectorSwitch3to1PhaseSupported",
        ConfigEntry::read_only("false"),
    );
    t.insert("GetConfigurationMaxKeys", ConfigEntry::read_only("50"));
    t
}

pub struct ConfigurationRegistry {
    defaults: HashMap<&'static str, ConfigEntry>,
    store: Arc<dyn StateStore>,
}

impl ConfigurationRegistry {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            defaults: default_table(),
            store,
        }
    }

    async fn overrides(&self, client_id: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.store.get_raw(&config_override_key(client_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashMap::default()),
        }
    }

    fn resolve(&self, key: &str, overrides: &HashMap<String, String>) -> Option<ConfigValue> {
        let entry = self.defaults.get(key)?;
        let value = overrides.get(key).cloned().unwrap_or_else(|| entry.default_value.clone());
        Some(ConfigValue {
            value,
            read_only: entry.read_only,
        })
    }

    /// Returns `(found, unknown_keys)`. An empty `requested_keys` means
    /// "return every recognized key".
    pub async fn get(
        &self,
        client_id: &str,
        requested_keys: &[String],
    ) -> Result<(HashMap<String, ConfigValue>, Vec<String>), StoreError> {
        let overrides = self.overrides(client_id).await?;
        let mut found = HashMap::new();
        let mut unknown = Vec::new();

        if requested_keys.is_empty() {
            for key in self.defaults.keys() {
                if let Some(value) = self.resolve(key, &overrides) {
                    found.insert((*key).to_string(), value);
                }
            }
        } else {
            for key in requested_keys {
                match self.resolve(key, &overrides) {
                    Some(value) => {
                        found.insert(key.clone(), value);
                    }
                    None => unknown.push(key.clone()),
                }
            }
        }

        Ok((found, unknown))
    }

    pub async fn export(&self, client_id: &str) -> Result<HashMap<String, ConfigValue>, StoreError> {
        let (all, _) = self.get(client_id, &[]).await?;
        Ok(all)
    }

    /// Writes a single key's value for `client_id`. Serializes concurrent
    /// writers for the same client via compare-and-set retry on the
    /// client's override blob.
    pub async fn change(
        &self,
        client_id: &str,
        key: &str,
        new_value: &str,
    ) -> Result<ChangeResult, StoreError> {
        let entry = match self.defaults.get(key) {
            Some(entry) => entry,
            None => return Ok(ChangeResult::NotSupported),
        };

        if entry.read_only {
            return Ok(ChangeResult::Rejected);
        }

        if let Some(validator) = &entry.validator {
            if !validator.accepts(new_value) {
                return Ok(ChangeResult::Rejected);
            }
        }

        let override_key = config_override_key(client_id);
        loop {
            let prior_raw = self.store.get_raw(&override_key).await?;
            let mut overrides: HashMap<String, String> = match &prior_raw {
                Some(raw) => serde_json::from_str(raw)?,
                None => HashMap::new(),
            };

            let current = overrides.get(key).cloned().unwrap_or_else(|| entry.default_value.clone());
            if current == new_value {
                return Ok(ChangeResult::Accepted);
            }

            overrides.insert(key.to_string(), new_value.to_string());
            let new_raw = serde_json::to_string(&overrides)?;

            if self
                .store
                .conditional_put_raw(&override_key, new_raw, prior_raw)
                .await?
            {
                info!(charge_point_id = client_id, key, new_value, "configuration override written");
                return Ok(if entry.reboot_required {
                    ChangeResult::RebootRequired
                } else {
                    ChangeResult::Accepted
                });
            }
            // lost the race with a concurrent writer for this client; retry
        }
    }

    pub fn known_keys(&self) -> HashSet<&'static str> {
        self.defaults.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    fn registry() -> ConfigurationRegistry {
        ConfigurationRegistry::new(Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn unknown_key_is_not_supported() {
        let reg = registry();
        let result = reg.change("CP01", "Foo", "1").await.unwrap();
        assert_eq!(result, ChangeResult::NotSupported);
    }

    #[tokio::test]
    async fn read_only_key_is_rejected_and_unchanged() {
        let reg = registry();
        let result = reg.change("CP01", "ChargeProfileMaxStackLevel", "5").await.unwrap();
        assert_eq!(result, ChangeResult::Rejected);
        let (values, _) = reg.get("CP01", &["ChargeProfileMaxStackLevel".into()]).await.unwrap();
        assert_eq!(values["ChargeProfileMaxStackLevel"].value, "1");
    }

    #[tokio::test]
    async fn validator_rejects_out_of_range() {
        let reg = registry();
        assert_eq!(
            reg.change("CP01", "HeartbeatInterval", "-1").await.unwrap(),
            ChangeResult::Rejected
        );
        assert_eq!(
            reg.change("CP01", "HeartbeatInterval", "0").await.unwrap(),
            ChangeResult::Accepted
        );
    }

    #[tokio::test]
    async fn reboot_required_key_reports_it_and_persists() {
        let reg = registry();
        let result = reg.change("CP01", "WebSocketPingInterval", "120").await.unwrap();
        assert_eq!(result, ChangeResult::RebootRequired);
        let (values, _) = reg.get("CP01", &["WebSocketPingInterval".into()]).await.unwrap();
        assert_eq!(values["WebSocketPingInterval"].value, "120");
    }

    #[tokio::test]
    async fn setting_same_value_is_accepted_without_rewriting() {
        let reg = registry();
        reg.change("CP01", "ResetRetries", "5").await.unwrap();
        let result = reg.change("CP01", "ResetRetries", "5").await.unwrap();
        assert_eq!(result, ChangeResult::Accepted);
    }

    #[tokio::test]
    async fn get_with_empty_keys_returns_every_recognized_key() {
        let reg = registry();
        let (values, unknown) = reg.get("CP01", &[]).await.unwrap();
        assert!(unknown.is_empty());
        assert!(values.contains_key("HeartbeatInterval"));
        assert!(values.contains_key("SupportedFeatureProfiles"));
    }

    #[tokio::test]
    async fn get_reports_unknown_keys_separately() {
        let reg = registry();
        let (values, unknown) = reg.get("CP01", &["HeartbeatInterval".into(), "Bogus".into()]).await.unwrap();
        assert!(values.contains_key("HeartbeatInterval"));
        assert_eq!(unknown, vec!["Bogus".to_string()]);
    }
}
