use billfold_core::ReadableMap;
use billfold_render::{CyclePolicy, Populator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid settings document")]
    Json(#[from] serde_json::Error),
}

/// Application settings. Every key is optional in a settings document.
///
/// ```json
/// {
///     "default_currency": "$",
///     "bindings": { "company": { "name": "Billfold Ltd." } },
///     "cycle_policy": "reject"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Currency of `Price` fields whose schema declares no default.
    pub default_currency: String,

    /// Names every template can use, such as the sender's company data.
    pub bindings: ReadableMap,

    pub cycle_policy: CyclePolicy,
}

fn default_currency() -> String {
    "€".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_currency: default_currency(),
            bindings: ReadableMap::new(),
            cycle_policy: CyclePolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Settings, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// A populator carrying these settings' bindings and cycle policy.
    pub fn populator(&self) -> Populator {
        Populator::new()
            .with_bindings(self.bindings.clone())
            .with_cycle_policy(self.cycle_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;

    #[test]
    fn defaults() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_currency, "€");
        assert_eq!(settings.cycle_policy, CyclePolicy::Preserve);
    }

    #[test]
    fn from_json() {
        let settings = Settings::from_json_str(indoc!(
            r#"
            {
                "default_currency": "$",
                "bindings": { "company": { "name": "Billfold Ltd." } },
                "cycle_policy": "reject"
            }
            "#
        ))
        .unwrap();
        assert_eq!(settings.default_currency, "$");
        assert_eq!(settings.bindings["company"], json!({ "name": "Billfold Ltd." }));
        assert_eq!(settings.cycle_policy, CyclePolicy::Reject);

        let populator = settings.populator();
        assert_eq!(populator.cycle_policy(), CyclePolicy::Reject);
        assert!(populator.bindings().contains_key("company"));
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(Settings::from_json_str("{ \"cycle_policy\": \"sometimes\" }").is_err());
        assert!(Settings::from_json_str("[]").is_err());
    }
}
