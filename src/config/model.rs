use serde::{de, Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateConfig>,
}

fn default_state_dir() -> String {
    ".svcrig".to_string()
}

fn default_workspace() -> String {
    "templates".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_launch_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_runtime_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Host used in reachable URLs. `"auto"` detects the outward-facing IPv4.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_stop_timeout", deserialize_with = "human_duration")]
    pub stop_timeout: Duration,
    #[serde(default = "default_launch_timeout", deserialize_with = "human_duration")]
    pub launch_timeout: Duration,
    #[serde(default = "default_runtime_timeout", deserialize_with = "human_duration")]
    pub runtime_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            workspace: default_workspace(),
            host: default_host(),
            stop_timeout: default_stop_timeout(),
            launch_timeout: default_launch_timeout(),
            runtime_timeout: default_runtime_timeout(),
        }
    }
}

fn default_container_port() -> u16 {
    8000
}

/// A user-defined template, added to or replacing a built-in one.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TemplateConfig {
    pub image: String,
    /// Preferred base host port.
    pub port: u16,
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    #[serde(default)]
    pub command: Option<StringOrList>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

fn human_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw)
        .map_err(|e| de::Error::custom(format!("invalid duration '{raw}': {e}")))
}

/// A value that can be either a single string or a list of strings.
/// A single string is run through `sh -c`.
#[derive(Debug, Clone, PartialEq)]
pub struct StringOrList(pub Vec<String>);

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StringOrList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrListVisitor;

        impl<'de> de::Visitor<'de> for StringOrListVisitor {
            type Value = StringOrList;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or a list of strings")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<StringOrList, E> {
                Ok(StringOrList(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    value.to_string(),
                ]))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<StringOrList, A::Error> {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    values.push(value);
                }
                Ok(StringOrList(values))
            }
        }

        deserializer.deserialize_any(StringOrListVisitor)
    }
}
