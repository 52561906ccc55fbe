//! Configuration parameters looked up while compiling call templates.
use crate::store::Scope;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar, string or list parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Text substituted into a call template.
    ///
    /// Strings are inserted verbatim because templates carry their own quotes
    /// (`"{electron_id}"`); inside lists they are quoted.
    pub fn render(&self) -> String {
        match self {
            ConfigValue::Str(s) => s.clone(),
            other => other.render_nested(),
        }
    }

    fn render_nested(&self) -> String {
        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Int(i) => i.to_string(),
            // Debug keeps a decimal point or exponent: 25.0, 0.5, 1e-5.
            ConfigValue::Float(f) => format!("{:?}", f),
            ConfigValue::Str(s) => format!("\"{}\"", s),
            ConfigValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.render_nested()).collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.render()) }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self { ConfigValue::Bool(v) }
}
impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self { ConfigValue::Int(v) }
}
impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self { ConfigValue::Int(v as i64) }
}
impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self { ConfigValue::Float(v) }
}
impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self { ConfigValue::Str(v.to_string()) }
}
impl From<String> for ConfigValue {
    fn from(v: String) -> Self { ConfigValue::Str(v) }
}

/// Placeholder name -> value, with optional per-scope overrides.
///
/// Supplied by the caller; a placeholder missing from both the scope overrides
/// and the defaults is a compile error, never a silent default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: IndexMap<String, ConfigValue>,
    #[serde(default)]
    pub scopes: IndexMap<Scope, IndexMap<String, ConfigValue>>,
}

impl Config {
    pub fn new() -> Self { Self::default() }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> &mut Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    pub fn set_for_scope(
        &mut self,
        scope: impl Into<Scope>,
        name: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> &mut Self {
        self.scopes.entry(scope.into()).or_default().insert(name.into(), value.into());
        self
    }

    pub fn lookup(&self, name: &str, scope: &Scope) -> Option<&ConfigValue> {
        self.scopes
            .get(scope)
            .and_then(|overrides| overrides.get(name))
            .or_else(|| self.defaults.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConfigValue::Float(25.0), "25.0")]
    #[case(ConfigValue::Float(0.5), "0.5")]
    #[case(ConfigValue::Int(3), "3")]
    #[case(ConfigValue::Bool(true), "true")]
    #[case(ConfigValue::Str("Electron_mvaFall17V2Iso_WP90".into()), "Electron_mvaFall17V2Iso_WP90")]
    #[case(ConfigValue::List(vec![ConfigValue::Int(1), ConfigValue::Int(2)]), "{1, 2}")]
    #[case(ConfigValue::List(vec!["a".into(), "b".into()]), "{\"a\", \"b\"}")]
    fn test_render(#[case] value: ConfigValue, #[case] expected: &str) {
        assert_eq!(value.render(), expected);
    }

    #[test]
    fn test_scope_override_wins() {
        let mut config = Config::new();
        config.set("min_electron_pt", 10.0).set_for_scope("ee", "min_electron_pt", 25.0);

        assert_eq!(config.lookup("min_electron_pt", &"ee".into()), Some(&ConfigValue::Float(25.0)));
        assert_eq!(config.lookup("min_electron_pt", &"mm".into()), Some(&ConfigValue::Float(10.0)));
        assert_eq!(config.lookup("missing", &"ee".into()), None);
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(
            r#"{
                "defaults": {"electron_id": "Electron_mvaIso_WP90", "electron_id_wp": 1, "min_electron_eta": 2.5},
                "scopes": {"ee": {"electron_index_in_pair": 0}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.lookup("electron_id_wp", &"ee".into()), Some(&ConfigValue::Int(1)));
        assert_eq!(config.lookup("min_electron_eta", &"ee".into()), Some(&ConfigValue::Float(2.5)));
        assert_eq!(config.lookup("electron_index_in_pair", &"ee".into()), Some(&ConfigValue::Int(0)));
        assert_eq!(config.lookup("electron_index_in_pair", &"em".into()), None);
    }
}
