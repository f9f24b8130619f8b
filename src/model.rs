use crate::schema::entities::LISTED_ENTITIES;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Http,
    Command,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    // Base URL of the REST backend (kind == http)
    #[serde(default)]
    pub base_url: Option<String>,
    // Command template with ${ACTION} ${ENTITY} ${PATH} ${PAGE} (kind == command)
    #[serde(default)]
    pub command: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Http,
            base_url: Some("http://127.0.0.1:8000".to_string()),
            command: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub backend: BackendConfig,
    // Tabs, in order
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,
    #[serde(default)]
    pub start_entity: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
    // Rows per listing page requested from the backend
    #[serde(default)]
    pub page_size: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            backend: BackendConfig::default(),
            entities: default_entities(),
            start_entity: Some("person".to_string()),
            log: LogConfig::default(),
            page_size: None,
        }
    }
}

impl AppConfig {
    /// Entity shown first: `start_entity`, else the first tab.
    pub fn initial_entity(&self) -> String {
        self.start_entity
            .clone()
            .or_else(|| self.entities.first().cloned())
            .unwrap_or_else(|| "person".to_string())
    }
}

fn default_title() -> String {
    "COSI Dashboard".to_string()
}

fn default_entities() -> Vec<String> {
    LISTED_ENTITIES.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn validate_app_config(cfg: &AppConfig) -> Result<(), String> {
    use std::collections::HashSet;
    if cfg.entities.is_empty() {
        return Err("entities must not be empty".into());
    }
    let mut seen = HashSet::new();
    for (i, e) in cfg.entities.iter().enumerate() {
        let name = e.to_lowercase();
        if !LISTED_ENTITIES.contains(&name.as_str()) {
            return Err(format!("unknown entity '{e}' at index {i}"));
        }
        if !seen.insert(name) {
            return Err(format!("duplicate entity '{e}' at index {i}"));
        }
    }
    if cfg.page_size == Some(0) {
        return Err("page_size must be positive".into());
    }
    if let Some(start) = &cfg.start_entity {
        if !seen.contains(&start.to_lowercase()) {
            return Err(format!("start_entity '{start}' is not listed in entities"));
        }
    }
    match cfg.backend.kind {
        BackendKind::Http => {
            if cfg.backend.base_url.as_deref().unwrap_or("").is_empty() {
                return Err("http backend requires 'base_url'".into());
            }
        }
        BackendKind::Command => {
            if cfg.backend.command.as_deref().unwrap_or("").is_empty() {
                return Err("command backend requires 'command'".into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        validate_app_config(&cfg).unwrap();
        assert_eq!(cfg.initial_entity(), "person");
    }

    #[test]
    fn parses_yaml_with_defaults() {
        let cfg: AppConfig = serde_yaml::from_str(
            "backend:\n  kind: command\n  command: cosi-cli ${ACTION} ${ENTITY}\nentities: [person, address]\n",
        )
        .unwrap();
        assert_eq!(cfg.backend.kind, BackendKind::Command);
        assert_eq!(cfg.title, "COSI Dashboard");
        assert_eq!(cfg.initial_entity(), "person");
        validate_app_config(&cfg).unwrap();
    }

    #[test]
    fn validate_detects_duplicate_and_unknown_entities() {
        let cfg = AppConfig {
            entities: vec!["person".into(), "Person".into()],
            ..Default::default()
        };
        assert!(validate_app_config(&cfg).unwrap_err().contains("duplicate entity"));
        let cfg = AppConfig {
            entities: vec!["pets".into()],
            start_entity: None,
            ..Default::default()
        };
        assert!(validate_app_config(&cfg).unwrap_err().contains("unknown entity"));
    }

    #[test]
    fn validate_backend_requirements() {
        let mut cfg = AppConfig::default();
        cfg.backend = BackendConfig {
            kind: BackendKind::Command,
            base_url: None,
            command: None,
        };
        assert!(validate_app_config(&cfg).unwrap_err().contains("command"));
        cfg.start_entity = Some("event".into());
        cfg.entities = vec!["person".into()];
        cfg.backend = BackendConfig::default();
        assert!(validate_app_config(&cfg).unwrap_err().contains("start_entity"));
    }
}
