use std::{collections::HashMap, fs};

pub const SETTINGS_FILE: &str = "ticketdesk.toml";
/// Dev-only widget key; real deployments set `PAYMENT_PUBLIC_KEY`.
pub const DEV_PAYMENT_PUBLIC_KEY: &str = "pk_test_xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Hosted backend root. When unset the client runs against the local
    /// sqlite store.
    pub backend_url: Option<String>,
    pub backend_anon_key: Option<String>,
    pub payment_public_key: String,
    pub currency: String,
    pub database_url: String,
    pub session_flag_path: String,
    pub public_origin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_anon_key: None,
            payment_public_key: DEV_PAYMENT_PUBLIC_KEY.into(),
            currency: "GHS".into(),
            database_url: "sqlite://./data/ticketdesk.db".into(),
            session_flag_path: "./data/session.json".into(),
            public_origin: "http://localhost:5173".into(),
        }
    }
}

impl Settings {
    pub fn uses_hosted_backend(&self) -> bool {
        self.backend_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    fn apply_file(&mut self, raw: &str) {
        let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
            tracing::warn!("config: ignoring unparseable {SETTINGS_FILE}");
            return;
        };
        if let Some(v) = file_cfg.get("backend_url") {
            self.backend_url = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("backend_anon_key") {
            self.backend_anon_key = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("payment_public_key") {
            self.payment_public_key = v.clone();
        }
        if let Some(v) = file_cfg.get("currency") {
            self.currency = v.clone();
        }
        if let Some(v) = file_cfg.get("database_url") {
            self.database_url = v.clone();
        }
        if let Some(v) = file_cfg.get("session_flag_path") {
            self.session_flag_path = v.clone();
        }
        if let Some(v) = file_cfg.get("public_origin") {
            self.public_origin = v.clone();
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().rev().find_map(|key| lookup(key));

        if let Some(v) = first(&["BACKEND_URL", "APP__BACKEND_URL"]) {
            self.backend_url = Some(v);
        }
        if let Some(v) = first(&["BACKEND_ANON_KEY", "APP__BACKEND_ANON_KEY"]) {
            self.backend_anon_key = Some(v);
        }
        if let Some(v) = first(&["PAYMENT_PUBLIC_KEY", "APP__PAYMENT_PUBLIC_KEY"]) {
            self.payment_public_key = v;
        }
        if let Some(v) = first(&["APP__CURRENCY"]) {
            self.currency = v;
        }
        if let Some(v) = first(&["DATABASE_URL", "APP__DATABASE_URL"]) {
            self.database_url = v;
        }
        if let Some(v) = first(&["SESSION_FLAG_PATH", "APP__SESSION_FLAG_PATH"]) {
            self.session_flag_path = v;
        }
        if let Some(v) = first(&["PUBLIC_ORIGIN", "APP__PUBLIC_ORIGIN"]) {
            self.public_origin = v;
        }
    }
}

/// Defaults, then `ticketdesk.toml`, then environment. `APP__`-prefixed
/// variables win over their bare counterparts.
pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file_contents: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();
    if let Some(raw) = file_contents {
        settings.apply_file(raw);
    }
    settings.apply_env(lookup);
    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with(storage::MEMORY_URL)
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
