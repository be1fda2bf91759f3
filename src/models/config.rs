use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::CollectorError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    Postmark,
    Smtp,
    #[default]
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReedConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_reed_results")]
    pub results_to_take: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdzunaConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_key: Option<String>,
    #[serde(default = "default_adzuna_country")]
    pub country: String,
    #[serde(default = "default_adzuna_results")]
    pub results_per_page: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub provider: MailProvider,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub postmark_token: Option<String>,
    #[serde(default = "default_message_stream")]
    pub message_stream: String,
    #[serde(default)]
    pub smtp_host: Option<String>,
    /// STARTTLS submission port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Shared secret required on `/api/tasks/*` when set.
    #[serde(default)]
    pub cron_secret: Option<String>,
    /// 5-field cron expression for the periodic notification sweep.
    #[serde(default)]
    pub sweep_schedule: Option<String>,
    #[serde(default)]
    pub sweep_timezone: Option<String>,
    #[serde(default = "default_reed")]
    pub reed: ReedConfig,
    #[serde(default = "default_adzuna")]
    pub adzuna: AdzunaConfig,
    #[serde(default = "default_mail")]
    pub mail: MailConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8390
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_reed_results() -> usize {
    25
}

fn default_adzuna_country() -> String {
    "gb".to_string()
}

fn default_adzuna_results() -> usize {
    20
}

fn default_message_stream() -> String {
    "outbound".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_reed() -> ReedConfig {
    ReedConfig {
        api_key: None,
        results_to_take: default_reed_results(),
    }
}

fn default_adzuna() -> AdzunaConfig {
    AdzunaConfig {
        app_id: None,
        app_key: None,
        country: default_adzuna_country(),
        results_per_page: default_adzuna_results(),
    }
}

fn default_mail() -> MailConfig {
    MailConfig {
        provider: MailProvider::default(),
        from: None,
        to: None,
        postmark_token: None,
        message_stream: default_message_stream(),
        smtp_host: None,
        smtp_port: default_smtp_port(),
        smtp_user: None,
        smtp_pass: None,
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            storage: StorageBackend::default(),
            http_timeout_secs: default_http_timeout_secs(),
            cron_secret: None,
            sweep_schedule: None,
            sweep_timezone: None,
            reed: default_reed(),
            adzuna: default_adzuna(),
            mail: default_mail(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CollectorConfig {
    /// Overlay secrets and deployment values from the environment.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = non_blank(lookup("REED_API_KEY")) {
            self.reed.api_key = Some(v);
        }
        if let Some(v) = non_blank(lookup("ADZUNA_APP_ID")) {
            self.adzuna.app_id = Some(v);
        }
        if let Some(v) = non_blank(lookup("ADZUNA_APP_KEY")) {
            self.adzuna.app_key = Some(v);
        }
        if let Some(v) = non_blank(lookup("POSTMARK_SERVER_TOKEN")) {
            self.mail.postmark_token = Some(v);
        }
        if let Some(v) = non_blank(lookup("EMAIL_FROM")) {
            self.mail.from = Some(v);
        }
        if let Some(v) = non_blank(lookup("EMAIL_TO")) {
            self.mail.to = Some(v);
        }
        if let Some(v) = non_blank(lookup("SMTP_HOST")) {
            self.mail.smtp_host = Some(v);
        }
        if let Some(v) = non_blank(lookup("SMTP_PORT")) {
            match v.trim().parse() {
                Ok(port) => self.mail.smtp_port = port,
                Err(_) => tracing::warn!("Ignoring invalid SMTP_PORT '{}'", v),
            }
        }
        if let Some(v) = non_blank(lookup("SMTP_USER")) {
            self.mail.smtp_user = Some(v);
        }
        if let Some(v) = non_blank(lookup("SMTP_PASS")) {
            self.mail.smtp_pass = Some(v);
        }
        if let Some(v) = non_blank(lookup("CRON_SECRET")) {
            self.cron_secret = Some(v);
        }
        if let Some(v) = non_blank(lookup("EMAIL_PROVIDER")) {
            match v.to_ascii_lowercase().as_str() {
                "postmark" => self.mail.provider = MailProvider::Postmark,
                "smtp" => self.mail.provider = MailProvider::Smtp,
                "log" => self.mail.provider = MailProvider::Log,
                other => tracing::warn!("Ignoring unknown EMAIL_PROVIDER '{}'", other),
            }
        }
    }

    /// Reject settings that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if let Some(ref schedule) = self.sweep_schedule {
            use std::str::FromStr;
            croner::Cron::from_str(schedule).map_err(|e| {
                CollectorError::Validation(format!(
                    "Invalid sweep_schedule '{}': {}",
                    schedule, e
                ))
            })?;
        }
        if let Some(ref tz) = self.sweep_timezone {
            tz.parse::<chrono_tz::Tz>().map_err(|_| {
                CollectorError::Validation(format!("Invalid sweep_timezone '{}'", tz))
            })?;
        }
        if self.mail.provider == MailProvider::Postmark {
            if self.mail.postmark_token.is_none() {
                return Err(CollectorError::Validation(
                    "mail.postmark_token (or POSTMARK_SERVER_TOKEN) is required for postmark"
                        .to_string(),
                ));
            }
            if self.mail.from.is_none() || self.mail.to.is_none() {
                return Err(CollectorError::Validation(
                    "mail.from and mail.to are required for postmark".to_string(),
                ));
            }
        }
        if self.mail.provider == MailProvider::Smtp {
            let missing: Vec<&str> = [
                ("mail.smtp_host", &self.mail.smtp_host),
                ("mail.smtp_user", &self.mail.smtp_user),
                ("mail.smtp_pass", &self.mail.smtp_pass),
                ("mail.from", &self.mail.from),
                ("mail.to", &self.mail.to),
            ]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key)
            .collect();
            if !missing.is_empty() {
                return Err(CollectorError::Validation(format!(
                    "smtp mail provider requires {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}
