use serde::Serialize;

use super::Credential;

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Outgoing mail settings, mail delivery is disabled without them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Credential,
    pub from: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLabConfig {
    /// Defaults to `gitlab.<domain>`.
    pub hostname: Option<String>,
    pub https: bool,
    /// Contact address for the certificate issuer.
    pub issuer_email: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub storage_class: Option<String>,
}

impl GitLabConfig {
    pub fn hostname(&self, domain: &str) -> String {
        match self.hostname.as_deref().map(str::trim) {
            Some(hostname) if !hostname.is_empty() => hostname.to_owned(),
            _ => format!("gitlab.{domain}"),
        }
    }

    pub fn issuer_email(&self) -> Option<&str> {
        self.issuer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.storage_class
            .as_deref()
            .map(str::trim)
            .filter(|class| !class.is_empty())
    }

    pub fn url(&self, domain: &str) -> String {
        let scheme = if self.https { "https" } else { "http" };

        format!("{scheme}://{}", self.hostname(domain))
    }
}
