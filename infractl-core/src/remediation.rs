use log::{debug, info};
use thiserror::Error;

use crate::{
    config::{BootstrapConfig, Credential},
    kubernetes::{ClusterGateway, GatewayError},
};

/// Enables the `memberof` and `refint` overlays of a freshly installed directory.
pub const MEMBEROF_JOB_TEMPLATE: &str = include_str!("../assets/memberof-job.yaml.tmpl");

const PLACEHOLDER_START: &str = "{{";
const PLACEHOLDER_END: &str = "}}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Manifest template has an unresolved placeholder '{}'!", .0)]
    UnresolvedPlaceholder(String),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Couldn't generate the {} manifest! Reason: {}", .0, .1)]
    Generate(&'static str, serde_yaml::Error),
    #[error("{}", .0)]
    Render(RenderError),
    #[error("Couldn't apply the {} manifest! Reason: {}", .0, .1)]
    Apply(&'static str, GatewayError),
}

/// Values substituted into a remediation template.
#[derive(Debug, Clone)]
pub struct RemediationBindings {
    pub release_name: String,
    pub namespace: String,
    pub base_dn: String,
    pub admin_password: Credential,
    pub config_password: Credential,
}

impl RemediationBindings {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            release_name: config.release_name.to_owned(),
            namespace: config.namespace.to_owned(),
            base_dn: config.base_identifier().to_string(),
            admin_password: config.admin_credential.clone(),
            config_password: config.config_credential().clone(),
        }
    }

    fn pairs(&self) -> [(&'static str, String); 5] {
        [
            ("release_name", self.release_name.to_owned()),
            ("namespace", self.namespace.to_owned()),
            ("base_dn", escape_double_quoted(&self.base_dn)),
            ("admin_password", escape_double_quoted(self.admin_password.expose())),
            ("config_password", escape_double_quoted(self.config_password.expose())),
        ]
    }
}

/// A one-shot post-install job, rendered from a manifest template.
#[derive(Debug, Clone)]
pub struct RemediationJob {
    pub name: &'static str,
    pub template: &'static str,
    pub bindings: RemediationBindings,
}

impl RemediationJob {
    pub fn memberof(config: &BootstrapConfig) -> Self {
        Self {
            name: "memberof-setup",
            template: MEMBEROF_JOB_TEMPLATE,
            bindings: RemediationBindings::from_config(config),
        }
    }

    pub fn render(&self) -> Result<String, RenderError> {
        render_template(self.template, &self.bindings.pairs())
    }
}

/// Makes the value safe to place between double quotes in a YAML document.
fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }

    escaped
}

/// Replaces every `{{key}}` of the template with its binding in a single pass.
/// Bound values are copied verbatim, placeholders only count when they come from the template.
pub fn render_template(template: &str, bindings: &[(&str, String)]) -> Result<String, RenderError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(PLACEHOLDER_START) {
        rendered.push_str(&rest[..start]);

        let after_start = &rest[start + PLACEHOLDER_START.len()..];
        let end = after_start
            .find(PLACEHOLDER_END)
            .ok_or_else(|| RenderError::UnresolvedPlaceholder(PLACEHOLDER_START.to_owned()))?;
        let key = &after_start[..end];

        let value = bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                RenderError::UnresolvedPlaceholder(format!(
                    "{PLACEHOLDER_START}{key}{PLACEHOLDER_END}"
                ))
            })?;

        rendered.push_str(value);
        rest = &after_start[end + PLACEHOLDER_END.len()..];
    }

    rendered.push_str(rest);

    Ok(rendered)
}

pub async fn apply_remediation(
    gateway: &impl ClusterGateway,
    job: &RemediationJob,
) -> Result<(), ManifestError> {
    info!("Applying the {} job...", job.name);

    let manifest = job.render().map_err(ManifestError::Render)?;

    debug!(
        "Rendered {} job for release '{}' in '{}'",
        job.name, job.bindings.release_name, job.bindings.namespace
    );

    gateway
        .apply_manifest(&manifest)
        .await
        .map_err(|error| ManifestError::Apply(job.name, error))
}
