use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{BootstrapConfig, GitLabConfig, SmtpConfig};

use super::{ServiceValues, ValuesError};

pub const SECRET_PASSWORD_KEY: &str = "password";
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";
pub const CLUSTER_ISSUER: &str = "letsencrypt-prod";

pub fn root_password_secret_name(release_name: &str) -> String {
    format!("{release_name}-initial-root-password")
}

pub fn smtp_password_secret_name(release_name: &str) -> String {
    format!("{release_name}-smtp-password")
}

/// Parameters of the `gitlab/gitlab` chart this tool sets.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GitLabValues {
    global: Global,
    gitlab: Components,
    postgresql: Postgresql,
    redis: Redis,
    minio: Persisted,
    certmanager: Install,
    #[serde(rename = "certmanager-issuer", skip_serializing_if = "Option::is_none")]
    certmanager_issuer: Option<Issuer>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Global {
    hosts: Hosts,
    ingress: Ingress,
    initial_root_password: SecretKeyRef,
    gitaly: Enabled,
    minio: Enabled,
    #[serde(skip_serializing_if = "Option::is_none")]
    smtp: Option<Smtp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<String>,
}

#[derive(Serialize)]
struct Hosts {
    domain: String,
    gitlab: HostName,
}

#[derive(Serialize)]
struct HostName {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Ingress {
    enabled: bool,
    configure_certmanager: bool,
    tls: Enabled,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
struct SecretKeyRef {
    secret: String,
    key: &'static str,
}

#[derive(Serialize)]
struct Enabled {
    enabled: bool,
}

#[derive(Serialize)]
struct Install {
    install: bool,
}

#[derive(Serialize)]
struct Smtp {
    enabled: bool,
    address: String,
    port: u16,
    user_name: String,
    password: SecretKeyRef,
    authentication: &'static str,
    starttls_auto: bool,
}

#[derive(Serialize)]
struct Email {
    from: String,
    display_name: String,
}

#[derive(Serialize)]
struct Issuer {
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Components {
    webservice: Workload,
    sidekiq: Workload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Workload {
    replica_count: u32,
    resources: Resources,
}

#[derive(Serialize)]
struct Resources {
    requests: Quantities,
    limits: Quantities,
}

#[derive(Serialize)]
struct Quantities {
    cpu: &'static str,
    memory: &'static str,
}

#[derive(Serialize)]
struct Persistence {
    enabled: bool,
    size: &'static str,
}

#[derive(Serialize)]
struct Persisted {
    persistence: Persistence,
    resources: Resources,
}

#[derive(Serialize)]
struct Postgresql {
    install: bool,
    primary: Persisted,
}

#[derive(Serialize)]
struct Redis {
    install: bool,
    master: Persisted,
}

const fn resources(
    request_cpu: &'static str,
    request_memory: &'static str,
    limit_cpu: &'static str,
    limit_memory: &'static str,
) -> Resources {
    Resources {
        requests: Quantities {
            cpu: request_cpu,
            memory: request_memory,
        },
        limits: Quantities {
            cpu: limit_cpu,
            memory: limit_memory,
        },
    }
}

const fn persisted(size: &'static str, resources: Resources) -> Persisted {
    Persisted {
        persistence: Persistence {
            enabled: true,
            size,
        },
        resources,
    }
}

fn smtp_values(release_name: &str, smtp: &SmtpConfig) -> (Smtp, Email) {
    (
        Smtp {
            enabled: true,
            address: smtp.host.trim().to_owned(),
            port: smtp.port,
            user_name: smtp.user.to_owned(),
            password: SecretKeyRef {
                secret: smtp_password_secret_name(release_name),
                key: SECRET_PASSWORD_KEY,
            },
            authentication: "login",
            starttls_auto: true,
        },
        Email {
            from: smtp.from.to_owned(),
            display_name: smtp.from_name.to_owned(),
        },
    )
}

pub fn build_gitlab_values(
    config: &BootstrapConfig,
    gitlab: &GitLabConfig,
) -> Result<ServiceValues, ValuesError> {
    let (smtp, email) = gitlab
        .smtp
        .as_ref()
        .map(|smtp| smtp_values(&config.release_name, smtp))
        .unzip();

    let issuer_email = gitlab.issuer_email().filter(|_| gitlab.https);
    let annotations = match issuer_email {
        Some(_) => BTreeMap::from([(CLUSTER_ISSUER_ANNOTATION, CLUSTER_ISSUER)]),
        None => BTreeMap::new(),
    };

    ServiceValues::from_schema(&GitLabValues {
        global: Global {
            hosts: Hosts {
                domain: config.domain().to_owned(),
                gitlab: HostName {
                    name: gitlab.hostname(config.domain()),
                },
            },
            ingress: Ingress {
                enabled: true,
                configure_certmanager: gitlab.https,
                tls: Enabled {
                    enabled: gitlab.https,
                },
                annotations,
            },
            initial_root_password: SecretKeyRef {
                secret: root_password_secret_name(&config.release_name),
                key: SECRET_PASSWORD_KEY,
            },
            gitaly: Enabled { enabled: true },
            minio: Enabled { enabled: true },
            smtp,
            email,
            storage_class: gitlab.storage_class().map(str::to_owned),
        },
        gitlab: Components {
            webservice: Workload {
                replica_count: 1,
                resources: resources("500m", "1Gi", "1000m", "2Gi"),
            },
            sidekiq: Workload {
                replica_count: 1,
                resources: resources("300m", "512Mi", "500m", "1Gi"),
            },
        },
        postgresql: Postgresql {
            install: true,
            primary: persisted("8Gi", resources("200m", "256Mi", "500m", "512Mi")),
        },
        redis: Redis {
            install: true,
            master: persisted("2Gi", resources("100m", "128Mi", "200m", "256Mi")),
        },
        minio: persisted("10Gi", resources("100m", "128Mi", "200m", "256Mi")),
        certmanager: Install {
            install: gitlab.https,
        },
        certmanager_issuer: issuer_email.map(|email| Issuer {
            email: email.to_owned(),
        }),
    })
}
