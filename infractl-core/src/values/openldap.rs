use serde::Serialize;

use crate::config::BootstrapConfig;

use super::{ImageOnly, ImageValues, ServiceValues, ValuesError};

pub const OPENLDAP_IMAGE: ImageValues =
    ImageValues::cached("docker.io/jpgouin/openldap", "2.6.9-fix");
pub const INIT_SCHEMA_IMAGE: ImageValues =
    ImageValues::cached("docker.io/library/debian", "latest");
pub const INIT_TLS_SECRET_IMAGE: ImageValues =
    ImageValues::cached("docker.io/alpine/openssl", "latest");
pub const LTB_PASSWD_IMAGE: ImageValues =
    ImageValues::cached("docker.io/tiredofit/self-service-password", "5.2.3");
pub const PHPLDAPADMIN_IMAGE: ImageValues =
    ImageValues::cached("docker.io/osixia/phpldapadmin", "0.9.0");

/// Parameters of the `openldap-stack-ha` chart this tool sets.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenLdapValues {
    global: Global,
    env: Env,
    image: ImageValues,
    init_schema: ImageOnly,
    #[serde(rename = "initTLSSecret")]
    init_tls_secret: ImageOnly,
    #[serde(rename = "ltb-passwd")]
    ltb_passwd: ImageOnly,
    phpldapadmin: ImageOnly,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Global {
    ldap_domain: String,
    admin_password: String,
    config_password: String,
}

#[derive(Serialize)]
struct Env {
    #[serde(rename = "LDAP_ROOT")]
    ldap_root: String,
}

pub fn build_openldap_values(config: &BootstrapConfig) -> Result<ServiceValues, ValuesError> {
    ServiceValues::from_schema(&OpenLdapValues {
        global: Global {
            ldap_domain: config.domain().to_owned(),
            admin_password: config.admin_credential.expose().to_owned(),
            config_password: config.config_credential().expose().to_owned(),
        },
        env: Env {
            ldap_root: config.base_identifier().to_string(),
        },
        image: OPENLDAP_IMAGE,
        init_schema: ImageOnly {
            image: INIT_SCHEMA_IMAGE,
        },
        init_tls_secret: ImageOnly {
            image: INIT_TLS_SECRET_IMAGE,
        },
        ltb_passwd: ImageOnly {
            image: LTB_PASSWD_IMAGE,
        },
        phpldapadmin: ImageOnly {
            image: PHPLDAPADMIN_IMAGE,
        },
    })
}
