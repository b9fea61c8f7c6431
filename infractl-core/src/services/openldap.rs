use crate::{
    config::{BootstrapConfig, RepositorySource},
    remediation::RemediationJob,
    values::{openldap::build_openldap_values, ServiceValues, ValuesError},
};

use super::{SecretRef, TargetService};

pub const OPENLDAP_REPOSITORY_NAME: &str = "helm-openldap";
pub const OPENLDAP_REPOSITORY_URL: &str = "https://jp-gouin.github.io/helm-openldap/";
pub const OPENLDAP_CHART: &str = "helm-openldap/openldap-stack-ha";
pub const OPENLDAP_RELEASE_NAME: &str = "ldap";

/// The chart keeps the admin password in a secret named after the release.
pub const ADMIN_PASSWORD_FIELD: &str = "LDAP_ADMIN_PASSWORD";

/// Directory service (`openldap-stack-ha`) with the `memberof` overlay enabled.
#[derive(Debug, Clone, Default)]
pub struct OpenLdapService;

impl TargetService for OpenLdapService {
    fn name(&self) -> &'static str {
        "openldap"
    }

    fn default_repository(&self) -> RepositorySource {
        RepositorySource::new(OPENLDAP_REPOSITORY_NAME, OPENLDAP_REPOSITORY_URL, OPENLDAP_CHART)
    }

    fn default_release_name(&self) -> &'static str {
        OPENLDAP_RELEASE_NAME
    }

    fn build_values(&self, config: &BootstrapConfig) -> Result<ServiceValues, ValuesError> {
        build_openldap_values(config)
    }

    fn remediation(&self, config: &BootstrapConfig) -> Option<RemediationJob> {
        Some(RemediationJob::memberof(config))
    }

    fn credential_secret(&self, config: &BootstrapConfig) -> Option<SecretRef> {
        Some(SecretRef {
            name: config.release_name.to_owned(),
            field: ADMIN_PASSWORD_FIELD,
        })
    }

    fn follow_up(&self, config: &BootstrapConfig) -> Vec<String> {
        let namespace = &config.namespace;
        let release = &config.release_name;
        let base_dn = config.base_identifier();
        let admin_dn = config.admin_dn();

        vec![
            "Watch the rollout:".to_owned(),
            format!("  kubectl -n {namespace} get pods -l app.kubernetes.io/instance={release}"),
            format!("  kubectl -n {namespace} logs job/{release}-memberof-setup -f"),
            String::new(),
            "Test the directory from inside the cluster:".to_owned(),
            format!(
                "  kubectl -n {namespace} exec statefulset/{release} -- ldapsearch -x \
                 -H ldap://{release}:389 -D {admin_dn} -w \"$LDAP_ADMIN_PASSWORD\" -b '{base_dn}' -s base"
            ),
            String::new(),
            "Access from this machine:".to_owned(),
            format!("  kubectl -n {namespace} port-forward svc/{release}-phpldapadmin 9876:80"),
            format!("  kubectl -n {namespace} port-forward svc/{release} 3890:389"),
            "  phpLDAPadmin: http://localhost:9876".to_owned(),
            format!("  LDAP: ldap://localhost:3890 (base DN '{base_dn}', bind DN '{admin_dn}')"),
        ]
    }
}
