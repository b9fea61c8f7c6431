use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use infractl_core::{
    config::gitlab::DEFAULT_SMTP_PORT, package::DEFAULT_INSTALL_TIMEOUT,
    DEFAULT_KUBECONFIG_PATH, DEFAULT_NAMESPACE,
};
use log::LevelFilter;

pub const ADMIN_PASSWORD_ENV: &str = "INFRACTL_ADMIN_PASSWORD";
pub const CONFIG_PASSWORD_ENV: &str = "INFRACTL_CONFIG_PASSWORD";
pub const SMTP_PASSWORD_ENV: &str = "INFRACTL_SMTP_PASSWORD";

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// kubernetes namespace to install into
    #[arg(short = 'n', long, global = true, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// kubeconfig used for every cluster call
    #[arg(long, global = true, default_value = DEFAULT_KUBECONFIG_PATH)]
    pub kube_config: PathBuf,
    /// use the in-cluster configuration instead of a kubeconfig file
    #[arg(long, global = true, conflicts_with = "kube_config")]
    pub in_cluster: bool,
    /// kubectl (or k3s) executable, defaults to the k3s binary next to infractl
    #[arg(long, global = true)]
    pub kubectl: Option<PathBuf>,
    /// helm executable, defaults to 'helm' from PATH
    #[arg(long, global = true)]
    pub helm: Option<PathBuf>,
    /// override the repository registration file
    #[arg(long, global = true)]
    pub repository_config: Option<PathBuf>,
    /// override the repository cache directory
    #[arg(long, global = true)]
    pub repository_cache: Option<PathBuf>,
    /// ceiling for the whole install, in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_INSTALL_TIMEOUT.as_secs())]
    pub install_timeout: u64,
    /// print the retrieved credential once the bootstrap is done
    #[arg(long, global = true)]
    pub show_credentials: bool,
    /// enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose_logging: bool,
    /// enable trace output (more detailed than verbose, overrides it if present)
    #[arg(long = "trace", global = true)]
    pub trace_logging: bool,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> LogLevel {
        if self.trace_logging {
            return LogLevel::Trace;
        }

        if self.verbose_logging {
            return LogLevel::Verbose;
        }

        LogLevel::Normal
    }

    pub fn kubeconfig(&self) -> Option<PathBuf> {
        match self.in_cluster {
            true => None,
            false => Some(self.kube_config.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Normal,
    Verbose,
    Trace,
}

/// Log targets of the binary and the pipeline crate.
pub const LOG_TARGETS: [&str; 2] = ["infractl", "infractl_core"];

impl LogLevel {
    /// Level applied to our own targets, everything else stays at `dependencies()`.
    pub fn ours(&self) -> LevelFilter {
        match self {
            LogLevel::Normal => LevelFilter::Info,
            LogLevel::Verbose => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }

    /// kube, hyper and reqwest are only heard from when tracing.
    pub fn dependencies(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Debug,
            _ => LevelFilter::Warn,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// install OpenLDAP with the memberof overlay
    #[command(alias = "ldap")]
    Openldap(OpenLdapArgs),
    /// install GitLab
    Gitlab(GitLabArgs),
    /// register a chart repository and cache its index
    RepoAdd(RepoAddArgs),
}

/// Settings shared by every service, prompted for when left out.
#[derive(Debug, Args)]
pub struct BootstrapArgs {
    /// private IPv4 network of the infrastructure, e.g. 192.168.100.0/24
    #[arg(long)]
    pub network_cidr: Option<String>,
    /// domain the services live in, e.g. example.lab
    #[arg(long)]
    pub domain: Option<String>,
    /// name of the release, defaults to the service's own
    #[arg(long)]
    pub release_name: Option<String>,
    /// name the chart repository is registered under
    #[arg(long)]
    pub repo_name: Option<String>,
    /// chart repository URL
    #[arg(long)]
    pub repo_url: Option<String>,
    /// chart reference (repo/chart) or a local archive path
    #[arg(long)]
    pub chart: Option<String>,
    /// pin the chart version
    #[arg(long)]
    pub chart_version: Option<String>,
}

#[derive(Debug, Args)]
pub struct OpenLdapArgs {
    #[command(flatten)]
    pub bootstrap: BootstrapArgs,
    /// password of cn=admin,<base DN>
    #[arg(long, env = ADMIN_PASSWORD_ENV, hide_env_values = true)]
    pub admin_password: Option<String>,
    /// password of cn=admin,cn=config, the admin password is reused when blank
    #[arg(long, env = CONFIG_PASSWORD_ENV, hide_env_values = true)]
    pub config_password: Option<String>,
}

#[derive(Debug, Args)]
pub struct GitLabArgs {
    #[command(flatten)]
    pub bootstrap: BootstrapArgs,
    /// initial password of the 'root' user
    #[arg(long, env = ADMIN_PASSWORD_ENV, hide_env_values = true)]
    pub root_password: Option<String>,
    /// public hostname, defaults to gitlab.<domain>
    #[arg(long)]
    pub hostname: Option<String>,
    /// serve GitLab over HTTPS with cert-manager issued certificates
    #[arg(long)]
    pub https: bool,
    /// contact email of the certificate issuer
    #[arg(long, requires = "https")]
    pub issuer_email: Option<String>,
    /// storage class for persistent volumes, the cluster default when unset
    #[arg(long)]
    pub storage_class: Option<String>,
    #[command(flatten)]
    pub smtp: SmtpArgs,
}

/// Outgoing mail, only enabled when a host is given.
#[derive(Debug, Args)]
pub struct SmtpArgs {
    /// SMTP server host
    #[arg(long)]
    pub smtp_host: Option<String>,
    /// SMTP server port
    #[arg(long, default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,
    /// SMTP user name
    #[arg(long, default_value = "")]
    pub smtp_user: String,
    /// SMTP password
    #[arg(long, env = SMTP_PASSWORD_ENV, hide_env_values = true, default_value = "")]
    pub smtp_password: String,
    /// sender address, defaults to gitlab@<domain>
    #[arg(long)]
    pub smtp_from: Option<String>,
    /// sender display name
    #[arg(long, default_value = "GitLab")]
    pub smtp_from_name: String,
}

#[derive(Debug, Args)]
pub struct RepoAddArgs {
    /// name to register the repository under
    pub name: String,
    /// repository URL (http, https or file)
    pub url: String,
}
