//! Flags shared by commands talking to a remote registry

use crate::registry::auth::Credentials;
use crate::registry::{Reference, RemoteOptions, Repository};
use crate::Result;
use clap::{Args, ValueEnum};

/// Distribution spec behavior of the target registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DistributionSpec {
    /// Registry serves the referrers API
    #[value(name = "v1.1-referrers-api")]
    ReferrersApi,
    /// Referrers are tracked through a tag schema
    #[value(name = "v1.1-referrers-tag")]
    ReferrersTag,
}

/// Remote registry flags
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Allow insecure connections to registry without SSL
    #[arg(long)]
    pub plain_http: bool,

    /// Registry username
    #[arg(short, long, env = "ORAS_USERNAME")]
    pub username: Option<String>,

    /// Registry password or identity token
    #[arg(short, long, env = "ORAS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Set the distribution spec behavior of the registry
    #[arg(long, value_enum)]
    pub distribution_spec: Option<DistributionSpec>,
}

impl RemoteArgs {
    /// Referrers API support implied by `--distribution-spec`
    pub fn referrers_api(&self) -> Option<bool> {
        self.distribution_spec
            .map(|spec| spec == DistributionSpec::ReferrersApi)
    }

    /// Parse `raw` and connect to its repository
    pub fn repository(&self, raw: &str) -> Result<Repository> {
        let reference = Reference::parse(raw)?;
        let options = RemoteOptions {
            plain_http: self.plain_http,
            credentials: Credentials::new(self.username.clone(), self.password.clone()),
        };
        Repository::new(&reference, options)
    }
}
