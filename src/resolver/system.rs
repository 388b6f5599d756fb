//! TXT lookups against real DNS through hickory-resolver.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolveHosts, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use tracing::{debug, info};

use super::TxtResolver;
use crate::config::VerifyConfig;
use crate::context::Context;
use crate::error::BoxError;

/// Production resolver backed by the system or configured nameservers.
pub struct SystemTxtResolver {
    resolver: TokioResolver,
}

impl SystemTxtResolver {
    pub fn new(config: &VerifyConfig) -> Result<Self, BoxError> {
        let (resolver_config, mut opts) = if config.nameservers.is_empty() {
            hickory_resolver::system_conf::read_system_conf()?
        } else {
            let mut resolver_config = ResolverConfig::new();
            for addr in &config.nameservers {
                resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
                resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
            }
            (resolver_config, ResolverOpts::default())
        };

        opts.attempts = config.attempts;
        opts.timeout = config.lookup_timeout;
        opts.use_hosts_file = if config.use_hosts_file {
            ResolveHosts::Auto
        } else {
            ResolveHosts::Never
        };

        info!(
            "TXT resolver initialized with {} nameservers",
            resolver_config.name_servers().len()
        );

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Ok(Self { resolver })
    }
}

#[async_trait]
impl TxtResolver for SystemTxtResolver {
    async fn lookup_txt(&self, ctx: &Context, name: &str) -> Result<Vec<String>, BoxError> {
        let fqdn = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{}.", name)
        };

        let lookup = tokio::select! {
            err = ctx.done() => return Err(Box::new(err)),
            result = self.resolver.txt_lookup(fqdn) => result,
        };

        let lookup = match lookup {
            Ok(lookup) => lookup,
            Err(e) if e.is_no_records_found() => {
                debug!("No TXT records for {}", name);
                return Ok(vec![]);
            }
            Err(e) => return Err(Box::new(e)),
        };

        // Character-strings of one record are concatenated into a single value
        let records: Vec<String> = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect();

        debug!("Resolved {} TXT records for {}", records.len(), name);
        Ok(records)
    }
}
