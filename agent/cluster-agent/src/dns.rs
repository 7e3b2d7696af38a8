use crate::error::ProviderResult;
use crate::provider::{DnsProvider, RecordType};
use log::{info, warn};
use meshfleet_model::ClusterInfo;

/// Publishes the records of one instance: `A` (and `AAAA` when an IPv6 address is known) for the
/// instance name, plus the instance's IPv4 in the cluster-wide round-robin `A` record.
pub async fn register_instance(
    dns: &dyn DnsProvider,
    cluster: &ClusterInfo,
    instance_name: &str,
    public_ipv4: &str,
    public_ipv6: Option<&str>,
) -> ProviderResult<()> {
    info!("Registering DNS records for '{}'", instance_name);
    dns.create_record(&cluster.domain, RecordType::A, instance_name, public_ipv4)
        .await?;
    if let Some(ipv6) = public_ipv6.filter(|ip| !ip.is_empty()) {
        dns.create_record(&cluster.domain, RecordType::AAAA, instance_name, ipv6)
            .await?;
    }
    dns.create_record(&cluster.domain, RecordType::A, &cluster.id(), public_ipv4)
        .await?;
    Ok(())
}

/// Removes what [`register_instance`] published. Every removal is attempted; the first failure is
/// returned afterwards.
pub async fn unregister_instance(
    dns: &dyn DnsProvider,
    cluster: &ClusterInfo,
    instance_name: &str,
    public_ipv4: Option<&str>,
) -> ProviderResult<()> {
    info!("Removing DNS records for '{}'", instance_name);
    let mut results = vec![
        dns.delete_records(&cluster.domain, RecordType::A, instance_name, None)
            .await,
        dns.delete_records(&cluster.domain, RecordType::AAAA, instance_name, None)
            .await,
    ];
    if let Some(ipv4) = public_ipv4.filter(|ip| !ip.is_empty()) {
        results.push(
            dns.delete_records(&cluster.domain, RecordType::A, &cluster.id(), Some(ipv4))
                .await,
        );
    }

    let mut first_error = None;
    for result in results {
        if let Err(e) = result {
            warn!("Unable to remove a DNS record of '{}': {}", instance_name, e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
