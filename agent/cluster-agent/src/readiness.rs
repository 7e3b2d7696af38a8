/*!

Readiness polling for freshly created instances. An instance is ready once the backend reports it
active *and* it answers a remote command; until then the backend is asked again after a fixed
interval.

!*/

use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::remote::{InstanceExt, RemoteExec};
use log::{debug, trace, warn};
use meshfleet_model::constants::DEFAULT_READINESS_INTERVAL_SECS;
use meshfleet_model::ClusterInstance;
use std::future::Future;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReadinessPolicy {
    /// Pause between two polls.
    pub interval: Duration,
    /// Give up with [`ErrorKind::Timeout`] after this many polls. `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_READINESS_INTERVAL_SECS),
            max_attempts: None,
        }
    }
}

impl ReadinessPolicy {
    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }
}

/// Polls until `instance_name` is ready and returns its final descriptor.
///
/// `poll` asks the backend for the instance's state: `Ok(None)` while it is not active yet,
/// `Ok(Some(instance))` once it is. Errors from `poll` are hard failures and are returned
/// immediately. A failing machine-ID probe on an active instance is retried.
pub async fn wait_until_ready<F, Fut>(
    policy: &ReadinessPolicy,
    remote: &dyn RemoteExec,
    instance_name: &str,
    mut poll: F,
) -> ProviderResult<ClusterInstance>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<Option<ClusterInstance>>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match poll().await? {
            Some(instance) => match instance.machine_id(remote).await {
                Ok(machine_id) => {
                    debug!(
                        "Instance '{}' is reachable with machine ID '{}' after {} poll(s)",
                        instance_name, machine_id, attempts
                    );
                    return Ok(instance);
                }
                Err(e) => debug!(
                    "Instance '{}' is active but not reachable yet: {}",
                    instance_name, e
                ),
            },
            None => trace!("Instance '{}' is not active yet", instance_name),
        }

        if let Some(max_attempts) = policy.max_attempts {
            if attempts >= max_attempts {
                warn!(
                    "Giving up on instance '{}' after {} poll(s)",
                    instance_name, attempts
                );
                return Err(ProviderError::new_with_context(
                    ErrorKind::Timeout,
                    format!(
                        "Instance '{}' did not become ready within {} poll(s)",
                        instance_name, attempts
                    ),
                ));
            }
        }
        tokio::time::sleep(policy.interval).await;
    }
}
