/*!

In-memory stand-ins for the collaborators of the orchestrator so that the multi-node workflows can
be tested without a cloud account, DNS zone or reachable machines.

[`MockRemote`] simulates the file system of every node and understands the handful of commands the
workflows issue. [`MockProvider`] hands out instances and registers each of them as a node of the
shared [`MockRemote`].

!*/

#![allow(dead_code)]

pub(crate) mod provider;
pub(crate) mod remote;

pub(crate) use provider::{MockDiscovery, MockDns, MockProvider};
pub(crate) use remote::MockRemote;
