/*!

Fakes for the collaborators a backend is handed: a remote executor that answers every probe and a
DNS provider that only records what it was asked to do.

!*/

#![allow(dead_code)]

use cluster_agent::provider::{DnsRecord, RecordType};
use cluster_agent::{DnsProvider, ProviderResult, RemoteExec};
use std::sync::Mutex;

/// Answers every command with a fixed machine ID.
#[derive(Debug, Default)]
pub(crate) struct ReachableRemote {
    pub(crate) hosts: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl RemoteExec for ReachableRemote {
    async fn run(
        &self,
        host: &str,
        _command: &str,
        _stdin: &str,
        _sudo: bool,
    ) -> ProviderResult<String> {
        self.hosts.lock().unwrap().push(host.to_string());
        Ok("0123456789abcdef\n".to_string())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingDns {
    pub(crate) created: Mutex<Vec<(RecordType, String, String)>>,
    pub(crate) deleted: Mutex<Vec<(RecordType, String, Option<String>)>>,
}

#[async_trait::async_trait]
impl DnsProvider for RecordingDns {
    async fn domain_records(&self, _domain: &str) -> ProviderResult<Vec<DnsRecord>> {
        Ok(Vec::new())
    }

    async fn create_record(
        &self,
        _domain: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
    ) -> ProviderResult<()> {
        self.created
            .lock()
            .unwrap()
            .push((record_type, name.to_string(), content.to_string()));
        Ok(())
    }

    async fn delete_records(
        &self,
        _domain: &str,
        record_type: RecordType,
        name: &str,
        content: Option<&str>,
    ) -> ProviderResult<()> {
        self.deleted.lock().unwrap().push((
            record_type,
            name.to_string(),
            content.map(str::to_string),
        ));
        Ok(())
    }
}
