use crate::backend::Backend;
use agent_utils::json_display;
use anyhow::{Context, Result};
use clap::Parser;

/// Inspect DNS records.
#[derive(Debug, Parser)]
pub(crate) struct Dns {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// List all records of a domain.
    Records(Records),
}

impl Dns {
    pub(crate) async fn run(self, backend: &Backend) -> Result<()> {
        match self.command {
            Command::Records(records) => records.run(backend).await,
        }
    }
}

#[derive(Debug, Parser)]
struct Records {
    /// The domain (DNS zone) to list.
    domain: String,
    /// Output the records in JSON format.
    #[clap(long)]
    json: bool,
}

impl Records {
    async fn run(self, backend: &Backend) -> Result<()> {
        let records = backend
            .dns()?
            .domain_records(&self.domain)
            .await
            .context(format!("Unable to list the records of '{}'", self.domain))?;
        if self.json {
            println!("{}", json_display(&records));
        } else {
            for record in &records {
                println!("{:<6} {:<48} {}", record.record_type, record.name, record.content);
            }
        }
        Ok(())
    }
}
