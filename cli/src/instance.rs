use crate::backend::Backend;
use crate::cluster::{print_instances, ClusterArgs, InstanceArgs};
use anyhow::{Context, Result};
use clap::Parser;
use cluster_agent::model::{ClusterInstanceInfo, ClusterInstanceList};

/// Add or remove single instances of an existing cluster.
#[derive(Parser)]
pub(crate) struct Instance {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Add an instance to an existing cluster. It joins as a proxy member.
    Create(Create),
    /// Delete an instance and update the roster of the remaining ones.
    Delete(Delete),
}

impl Instance {
    pub(crate) async fn run(self, backend: &Backend) -> Result<()> {
        match self.command {
            Command::Create(create) => create.run(backend).await,
            Command::Delete(delete) => delete.run(backend).await,
        }
    }
}

#[derive(Parser)]
struct Create {
    #[clap(flatten)]
    cluster: ClusterArgs,
    #[clap(flatten)]
    instance: InstanceArgs,
    /// Output the instance in JSON format.
    #[clap(long)]
    json: bool,
}

impl Create {
    async fn run(self, backend: &Backend) -> Result<()> {
        let info = self.cluster.info();
        let options = self.instance.options(info.clone(), 1);
        let instance = backend
            .orchestrator()?
            .add_instance(&options)
            .await
            .context(format!("Unable to add an instance to '{}'", info))?;
        print_instances(&ClusterInstanceList::new(vec![instance]), self.json);
        Ok(())
    }
}

#[derive(Debug, Parser)]
struct Delete {
    #[clap(flatten)]
    cluster: ClusterArgs,
    /// Name of the instance, either fully qualified or relative to the cluster.
    #[clap(long)]
    instance: String,
}

impl Delete {
    async fn run(self, backend: &Backend) -> Result<()> {
        let cluster = self.cluster.info();
        let suffix = format!(".{}", cluster.id());
        let name = if self.instance.ends_with(&suffix) {
            self.instance
        } else {
            format!("{}{}", self.instance, suffix)
        };
        let info = ClusterInstanceInfo { cluster, name };
        backend
            .orchestrator()?
            .delete_instance(&info)
            .await
            .context(format!("Unable to delete instance '{}'", info.name))?;
        println!("Instance '{}' was deleted.", info.name);
        Ok(())
    }
}
