use crate::backend::Backend;
use agent_utils::json_display;
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Copy, Clone, Debug)]
pub(crate) enum Listing {
    Plans,
    Regions,
    Images,
    Keys,
}

impl Listing {
    fn what(self) -> &'static str {
        match self {
            Listing::Plans => "plans",
            Listing::Regions => "regions",
            Listing::Images => "images",
            Listing::Keys => "SSH keys",
        }
    }
}

/// Print one of the provider's informational listings.
#[derive(Debug, Parser)]
pub(crate) struct Catalog {
    /// Output the listing in JSON format.
    #[clap(long)]
    json: bool,
}

impl Catalog {
    pub(crate) async fn run(self, backend: &Backend, listing: Listing) -> Result<()> {
        let provider = backend.provider();
        let entries = match listing {
            Listing::Plans => provider.show_plans().await,
            Listing::Regions => provider.show_regions().await,
            Listing::Images => provider.show_images().await,
            Listing::Keys => provider.show_keys().await,
        }
        .context(format!("Unable to list {}", listing.what()))?;

        if self.json {
            println!("{}", json_display(&entries));
        } else {
            for entry in &entries {
                println!("{:<24} {}", entry.id, entry.description);
            }
        }
        Ok(())
    }
}
