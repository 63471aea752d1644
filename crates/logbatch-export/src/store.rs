//! Object store targets

use crate::error::{ExportError, Result};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where exported files are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreTarget {
    /// A directory on the local filesystem; created if absent
    Local { root: PathBuf },
    /// Process-local store, mostly useful in tests
    Memory,
    /// An Azure storage container (Blob or ADLS Gen2).
    ///
    /// Without an access key, credentials come from the `AZURE_*`
    /// environment variables.
    Azure {
        account: String,
        container: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_key: Option<String>,
    },
}

impl Default for StoreTarget {
    fn default() -> Self {
        StoreTarget::Local {
            root: PathBuf::from("./export"),
        }
    }
}

/// Open the object store for a target
pub fn build_store(target: &StoreTarget) -> Result<Arc<dyn ObjectStore>> {
    match target {
        StoreTarget::Local { root } => {
            std::fs::create_dir_all(root)?;
            debug!("Exporting to local directory {}", root.display());
            Ok(Arc::new(LocalFileSystem::new_with_prefix(root)?))
        }
        StoreTarget::Memory => Ok(Arc::new(InMemory::new())),
        StoreTarget::Azure {
            account,
            container,
            access_key,
        } => {
            if account.trim().is_empty() || container.trim().is_empty() {
                return Err(ExportError::Config(
                    "Azure export requires both account and container".to_string(),
                ));
            }

            let mut builder = MicrosoftAzureBuilder::from_env()
                .with_account(account)
                .with_container_name(container);
            if let Some(key) = access_key {
                builder = builder.with_access_key(key);
            }

            debug!("Exporting to Azure container {}/{}", account, container);
            Ok(Arc::new(builder.build()?))
        }
    }
}
