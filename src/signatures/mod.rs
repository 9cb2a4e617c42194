pub mod external;
pub mod table;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{config::SignaturesConfig, core::resolver::SignatureResolver};
use external::{ExternalResolver, find_program};
use table::SignatureTable;

/// Resolves selectors from the static table only
pub struct TableResolver {
    table: Arc<SignatureTable>,
}

impl TableResolver {
    pub fn new(table: Arc<SignatureTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl SignatureResolver for TableResolver {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn resolve(&self, selector: &str) -> Option<String> {
        self.table.lookup(selector).map(|entry| entry.name.clone())
    }
}

/// Pick the resolver once at startup.
///
/// The external program is probed here and never again; when it is missing
/// every lookup goes straight to the table.
pub fn select_resolver(
    cfg: &SignaturesConfig,
    table: Arc<SignatureTable>,
) -> Arc<dyn SignatureResolver> {
    if !cfg.external_lookup {
        info!("🔖 External signature lookup disabled, using signature table");
        return Arc::new(TableResolver::new(table));
    }

    match find_program(&cfg.program) {
        Some(program) => {
            info!(program = %program.display(), "🔖 Using external signature lookup with table fallback");
            Arc::new(ExternalResolver::new(
                program,
                Duration::from_secs(cfg.lookup_timeout_secs.max(1)),
                table,
            ))
        }
        None => {
            warn!(
                program = %cfg.program,
                "⚠️ Signature lookup program not found (install foundry for `cast`), using signature table only"
            );
            Arc::new(TableResolver::new(table))
        }
    }
}
