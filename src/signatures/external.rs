use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};
use tracing::debug;

use crate::{core::resolver::SignatureResolver, signatures::table::SignatureTable};

/// Resolves selectors by running `<program> 4 <selector>` (foundry's `cast 4`),
/// falling back to the static table when the process fails or prints nothing.
pub struct ExternalResolver {
    program: PathBuf,
    timeout: Duration,
    fallback: Arc<SignatureTable>,
}

impl ExternalResolver {
    pub fn new(program: PathBuf, timeout: Duration, fallback: Arc<SignatureTable>) -> Self {
        Self {
            program,
            timeout,
            fallback,
        }
    }

    async fn run_lookup(&self, selector: &str) -> Option<String> {
        let output = Command::new(&self.program)
            .arg("4")
            .arg(selector)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match timeout(self.timeout, output).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(str::to_string)
            }
            Ok(Ok(output)) => {
                debug!(selector, status = %output.status, "Signature lookup process failed");
                None
            }
            Ok(Err(e)) => {
                debug!(selector, error = %e, "Signature lookup process could not run");
                None
            }
            Err(_) => {
                debug!(selector, timeout = ?self.timeout, "Signature lookup process timed out");
                None
            }
        }
    }
}

#[async_trait]
impl SignatureResolver for ExternalResolver {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn resolve(&self, selector: &str) -> Option<String> {
        match self.run_lookup(selector).await {
            Some(name) => Some(name),
            None => self.fallback.lookup(selector).map(|entry| entry.name.clone()),
        }
    }
}

/// Locate `program` on `PATH` (or as a direct path when it contains a separator)
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
