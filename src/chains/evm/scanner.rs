use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    sync::{
        broadcast::{
            self,
            error::{RecvError, TryRecvError},
        },
        mpsc,
    },
    task::JoinSet,
    time::{Instant, sleep},
};
use tracing::{debug, error, info, warn};

use crate::{
    chains::evm::{context::EvmScannerContext, worker::BlockWorker},
    core::{
        aggregate::{collect_records, sort_records},
        partition::partition_range,
        scanner::Scanner,
        types::{ScanOutcome, ScanSummary, TxRecord},
    },
};

pub struct EvmScanner {
    context: EvmScannerContext,
}

impl EvmScanner {
    pub fn new(context: EvmScannerContext) -> Self {
        Self { context }
    }

    /// Print final scan status
    pub fn print_summary(summary: &ScanSummary) {
        info!("📊 Scan summary:");
        info!("  └─ Contract: {}", summary.contract);
        info!(
            "  └─ Range: {} - {}",
            summary.start_block, summary.end_block
        );
        info!(
            "  └─ Batches: {}/{} completed",
            summary.batches_completed, summary.batches_launched
        );
        info!("  └─ Blocks scanned: {}", summary.blocks_scanned);
        if summary.blocks_skipped > 0 {
            info!("  └─ Blocks skipped: {}", summary.blocks_skipped);
        }
        if summary.receipts_skipped > 0 {
            info!("  └─ Receipts skipped: {}", summary.receipts_skipped);
        }
        info!("  └─ Matching transactions: {}", summary.records);
        info!("  └─ Elapsed: {:?}", summary.elapsed);
        if summary.interrupted {
            warn!("  └─ Interrupted by shutdown, results are partial");
        }
    }
}

/// Non-blocking shutdown check used between worker launches.
///
/// A closed channel means nobody can ask for shutdown anymore; `listening` is cleared.
fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>, listening: &mut bool) -> bool {
    match shutdown.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Closed) => {
            *listening = false;
            false
        }
        Err(TryRecvError::Empty) => false,
    }
}

/// Launch one worker per batch, then wait for all of them.
///
/// Owns the original result sender and drops it only once every worker is
/// joined, so the collector sees the end of the stream exactly then.
async fn supervise(
    context: EvmScannerContext,
    output: mpsc::Sender<TxRecord>,
    mut shutdown: broadcast::Receiver<()>,
) -> ScanSummary {
    let request = context.request.clone();
    let mut summary = ScanSummary::new(&request);
    let batches = partition_range(request.start_block, request.end_block, request.concurrency);
    let total_batches = batches.len();
    let progress_step = (total_batches / 10).max(1);
    let stagger = context.settings.launch_stagger;
    let mut listening = true;
    let mut workers = JoinSet::new();

    info!(
        batches = total_batches,
        batch_size = request.concurrency,
        "🔄 Launching workers"
    );

    for batch in batches {
        if listening && shutdown_requested(&mut shutdown, &mut listening) {
            warn!(
                launched = summary.batches_launched,
                "🛑 Shutdown requested, no more workers will be launched"
            );
            summary.interrupted = true;
            workers.abort_all();
            break;
        }

        debug!(
            batch = batch.index,
            start = batch.start,
            end = batch.end,
            "Launching worker"
        );
        workers.spawn(BlockWorker::new(context.clone(), batch, output.clone()).run());
        summary.batches_launched += 1;

        if !stagger.is_zero() {
            sleep(stagger).await;
        }
    }

    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                None => break,
                Some(Ok(stats)) => {
                    summary.absorb(stats);
                    if summary.batches_completed % progress_step == 0 {
                        info!(
                            completed = summary.batches_completed,
                            total = total_batches,
                            blocks = summary.blocks_scanned,
                            "⏳ Scan progress"
                        );
                    }
                }
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => error!(error = %e, "❌ Worker task failed"),
            },
            signal = shutdown.recv(), if listening && !summary.interrupted => match signal {
                Err(RecvError::Closed) => listening = false,
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    warn!("🛑 Shutdown requested, aborting running workers");
                    summary.interrupted = true;
                    workers.abort_all();
                }
            },
        }
    }

    drop(output);
    summary
}

#[async_trait]
impl Scanner for EvmScanner {
    async fn scan(&self, shutdown: broadcast::Receiver<()>) -> Result<ScanOutcome> {
        let request = self.context.request.clone();
        let started = Instant::now();

        if request.is_empty_range() {
            info!(
                start = request.start_block,
                end = request.end_block,
                "Start block is after end block, nothing to scan"
            );
            return Ok(ScanOutcome {
                records: Vec::new(),
                summary: ScanSummary::new(&request),
            });
        }

        info!(
            contract = %request.contract,
            start = request.start_block,
            end = request.end_block,
            status_filter = request.status_filter.as_str(),
            calldata_prefix = request.calldata_prefix.as_ref().map(|p| p.as_hex()).unwrap_or(""),
            "🚀 Scanning block range"
        );

        let (results_tx, results_rx) = mpsc::channel(self.context.settings.channel_capacity.max(1));
        let supervisor = tokio::spawn(supervise(self.context.clone(), results_tx, shutdown));

        let mut records = collect_records(results_rx).await;
        let mut summary = supervisor
            .await
            .map_err(|e| anyhow::anyhow!("Scan supervisor failed: {}", e))?;

        sort_records(&mut records);
        summary.records = records.len();
        summary.elapsed = started.elapsed();

        info!(
            records = summary.records,
            elapsed = ?summary.elapsed,
            "✅ Scan finished"
        );
        Ok(ScanOutcome { records, summary })
    }
}
