use std::{
    io::{BufWriter, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use contract_tx_scanner::{
    chains::evm::{
        client::EvmClient,
        context::{EvmScannerContext, ScanSettings},
        scanner::EvmScanner,
    },
    cli::Cli,
    config::AppConfig,
    core::{client::ChainClient, report::write_report, scanner::Scanner},
    signatures::{select_resolver, table::SignatureTable},
    utils::{
        logger::init_logger,
        metrics::{NoopScannerMetrics, PrometheusScannerMetrics, ScannerMetrics},
        retry::retry_async,
    },
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let (config_path, config_required) = args.config_source();
    let mut cfg = AppConfig::load(&config_path, config_required)?;
    cfg.apply_cli(&args);

    // Initialize logger system
    init_logger(
        &cfg.logging.level,
        cfg.logging.to_file,
        &cfg.logging.file_path,
    );

    info!("✅ Configuration load successful");
    info!(rpc_url = %cfg.rpc.url, "RPC node");
    info!(contract = %cfg.scanner.contract_address, "Target contract");

    // Workers read the table concurrently, it has to be complete before the first launch
    let table = SignatureTable::load(&cfg.signatures.path)
        .with_context(|| format!("Failed to load signatures from {}", cfg.signatures.path))?;
    info!(
        path = %cfg.signatures.path,
        entries = table.len(),
        "✅ Signature table loaded"
    );
    let resolver = select_resolver(&cfg.signatures, Arc::new(table));
    info!(resolver = resolver.name(), "Selector resolver ready");

    let client = Arc::new(EvmClient::new(&cfg.rpc.url)?);
    let policy = cfg.rpc.retry_policy();
    let head = retry_async("eth_getBlockByNumber(latest)", &policy, || {
        client.get_header(None)
    })
    .await
    .context("Failed to connect to the RPC node")?;
    info!(
        head = head.number,
        excess_blob_gas = ?head.excess_blob_gas,
        blob_gas_used = ?head.blob_gas_used,
        "⛓️ Connected, latest block header"
    );

    let end_block = match cfg.scanner.end_block {
        Some(end) => {
            if end > head.number {
                warn!(
                    end,
                    head = head.number,
                    "End block is beyond the chain head, missing blocks will be skipped"
                );
            }
            end
        }
        None => head.number,
    };
    let request = cfg.scanner.to_request(end_block)?;

    let metrics: Arc<dyn ScannerMetrics> = if cfg.metrics.enable {
        Arc::new(PrometheusScannerMetrics::new(request.contract.to_checksum(None)))
    } else {
        Arc::new(NoopScannerMetrics::new())
    };

    let context = EvmScannerContext::new(
        Arc::new(request),
        ScanSettings::from_config(&cfg.rpc, &cfg.scanner),
        client,
        resolver,
        metrics,
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Spawn signal handler task for Ctrl+C
    let shutdown_tx_sigint = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        info!("📡 Received shutdown signal (Ctrl+C)");
        let _ = shutdown_tx_sigint.send(());
    });

    // SIGTERM handler (Unix only)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_tx_sigterm = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                info!("📡 Received SIGTERM signal");
                let _ = shutdown_tx_sigterm.send(());
            }
        });
    }

    let query_keys = context.request.query_keys.clone();
    let scanner = EvmScanner::new(context);
    let outcome = scanner.scan(shutdown_rx).await?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_report(&mut out, &outcome.records, &query_keys)?;
    out.flush()?;

    EvmScanner::print_summary(&outcome.summary);
    info!("👋 Scanner stopped");
    Ok(())
}
