use clap::Parser;
use deal_board_sync::app::scheduler::{SyncRunner, Trigger};
use deal_board_sync::app::server::{self, AppState};
use deal_board_sync::utils::error::{ErrorCategory, Result};
use deal_board_sync::utils::{logger, validation::Validate};
use deal_board_sync::{BoardClient, CliConfig, CrmClient, SyncConfig, Synchronizer};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let logging = config.log_format().and_then(|format| {
        logger::init_logger(
            cli.verbose,
            format,
            config.logging.file.as_deref().map(Path::new),
        )
    });
    if let Err(e) = logging {
        eprintln!("❌ Failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Starting deal-board-sync");
    if cli.verbose {
        tracing::debug!("CLI options: {:?}", cli);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, config).await {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);

        let exit_code = match e.category() {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Transport | ErrorCategory::Remote => 2,
            ErrorCategory::Validation | ErrorCategory::Internal => 3,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: &CliConfig, config: SyncConfig) -> Result<()> {
    let timeout = config.request_timeout();
    let crm = Arc::new(CrmClient::from_config(&config.crm, config.criteria(), timeout)?);
    let boards = Arc::new(BoardClient::from_config(&config.board, timeout)?);

    if config.crm.ensure_field {
        match crm.ensure_board_field().await {
            Ok(true) => tracing::info!("Created CRM field {}", crm.board_field()),
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not verify CRM field {}: {}", crm.board_field(), e),
        }
    }

    let synchronizer = Synchronizer::new(crm, boards, config.criteria());
    let runner = Arc::new(SyncRunner::new(synchronizer));

    if cli.once {
        let result = runner.trigger(Trigger::Manual).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let listener = TcpListener::bind(&config.server.bind).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(runner.clone().run_every(
        config.interval(),
        config.sync.run_on_startup,
        shutdown_rx,
    ));

    let state = AppState {
        runner,
        interval_seconds: config.sync.interval_seconds,
    };
    server::serve(listener, state, shutdown_signal()).await?;

    // The scheduler finishes any run in flight before it sees the signal.
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::warn!("Scheduler task ended abnormally: {}", e);
    }

    tracing::info!("deal-board-sync stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
