use mimalloc::MiMalloc;
use modules::{
    common::{rustls::MailSiftTls, signal::SignalManager, signal::SIGNAL_MANAGER},
    context::Initialize,
    database::manager::DatabaseManager,
    error::MailSiftResult,
    logger,
    rest::start_http_server,
    settings::{cli::SETTINGS, dir::DataDirManager},
    sync::engine::{build_orchestrator, SyncEngine},
    utils::shutdown::Shutdown,
};
use tracing::{error, info};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
  __  __       _ _  ____  _  __ _   
 |  \/  | __ _(_) |/ ___|(_)/ _| |_ 
 | |\/| |/ _` | | |\___ \| | |_| __|
 | |  | | (_| | | | ___) | |  _| |_ 
 |_|  |_|\__,_|_|_||____/|_|_|  \__|
                                    
"#;

#[tokio::main]
async fn main() -> MailSiftResult<()> {
    logger::initialize_logging();
    info!("{}", LOGO);
    info!("Starting mailsift");
    info!("Version:  {}", mailsift_version!());
    info!("Git:      [{}]", env!("GIT_HASH"));

    if let Err(error) = initialize().await {
        eprintln!("{:?}", error);
        return Err(error);
    }

    if SETTINGS.mailsift_reset_state {
        return reset_state().await;
    }
    if SETTINGS.mailsift_run_once {
        return run_once().await;
    }
    serve().await
}

/// Validate settings and bring up the process-wide services.
async fn initialize() -> MailSiftResult<()> {
    SETTINGS.validate()?;
    SignalManager::initialize().await?;
    DataDirManager::initialize().await?;
    DatabaseManager::initialize().await?;
    MailSiftTls::initialize().await?;
    Ok(())
}

async fn reset_state() -> MailSiftResult<()> {
    let mut orchestrator = build_orchestrator(&SETTINGS).await?;
    orchestrator.reset_state().await?;
    info!(
        "Sync state for '{}' has been reset.",
        SETTINGS.mailsift_imap_folder
    );
    Ok(())
}

async fn run_once() -> MailSiftResult<()> {
    let mut orchestrator = build_orchestrator(&SETTINGS).await?;
    let (trigger, shutdown) = Shutdown::new();
    let mut signal = SIGNAL_MANAGER.subscribe();
    let watch_signal = tokio::spawn(async move {
        let _ = signal.recv().await;
        trigger.cancel();
    });

    let result = orchestrator.run_once(shutdown).await;
    watch_signal.abort();
    let stats = result?;
    info!(
        processed = stats.processed,
        accepted = stats.accepted,
        rejected = stats.rejected,
        failed = stats.failed,
        skipped = stats.skipped,
        deferred = stats.deferred,
        marker = stats.marker,
        "Single pass over '{}' finished.",
        SETTINGS.mailsift_imap_folder
    );
    Ok(())
}

async fn serve() -> MailSiftResult<()> {
    SyncEngine::initialize().await?;
    let engine = SyncEngine::get()?;
    engine.start().await?;

    let front = async {
        if SETTINGS.mailsift_http_enabled {
            if let Err(e) = start_http_server().await {
                error!("Failed to start REST server: {}", e);
            }
        } else {
            let _ = SIGNAL_MANAGER.subscribe().recv().await;
        }
    };

    tokio::select! {
        _ = front => {}
        error = engine.terminated() => {
            error!("Sync engine stopped on a fatal error, exiting.");
            let _ = engine.stop().await;
            return Err(error);
        }
    }

    info!("Shutting down sync engine...");
    engine.stop().await?;
    info!("Sync engine stopped.");
    Ok(())
}
