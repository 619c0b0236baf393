use std::sync::Arc;

use staticd::auth::CredentialService;
use staticd::config::Config;
use staticd::logging;
use staticd::server::Reactor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    let _log_guard = logging::init(&cfg.log)?;

    let users = Arc::new(CredentialService::from_config(&cfg.credentials));
    let mut reactor = Reactor::bind(&cfg, users.clone())?;
    let handle = reactor.shutdown_handle();

    let mut server = tokio::task::spawn_blocking(move || reactor.run());

    tokio::select! {
        res = &mut server => {
            res??;
            users.close();
            return Ok(());
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    handle.shutdown();
    server.await??;
    users.close();
    tracing::info!("Server stopped");

    Ok(())
}
