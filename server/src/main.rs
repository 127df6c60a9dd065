use clap::Parser;
use log::{error, info};
use server::coefficients::CoefficientFile;
use server::config::{Args, ServerConfig};
use server::session::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());

    // A missing or unreadable coefficient file is fatal before anything listens.
    let source = CoefficientFile::open(&config.coefficients, config.max_coefficients())?;
    let mut session = Session::new(config, source)?;
    info!("Server listening on {}", session.local_addr()?);
    info!(
        "Points 0..={}, rounds of {} accepted guesses",
        session.config().points,
        session.config().target
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        let waker = session.waker();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            stop.store(true, Ordering::SeqCst);
            if let Err(e) = waker.wake() {
                error!("Failed to wake the event loop: {}", e);
            }
        })?;
    }

    session.serve(&stop)?;
    Ok(())
}
