use anyhow::{Context, Result};
use notify_relay::NameClaim;

mod opts;

fn main() {
    let opts = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("notifd"), log_level_filter)
            .filter(Some("notify_relay"), log_level_filter)
            .init();
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("notifd")
        .build()
        .context("Failed to initialize tokio runtime")?;
    rt.block_on(serve(opts))
}

async fn serve(opts: opts::Opt) -> Result<()> {
    let con = zbus::Connection::session().await.context("Failed to connect to the session bus")?;

    // Subscribe before claiming the name, so calls that race the grant are not
    // missed by the dispatch loop.
    let messages = zbus::MessageStream::from(&con);

    match notify_relay::claim_name(&con).await.context("Failed to request the service name")? {
        NameClaim::Claimed => log::info!("now serving {}", notify_relay::BUS_NAME),
        NameClaim::Yielded => {
            log::info!("{} already has an owner, yielding to it", notify_relay::BUS_NAME);
            return Ok(());
        }
    }

    let forwarder = notify_relay::Forwarder::new(opts.command);

    tokio::select! {
        result = notify_relay::serve(&con, messages, &forwarder) => {
            result.context("Dispatch loop failed")?;
        }
        result = notify_relay::wait_until_name_lost(&con) => {
            result.context("Failed to watch for name loss")?;
            log::info!("name '{}' claimed by another message bus connection", notify_relay::BUS_NAME);
        }
    }

    Ok(())
}
