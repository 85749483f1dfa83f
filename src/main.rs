use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use pistolet::{Chain, Config, Diagnostic, MailQueue, Received, SmtpServer, Storage};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:2525")]
    listen: SocketAddr,

    /// Host name of this server, used in greetings and trace headers
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Address of this server as written into trace headers
    #[arg(long, default_value = "127.0.0.1")]
    ip: IpAddr,

    /// Maildir accepted messages are stored in
    #[arg(long, default_value = "./maildir")]
    maildir: PathBuf,

    /// Number of queue workers
    #[arg(long, default_value_t = 1)]
    workers: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            hostname: args.hostname,
            ip: args.ip,
            maildir: args.maildir,
            listen: args.listen,
            workers: args.workers,
            ..Config::default()
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pistolet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from(Args::parse());
    info!(
        hostname = %config.hostname,
        listen = %config.listen,
        maildir = %config.maildir.display(),
        "Starting Pistolet"
    );

    let chain = Chain::new()
        .with(Received::new(&config))
        .with(Diagnostic)
        .with(Storage::maildir(&config));

    let (queue, workers) = match MailQueue::start(chain, config.workers, config.queue_capacity) {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start mail queue: {e}");
            process::exit(1);
        }
    };

    let server = SmtpServer::new(&config.hostname, queue);
    if let Err(e) = server.start(config.listen) {
        error!("Failed to start server: {e}");
        drop(server);
        workers.join();
        process::exit(1);
    }
}
