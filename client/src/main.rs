use clap::Parser;
use client::network::{connect, play, Family};
use log::info;
use tokio::io::{stdin, stdout, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Player identifier, letters and digits only
    #[arg(short = 'u', long)]
    id: String,

    /// Server host name or address
    #[arg(short = 's', long, default_value = "localhost")]
    server: String,

    /// Server port
    #[arg(short = 'p', long)]
    port: u16,

    /// Only use IPv4 addresses
    #[arg(short = '4', long = "ipv4")]
    ipv4: bool,

    /// Only use IPv6 addresses, ignored together with -4
    #[arg(short = '6', long = "ipv6")]
    ipv6: bool,
}

impl Args {
    fn family(&self) -> Family {
        Family::from_flags(self.ipv4, self.ipv6)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    if !shared::is_valid_id(&args.id) {
        return Err(format!("invalid player id {:?}", args.id).into());
    }

    info!("Connecting to {}:{}", args.server, args.port);
    let stream = connect(&args.server, args.port, args.family()).await?;

    println!("Type guesses as <point> <value> once the polynomial is shown");
    let view = play(stream, &args.id, BufReader::new(stdin()), stdout()).await?;

    match view.own_score() {
        Some(error) => info!("Round finished with error {}", error),
        None => info!("Session ended without a score"),
    }

    // A pending stdin read would keep the runtime from shutting down.
    std::process::exit(0)
}
