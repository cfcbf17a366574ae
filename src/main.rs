use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use dhcpdora::{
    ClientConfig, DhcpClient, DhcpOption, Error, MacAddr, OptionList, Result, options,
};

#[derive(Parser)]
#[command(name = "dora")]
#[command(author, version, about = "Acquire a DHCP lease via the DISCOVER/OFFER/REQUEST/ACK exchange", long_about = None)]
struct Cli {
    /// Interface to bind for the exchange
    #[arg(short, long)]
    interface: Option<String>,

    /// MAC address to present (random when omitted)
    #[arg(short = 'a', long)]
    mac_addr: Option<MacAddr>,

    /// Send unicast to --server instead of broadcasting
    #[arg(short, long)]
    unicast: bool,

    /// Server to address; required for unicast and relayed exchanges
    #[arg(short, long, default_value = "255.255.255.255")]
    server: Ipv4Addr,

    /// Relay address to place in giaddr
    #[arg(short, long)]
    relay: Option<Ipv4Addr>,

    /// JSON file of option key/value pairs to include in requests
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Port to send packets from
    #[arg(short, long, default_value_t = 68)]
    port: u16,

    /// Port to send packets to
    #[arg(long, default_value_t = 67)]
    target_port: u16,

    /// Seconds to wait for each reply
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Print every packet of the exchange
    #[arg(short, long)]
    verbose: bool,

    /// Emit the lease as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// The request options sent when no options file is given.
fn default_options(mac_addr: MacAddr) -> OptionList {
    OptionList::from_options([
        DhcpOption::client_identifier(1, &mac_addr.octets()),
        DhcpOption::max_message_size(1500),
        DhcpOption::parameter_request_list(&[1, 3, 6, 15, 26, 28, 51, 58, 59, 43]),
    ])
}

async fn load_options_file(path: &PathBuf) -> Result<OptionList> {
    let content = tokio::fs::read_to_string(path).await?;
    let parsed: serde_json::Value = serde_json::from_str(&content)?;
    let object = parsed.as_object().ok_or_else(|| {
        Error::InvalidValue("options file must be a JSON object of option key/value pairs".to_string())
    })?;

    let mut list = OptionList::new();
    for (key, value) in object {
        list.append(options::value_to_object(
            &serde_json::json!({ key.clone(): value.clone() }),
        )?);
    }
    Ok(list)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut mac_addr = cli.mac_addr.unwrap_or_else(MacAddr::random);

    let extra_options = match &cli.options {
        Some(path) => load_options_file(path).await?,
        None => default_options(mac_addr),
    };

    // A ClientIdentifier from the options file names the identity the
    // exchange runs as; it overrides --mac-addr.
    if let Some(client_id) = extra_options.by_code(61)
        && client_id.data().len() >= 7
    {
        mac_addr = MacAddr::from_slice(&client_id.data()[1..])?;
    }

    let config = ClientConfig {
        interface: cli.interface.clone(),
        bind_address: Ipv4Addr::UNSPECIFIED,
        client_port: cli.port,
        server_port: cli.target_port,
        timeout: Duration::from_secs(cli.timeout_secs),
    };
    let client = DhcpClient::new(config);

    match client
        .get_lease(mac_addr, !cli.unicast, cli.relay, cli.server, Some(extra_options))
        .await
    {
        Ok(lease) => {
            if cli.verbose {
                for (name, packet) in [
                    ("DISCOVER", &lease.discover),
                    ("OFFER", &lease.offer),
                    ("REQUEST", &lease.request),
                    ("ACK", &lease.ack),
                ] {
                    println!("--- {name} ---");
                    println!("{packet}");
                    println!();
                }
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&lease.summary())?);
            } else {
                println!("Lease successful: {lease}");
            }
            Ok(())
        }
        Err(err) => {
            error!("unable to obtain lease: {err}");
            Err(err)
        }
    }
}
