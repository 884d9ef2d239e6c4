use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use log_shipper::config::load_or_default;
use log_shipper::observability::logging;
use log_shipper::shipping::{build_endpoint, SequencedLogShipper};

#[derive(Parser)]
#[command(name = "shipctl")]
#[command(about = "Ship log lines to the configured remote stream", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ship one message built from the remaining arguments
    Send {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Ship every line read from stdin, in order
    Pipe,
    /// Print the stream's current continuation token
    Token,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    let endpoint = build_endpoint(&config.shipper)?;

    match cli.command {
        Commands::Send { message } => {
            let shipper = SequencedLogShipper::new(endpoint, config.shipper.clone());
            shipper.submit(message.join(" ")).await?;
            println!("delivered");
        }
        Commands::Pipe => {
            let shipper = SequencedLogShipper::new(endpoint, config.shipper.clone());
            let delivered = ship_lines(&shipper, BufReader::new(tokio::io::stdin())).await?;
            println!("delivered {} line(s)", delivered);
        }
        Commands::Token => {
            let token = endpoint
                .current_token(&config.shipper.group_name, &config.shipper.stream_name)
                .await?;
            match token {
                Some(token) => println!("{}", token),
                None => println!("(none)"),
            }
        }
    }

    Ok(())
}

/// Submit each line in order. Fails if any line was not delivered.
async fn ship_lines<R>(
    shipper: &SequencedLogShipper,
    reader: R,
) -> Result<usize, Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut delivered = 0usize;
    let mut failed = 0usize;
    while let Some(line) = lines.next_line().await? {
        match shipper.submit(line).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                failed += 1;
                eprintln!("not delivered: {}", e);
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} line(s) were not delivered", failed, delivered + failed).into());
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use log_shipper::config::ShipperConfig;
    use log_shipper::shipping::MemoryEndpoint;

    use super::*;

    #[tokio::test]
    async fn test_pipe_ships_in_order() {
        let endpoint = Arc::new(MemoryEndpoint::new());
        let config = ShipperConfig::default();
        let shipper = SequencedLogShipper::new(endpoint.clone(), config.clone());

        let delivered = ship_lines(&shipper, &b"one\ntwo\n"[..]).await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(
            endpoint.messages(&config.group_name, &config.stream_name),
            vec!["one", "two"]
        );
    }

    #[tokio::test]
    async fn test_pipe_reports_failures_as_error() {
        let endpoint = Arc::new(MemoryEndpoint::new());
        endpoint.fail_appends("maintenance");
        let shipper = SequencedLogShipper::new(endpoint, ShipperConfig::default());

        let err = ship_lines(&shipper, &b"one\ntwo\n"[..]).await.unwrap_err();
        assert_eq!(err.to_string(), "2 of 2 line(s) were not delivered");
    }
}
