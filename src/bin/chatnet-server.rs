use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;

use chatnet::ChatServer;

#[derive(Parser)]
#[command(name = "chatnet-server", about = "Multi-user chat server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    address: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 6567)]
    port: u16,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let addr: SocketAddr = match format!("{}:{}", cli.address, cli.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, address = %cli.address, port = cli.port, "invalid listen address");
            return ExitCode::FAILURE;
        }
    };

    let mut server = match ChatServer::bind(addr) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run() {
        tracing::error!(error = %e, "server loop exited");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
