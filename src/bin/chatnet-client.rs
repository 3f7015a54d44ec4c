use std::process::ExitCode;

use clap::Parser;

use chatnet::client::ClientDriver;

#[derive(Parser)]
#[command(name = "chatnet-client", about = "Interactive chat client")]
struct Cli {
    /// Server address to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Server port to connect to.
    #[arg(long, default_value_t = 6567)]
    port: u16,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let driver = match ClientDriver::connect((cli.address.as_str(), cli.port)) {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("<*CLIENT*>: Failed to connect to {}:{} - {e}", cli.address, cli.port);
            return ExitCode::FAILURE;
        }
    };

    driver.run();
    ExitCode::SUCCESS
}
