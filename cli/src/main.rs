mod commands;
mod terminal;

use commands::{CommandLine, discover};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbose);
    print::header(&format!("lanscope v{}", env!("CARGO_PKG_VERSION")));

    let config = commands.to_config();
    discover::discover(config, commands.output).await
}
