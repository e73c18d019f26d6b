use anyhow::Result;
use devboard::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.execute()
}
