use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = sales_dashboard_cli::Cli::parse();
    sales_dashboard_cli::init_tracing(cli.verbose());
    sales_dashboard_cli::run_cli(cli)
}
