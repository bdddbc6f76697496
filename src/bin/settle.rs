use anyhow::Result;
use poly_settler::bin_common::SettleArgs;
use settlement::application::SettlerApp;
use settlement::{init_tracing_with_level, RunSummary};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = SettleArgs::from_env();
    init_tracing_with_level(args.log_level());

    print_banner("Polymarket Position Settler", &args);

    let mut app = SettlerApp::from_env()?;
    let summary = app.run(args.dry_run, args.direct).await?;

    print_shutdown(&summary);
    Ok(())
}

fn print_banner(name: &str, args: &SettleArgs) {
    info!("");
    info!("========================================");
    info!("Starting {}", name);
    if args.dry_run {
        info!("Mode: dry run (no transactions)");
    }
    if args.direct {
        info!("Mode: direct transactions only");
    }
    info!("========================================");
    info!("");
}

fn print_shutdown(summary: &RunSummary) {
    info!("");
    info!("========================================");
    info!("Settlement finished: {}", summary);
    info!("========================================");
}
