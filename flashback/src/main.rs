use flashback::config::{cli, ConnectionParameters};
use flashback::logging::init_logging;
use flashback::orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
    init_logging();

    let matches = cli().get_matches();

    let code = match run(&matches).await {
        Ok(()) => 0,
        Err(e) => e.report(&mut std::io::stderr()),
    };

    std::process::exit(code);
}

async fn run(matches: &clap::ArgMatches) -> flashback::Result<()> {
    let params = ConnectionParameters::try_from(matches)?;

    let outcome = Orchestrator::default().run(&params).await?;

    println!("Firmware saved to {}", outcome.dump.display());
    if outcome.restored {
        println!("### Applied image! Please reboot your UFiber device to load the new image.");
    }

    Ok(())
}
