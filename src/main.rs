use std::io::{self, Write};

use clap::Parser;

use lazy_singleton::probe;

mod cli;

use cli::Args;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let format = args.format();
    miette::set_hook(format.into_error_hook())?;

    let cwd = std::env::current_dir()?;
    let config = args.to_config(&cwd)?;

    let reports = probe::run_all(config.variants(), &config.to_settings());

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let mut failed = false;
    for report in &reports {
        writeln!(stdout, "{}", format.render(report)?)?;

        for failure in report.failures() {
            failed = true;
            let failure: miette::Report = failure.into();
            writeln!(stderr, "{failure:?}")?;
        }
    }

    if failed {
        stdout.flush()?;
        std::process::exit(1);
    }

    Ok(())
}
