// src/main.rs

use scriptrun::{cli, exit_status, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    let strict = args.strict;

    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("scriptrun error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(Some(state)) => std::process::exit(exit_status(state, strict)),
        Ok(None) => {}
        Err(err) => {
            eprintln!("scriptrun error: {err:?}");
            std::process::exit(1);
        }
    }
}
