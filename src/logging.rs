use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,gh_board=debug",
        _ => "trace",
    }
}

/// Log to stderr so stdout stays usable for `--json` output.
pub fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}
