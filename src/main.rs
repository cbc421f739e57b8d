use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let invocation = match social_connect::app::parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("error: {err:#}\n\n{}", social_connect::app::HELP);
            std::process::exit(2);
        }
    };

    if let Err(err) = social_connect::run(invocation) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("social_connect=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
