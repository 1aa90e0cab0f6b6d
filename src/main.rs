use osprey_engine::cli::CliOverrides;
use osprey_engine::run_demo;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed.into_demo_options(),
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run_demo(options) {
        log::error!("Application error: {err:?}");
        std::process::exit(1);
    }
}
