use env_logger::Env;

/// Sets up the process wide logger, default level is info unless
/// overridden through the RUST_LOG environment variable
pub fn setup() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
