/// Internal logs go to stderr through `env_logger` and are opt-in via
/// `RUST_LOG`; without it only warnings and errors are shown. Run summaries
/// are printed separately by the binary.
pub fn init_logging() {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Warn);
    }
    let _ = builder.try_init();
}
