use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Install the process logger. Level comes from `RUST_LOG`, default `info`.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        if let Err(e) = env_logger::Builder::from_env(env).try_init() {
            eprintln!("logger already installed: {}", e);
        }
    });
}
