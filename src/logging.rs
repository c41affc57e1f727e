use env_logger::{Builder, Env};

/// Logger for the launcher; `RUST_LOG` overrides the `info` default.
pub fn init() {
    env_logger::init_from_env(Env::new().default_filter_or("info"));
}

/// Logger for test binaries. Safe to call from every test.
pub fn init_for_tests() {
    let _ = Builder::from_env(Env::new().default_filter_or("info"))
        .is_test(true)
        .try_init();
}
