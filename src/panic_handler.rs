/// Detailed backtraces while developing, a friendly crash report file in release.
#[cfg(debug_assertions)]
pub fn initialize_panic_handler() {
    better_panic::Settings::debug()
        .most_recent_first(false)
        .lineno_suffix(true)
        .install();
}

#[cfg(not(debug_assertions))]
pub fn initialize_panic_handler() {
    human_panic::setup_panic!();
}
