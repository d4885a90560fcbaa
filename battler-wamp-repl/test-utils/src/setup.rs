/// Installs a DEBUG-level subscriber for test logs, which also captures `log` records.
///
/// Output goes through the test harness, so session and router logs only show for failing tests.
pub fn setup_test_environment() {
    // Only the first call in a test binary can install the global subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_core::Level::DEBUG)
        .with_test_writer()
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
