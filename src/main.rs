/// Entry point for the session-monitor polling tool.
///
/// Attaches to the statistics regions of a running session-server deployment
/// (configured through `MONITOR_INSTANCE_DIRS`, `MONITOR_DEPLOYMENT_MODE` and
/// `MONITOR_POLL_INTERVAL_MS`) and logs every snapshot as JSON.
///
/// # Examples
///
/// ```bash
/// MONITOR_INSTANCE_DIRS=/srv/session/0,/srv/session/1 \
/// MONITOR_DEPLOYMENT_MODE=separated cargo run
/// ```
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    session_monitor::run()
}
