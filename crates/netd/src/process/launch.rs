//! Launch sequencing: bootstrap, serve, wait, tear down.

use std::sync::Arc;

use tracing::info;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::controllers::{LoggingNetBackend, NetBackend};
use crate::dispatch::DispatchConnectionHandler;
use crate::health::HealthReporter;
use crate::power::{LoggingPerfBackend, PerfBackend};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) shutdown: S,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) perf: Arc<dyn PerfBackend>,
    pub(crate) net: Arc<dyn NetBackend>,
}

/// Runs the daemon in the foreground using the production collaborators.
///
/// Returns once a termination signal has been handled and every worker has
/// been joined.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        shutdown: SystemShutdownSignal::new(SHUTDOWN_TIMEOUT),
        reporter: Arc::new(StructuredHealthReporter::new()),
        perf: Arc::new(LoggingPerfBackend),
        net: Arc::new(LoggingNetBackend),
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        shutdown,
        reporter,
        perf,
        net,
    } = plan;

    let daemon = bootstrap_with(&loader, Arc::clone(&reporter), perf, net)?;
    let config = daemon.config();
    info!(
        target: PROCESS_TARGET,
        socket = %config.daemon_socket(),
        "starting daemon runtime"
    );

    let listener = SocketListener::bind(config.daemon_socket())?;
    let handler = Arc::new(DispatchConnectionHandler::new(Arc::clone(
        daemon.dispatcher(),
    )));
    let listener_handle = listener.start(handler)?;
    reporter.listener_ready(config.daemon_socket());

    let monitor = daemon.controllers().monitor();
    if config.monitor_autostart() {
        match monitor.start() {
            Ok(()) => reporter.monitor_started(),
            Err(error) => reporter.monitor_failed(&error),
        }
    }

    let waited = shutdown.wait();

    if let Err(error) = monitor.stop() {
        reporter.monitor_failed(&error);
    }
    listener_handle.shutdown();
    let joined = listener_handle.join();
    waited?;
    joined?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::sync::Mutex;
    use std::time::Duration;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::process::ShutdownError;
    use crate::tests::support::{
        FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader,
    };

    /// Talks to the live daemon, then lets it shut down.
    struct ScriptedClient {
        socket: Utf8PathBuf,
        script: Vec<&'static str>,
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(socket: Utf8PathBuf, script: Vec<&'static str>) -> Self {
            Self {
                socket,
                script,
                replies: Mutex::new(Vec::new()),
            }
        }

        fn replies(&self) -> Vec<String> {
            self.replies.lock().expect("replies mutex").clone()
        }
    }

    impl ShutdownSignal for &ScriptedClient {
        fn wait(&self) -> Result<(), ShutdownError> {
            let stream = UnixStream::connect(self.socket.as_std_path()).expect("connect");
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .expect("read timeout");
            let mut writer = stream.try_clone().expect("clone stream");
            let mut reader = BufReader::new(stream);
            for line in &self.script {
                writeln!(writer, "{line}").expect("write command");
                let mut reply = String::new();
                reader.read_line(&mut reply).expect("read reply");
                self.replies
                    .lock()
                    .expect("replies mutex")
                    .push(reply.trim_end().to_owned());
            }
            Ok(())
        }
    }

    struct ImmediateShutdown;

    impl ShutdownSignal for ImmediateShutdown {
        fn wait(&self) -> Result<(), ShutdownError> {
            Ok(())
        }
    }

    #[test]
    fn serves_commands_until_shutdown_then_cleans_up() {
        let loader = TestConfigLoader::new().with_autostart();
        let socket = loader.socket_path();
        let client = ScriptedClient::new(
            socket.clone(),
            vec!["ipfwd enable tether", "ipfwd status", "throughput status"],
        );
        let reporter = Arc::new(RecordingHealthReporter::default());

        run_daemon_with(LaunchPlan {
            loader,
            shutdown: &client,
            reporter: reporter.clone(),
            perf: Arc::new(LoggingPerfBackend),
            net: Arc::new(LoggingNetBackend),
        })
        .expect("daemon run");

        let replies = client.replies();
        assert_eq!(replies.first().map(String::as_str), Some("200 ipfwd operation succeeded"));
        assert_eq!(replies.get(1).map(String::as_str), Some("211 Forwarding enabled"));
        let status = replies.get(2).expect("status reply");
        assert!(status.starts_with("224 running "), "{status}");

        assert!(!socket.exists(), "socket file should be removed");
        let events = reporter.events();
        assert!(events.contains(&HealthEvent::MonitorStarted), "{events:?}");
        assert!(
            events
                .iter()
                .any(|event| matches!(event, HealthEvent::ListenerReady(_))),
            "{events:?}"
        );
    }

    #[test]
    fn monitor_stays_off_without_autostart() {
        let reporter = Arc::new(RecordingHealthReporter::default());

        run_daemon_with(LaunchPlan {
            loader: TestConfigLoader::new(),
            shutdown: ImmediateShutdown,
            reporter: reporter.clone(),
            perf: Arc::new(LoggingPerfBackend),
            net: Arc::new(LoggingNetBackend),
        })
        .expect("daemon run");

        assert!(!reporter.events().contains(&HealthEvent::MonitorStarted));
    }

    #[test]
    fn configuration_failures_abort_launch() {
        let error = run_daemon_with(LaunchPlan {
            loader: FailingConfigLoader,
            shutdown: ImmediateShutdown,
            reporter: Arc::new(RecordingHealthReporter::default()),
            perf: Arc::new(LoggingPerfBackend),
            net: Arc::new(LoggingNetBackend),
        })
        .expect_err("launch should fail");

        assert!(matches!(error, LaunchError::Config { .. }), "{error:?}");
    }
}
