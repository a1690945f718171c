//! Supervisor for the external PDF-to-text helper
//!
//! Exactly one helper per application run. `start()` spawns it with piped
//! standard streams and sleeps a fixed readiness delay; `stop()` kills and
//! reaps it and never fails. Dropping the supervisor kills a helper that
//! was never stopped.
//!
//! Process creation goes through `ProcessSpawner` so the lifecycle can be
//! exercised without real processes.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::HelperConfig;

/// Upper bound for reaping the helper after a kill
const REAP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to launch helper '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Helper is already running (pid {pid:?})")]
    AlreadyRunning { pid: Option<u32> },
}

/// A running child process as seen by the supervisor
#[async_trait]
pub trait ChildProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check
    fn has_exited(&mut self) -> io::Result<bool>;

    /// Send the kill signal without waiting
    fn start_kill(&mut self) -> io::Result<()>;

    async fn wait(&mut self) -> io::Result<()>;

    /// Hand out the helper's stdin/stdout, at most once
    fn take_stdio(&mut self) -> Option<(ChildStdin, ChildStdout)>;
}

pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, command: &str, args: &[String]) -> io::Result<Box<dyn ChildProcess>>;
}

/// Spawns real processes through `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

struct TokioChild {
    child: Child,
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<()> {
        let status = self.child.wait().await?;
        debug!("Helper exited with {}", status);
        Ok(())
    }

    /// Both streams or neither; a half-taken pair would strand stdin
    fn take_stdio(&mut self) -> Option<(ChildStdin, ChildStdout)> {
        if self.child.stdin.is_none() || self.child.stdout.is_none() {
            return None;
        }
        Some((self.child.stdin.take()?, self.child.stdout.take()?))
    }
}

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, command: &str, args: &[String]) -> io::Result<Box<dyn ChildProcess>> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // A full stderr pipe would stall the helper
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "crzp_thesis::helper", "{}", line);
                }
            });
        }

        Ok(Box::new(TokioChild { child }))
    }
}

pub struct ProcessSupervisor<S: ProcessSpawner = TokioSpawner> {
    spawner: S,
    config: HelperConfig,
    child: Mutex<Option<Box<dyn ChildProcess>>>,
}

impl ProcessSupervisor<TokioSpawner> {
    pub fn from_config(config: HelperConfig) -> Self {
        Self::new(TokioSpawner, config)
    }
}

impl<S: ProcessSpawner> ProcessSupervisor<S> {
    pub fn new(spawner: S, config: HelperConfig) -> Self {
        Self {
            spawner,
            config,
            child: Mutex::new(None),
        }
    }

    /// Spawn the helper and wait out the readiness delay
    ///
    /// Returns the helper's pid. A helper that exited on its own since the
    /// last start is replaced; a live one is an error.
    pub async fn start(&self) -> Result<Option<u32>, SupervisorError> {
        let pid = {
            let mut guard = self.child.lock().await;

            if let Some(existing) = guard.as_mut() {
                match existing.has_exited() {
                    Ok(true) => {
                        info!("Previous helper (pid {:?}) has exited, replacing it", existing.id());
                        *guard = None;
                    }
                    _ => return Err(SupervisorError::AlreadyRunning { pid: existing.id() }),
                }
            }

            let child = self
                .spawner
                .spawn(&self.config.command, &self.config.args)
                .map_err(|source| SupervisorError::Launch {
                    command: self.config.command.clone(),
                    source,
                })?;
            let pid = child.id();
            *guard = Some(child);
            pid
        };

        info!(
            "Helper '{} {}' spawned (pid {:?}), waiting {}ms for readiness",
            self.config.command,
            self.config.args.join(" "),
            pid,
            self.config.readiness_delay_ms
        );
        tokio::time::sleep(Duration::from_millis(self.config.readiness_delay_ms)).await;
        info!("Helper started on stdio");

        Ok(pid)
    }

    /// Kill and reap the helper
    ///
    /// Safe to call any number of times, including after the helper died
    /// on its own.
    pub async fn stop(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            debug!("Helper not running, nothing to stop");
            return;
        };
        let pid = child.id();

        match child.has_exited() {
            Ok(true) => debug!("Helper (pid {:?}) already exited", pid),
            Ok(false) | Err(_) => {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill helper (pid {:?}): {}", pid, e);
                }
            }
        }

        match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(())) => info!("Helper stopped"),
            Ok(Err(e)) => warn!("Failed to wait for helper exit (pid {:?}): {}", pid, e),
            Err(_) => warn!("Helper (pid {:?}) did not exit within {:?}", pid, REAP_TIMEOUT),
        }
    }

    pub async fn is_running(&self) -> bool {
        match self.child.lock().await.as_mut() {
            Some(child) => !child.has_exited().unwrap_or(true),
            None => false,
        }
    }

    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(|c| c.id())
    }

    /// Stdin/stdout of the running helper, for the RPC client
    pub async fn take_stdio(&self) -> Option<(ChildStdin, ChildStdout)> {
        self.child.lock().await.as_mut()?.take_stdio()
    }
}

impl<S: ProcessSpawner> Drop for ProcessSupervisor<S> {
    fn drop(&mut self) {
        if let Some(child) = self.child.get_mut().as_mut()
            && !child.has_exited().unwrap_or(false)
        {
            warn!("Helper (pid {:?}) still running at shutdown, killing it", child.id());
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        exited: AtomicBool,
        kills: AtomicUsize,
        waits: AtomicUsize,
        spawns: AtomicUsize,
    }

    struct FakeChild {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl ChildProcess for FakeChild {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        fn has_exited(&mut self) -> io::Result<bool> {
            Ok(self.counters.exited.load(Ordering::SeqCst))
        }

        fn start_kill(&mut self) -> io::Result<()> {
            self.counters.kills.fetch_add(1, Ordering::SeqCst);
            self.counters.exited.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn wait(&mut self) -> io::Result<()> {
            self.counters.waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn take_stdio(&mut self) -> Option<(ChildStdin, ChildStdout)> {
            None
        }
    }

    struct FakeSpawner {
        counters: Arc<Counters>,
        fail: bool,
    }

    impl ProcessSpawner for FakeSpawner {
        fn spawn(&self, _command: &str, _args: &[String]) -> io::Result<Box<dyn ChildProcess>> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "uvx not found"));
            }
            self.counters.spawns.fetch_add(1, Ordering::SeqCst);
            self.counters.exited.store(false, Ordering::SeqCst);
            Ok(Box::new(FakeChild {
                counters: self.counters.clone(),
            }))
        }
    }

    fn supervisor(fail: bool) -> (ProcessSupervisor<FakeSpawner>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let config = HelperConfig {
            readiness_delay_ms: 1,
            ..HelperConfig::default()
        };
        let spawner = FakeSpawner {
            counters: counters.clone(),
            fail,
        };
        (ProcessSupervisor::new(spawner, config), counters)
    }

    #[tokio::test]
    async fn start_then_stop_kills_and_reaps() {
        let (sup, counters) = supervisor(false);
        assert_eq!(sup.start().await.unwrap(), Some(4242));
        assert!(sup.is_running().await);

        sup.stop().await;
        assert!(!sup.is_running().await);
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_twice_is_a_no_op() {
        let (sup, counters) = supervisor(false);
        sup.start().await.unwrap();
        sup.stop().await;
        sup.stop().await;
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_start_does_nothing() {
        let (sup, counters) = supervisor(false);
        sup.stop().await;
        assert_eq!(counters.kills.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_after_external_exit_only_reaps() {
        let (sup, counters) = supervisor(false);
        sup.start().await.unwrap();
        counters.exited.store(true, Ordering::SeqCst);

        sup.stop().await;
        assert_eq!(counters.kills.load(Ordering::SeqCst), 0);
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_start_while_running_is_rejected() {
        let (sup, counters) = supervisor(false);
        sup.start().await.unwrap();
        let err = sup.start().await.unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyRunning { pid: Some(4242) }));
        assert_eq!(counters.spawns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exited_helper_can_be_restarted() {
        let (sup, counters) = supervisor(false);
        sup.start().await.unwrap();
        counters.exited.store(true, Ordering::SeqCst);

        sup.start().await.unwrap();
        assert_eq!(counters.spawns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_launch_error() {
        let (sup, _counters) = supervisor(true);
        let err = sup.start().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Launch { ref command, .. } if command == "uvx"));
        assert!(!sup.is_running().await);
    }

    #[tokio::test]
    async fn drop_kills_a_running_helper() {
        let (sup, counters) = supervisor(false);
        sup.start().await.unwrap();
        drop(sup);
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    fn spawn_cat() -> TokioChild {
        let child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        TokioChild { child }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn take_stdio_hands_out_both_streams_once() {
        let mut child = spawn_cat();
        assert!(child.take_stdio().is_some());
        assert!(child.take_stdio().is_none());
        child.start_kill().unwrap();
        child.wait().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn take_stdio_keeps_stdin_when_stdout_is_gone() {
        let mut child = spawn_cat();
        drop(child.child.stdout.take());

        assert!(child.take_stdio().is_none());
        assert!(child.child.stdin.is_some());

        child.start_kill().unwrap();
        child.wait().await.unwrap();
    }
}
