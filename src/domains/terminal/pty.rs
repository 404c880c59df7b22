use anyhow::{Context, Result, anyhow};
use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const READ_BUFFER_SIZE: usize = 8192;

/// A spawned interactive process bound to a PTY: the output stream, the exit
/// notification, and a control handle for writes/resize/kill.
pub struct PtyProcess {
    pub controller: PtyController,
    pub output_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pub exit_rx: oneshot::Receiver<i32>,
}

struct ControllerInner {
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    dead: AtomicBool,
}

/// Cloneable handle to a live PTY child. Input writes and output reads go
/// through independent channels, so the two directions never block each
/// other.
#[derive(Clone)]
pub struct PtyController {
    inner: Arc<ControllerInner>,
}

impl PtyController {
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let mut writer = self
            .inner
            .writer
            .lock()
            .map_err(|_| anyhow!("PTY writer lock poisoned"))?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let master = self
            .inner
            .master
            .lock()
            .map_err(|_| anyhow!("PTY master lock poisoned"))?;
        master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })?;
        Ok(())
    }

    /// Kill the attached process. This only severs the attachment; the
    /// backing mux session keeps running.
    pub fn kill(&self) {
        if self.inner.dead.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut killer) = self.inner.killer.lock()
            && let Err(e) = killer.kill()
        {
            log::debug!("PTY kill failed (process likely already gone): {e}");
        }
    }

    pub fn is_dead(&self) -> bool {
        self.inner.dead.load(Ordering::SeqCst)
    }
}

/// Spawn `program args` on a fresh PTY in `cwd`. A dedicated thread pumps
/// output bytes into the returned channel in arrival order and reports the
/// exit code once the process is gone.
pub fn spawn_pty_process(
    program: &Path,
    args: &[String],
    cwd: &Path,
    cols: u16,
    rows: u16,
) -> Result<PtyProcess> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .context("Failed to open PTY")?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    cmd.cwd(cwd);
    cmd.env("TERM", "xterm-256color");

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .with_context(|| format!("Failed to spawn {} on PTY", program.display()))?;
    drop(pair.slave);

    let mut reader = pair
        .master
        .try_clone_reader()
        .context("Failed to clone PTY reader")?;
    let writer = pair.master.take_writer().context("Failed to take PTY writer")?;
    let killer = child.clone_killer();

    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let (exit_tx, exit_rx) = oneshot::channel();

    let inner = Arc::new(ControllerInner {
        writer: Mutex::new(writer),
        master: Mutex::new(pair.master),
        killer: Mutex::new(killer),
        dead: AtomicBool::new(false),
    });
    let controller = PtyController {
        inner: inner.clone(),
    };

    std::thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if output_tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("PTY read ended: {e}");
                    break;
                }
            }
        }

        let code = match child.wait() {
            Ok(status) => status.exit_code() as i32,
            Err(e) => {
                log::warn!("PTY child wait failed: {e}");
                -1
            }
        };
        inner.dead.store(true, Ordering::SeqCst);
        let _ = exit_tx.send(code);
    });

    Ok(PtyProcess {
        controller,
        output_rx,
        exit_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    async fn collect_output(
        rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
        needle: &str,
        budget: Duration,
    ) -> String {
        let mut collected = String::new();
        let deadline = tokio::time::Instant::now() + budget;
        while !collected.contains(needle) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(bytes)) => collected.push_str(&String::from_utf8_lossy(&bytes)),
                _ => break,
            }
        }
        collected
    }

    #[tokio::test]
    async fn pty_streams_output_and_exit_code() {
        let mut process = spawn_pty_process(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), "echo pty-$((40+2)); exit 7".to_string()],
            &std::env::temp_dir(),
            80,
            24,
        )
        .unwrap();

        let output =
            collect_output(&mut process.output_rx, "pty-42", Duration::from_secs(10)).await;
        assert!(output.contains("pty-42"), "unexpected output: {output:?}");

        let code = tokio::time::timeout(Duration::from_secs(10), process.exit_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn pty_accepts_input() {
        let mut process = spawn_pty_process(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), "read line; echo got:$line".to_string()],
            &std::env::temp_dir(),
            80,
            24,
        )
        .unwrap();

        process.controller.write(b"hello\n").unwrap();
        let output =
            collect_output(&mut process.output_rx, "got:hello", Duration::from_secs(10)).await;
        assert!(output.contains("got:hello"), "unexpected output: {output:?}");
    }

    #[tokio::test]
    async fn kill_terminates_the_child() {
        let process = spawn_pty_process(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), "sleep 300".to_string()],
            &std::env::temp_dir(),
            80,
            24,
        )
        .unwrap();

        process.controller.kill();
        let code = tokio::time::timeout(Duration::from_secs(10), process.exit_rx)
            .await
            .unwrap();
        assert!(code.is_ok());
        assert!(process.controller.is_dead());
    }
}
