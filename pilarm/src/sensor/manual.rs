use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use super::DoorState;
use crate::shutdown::{Shutdown, ShutdownReason};
use crate::tracing::prelude::*;

/// Line-driven stand-in for the door switch, for development without
/// hardware.
///
/// Every line toggles the door state, except `exit`, which requests
/// shutdown. The read is raced against the shutdown token, so a pending read
/// never holds up shutdown.
pub struct ManualOverride<R> {
    input: R,
    door_tx: watch::Sender<DoorState>,
}

impl<R: AsyncBufRead + Unpin> ManualOverride<R> {
    pub fn new(input: R, door_tx: watch::Sender<DoorState>) -> Self {
        Self { input, door_tx }
    }

    pub async fn run(self, shutdown: Shutdown) {
        debug!("Entered keyboard input task");
        let token = shutdown.token();
        let mut lines = self.input.lines();

        loop {
            let line = tokio::select! {
                _ = token.cancelled() => break,
                line = lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) if line.trim_end() == "exit" => {
                    shutdown.trigger(ShutdownReason::ExitCommand);
                    break;
                }
                Ok(Some(_)) => {
                    self.door_tx.send_modify(|door| *door = door.toggled());
                    let door = *self.door_tx.borrow();
                    info!(%door, "Switch toggled from keyboard");
                }
                Ok(None) => {
                    info!("Keyboard input closed; switch stays as is");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read keyboard input");
                    break;
                }
            }
        }

        info!("Keyboard input task shutting down");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::time;

    use super::*;

    #[tokio::test]
    async fn each_line_toggles_the_door() {
        let (door_tx, door_rx) = watch::channel(DoorState::Closed);
        let shutdown = Shutdown::new();

        ManualOverride::new(&b"\n"[..], door_tx)
            .run(shutdown.clone())
            .await;
        assert_eq!(*door_rx.borrow(), DoorState::Open);
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn two_lines_return_to_closed() {
        let (door_tx, door_rx) = watch::channel(DoorState::Closed);

        ManualOverride::new(&b"open\nclose\n"[..], door_tx)
            .run(Shutdown::new())
            .await;

        assert_eq!(*door_rx.borrow(), DoorState::Closed);
    }

    #[tokio::test]
    async fn exit_requests_shutdown_and_stops_reading() {
        let (door_tx, door_rx) = watch::channel(DoorState::Closed);
        let shutdown = Shutdown::new();

        ManualOverride::new(&b"x\nexit\ny\n"[..], door_tx)
            .run(shutdown.clone())
            .await;

        assert!(shutdown.is_triggered());
        // Only the line before "exit" counted.
        assert_eq!(*door_rx.borrow(), DoorState::Open);
    }

    #[tokio::test]
    async fn pending_read_does_not_block_shutdown() {
        let (door_tx, _door_rx) = watch::channel(DoorState::Closed);
        let shutdown = Shutdown::new();
        // Keep the writer alive so the read never completes.
        let (reader, _writer) = tokio::io::duplex(64);

        let handle = tokio::spawn(
            ManualOverride::new(BufReader::new(reader), door_tx).run(shutdown.clone()),
        );
        time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger(ShutdownReason::Requested);

        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("override did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn lines_arriving_over_time_are_applied() {
        let (door_tx, mut door_rx) = watch::channel(DoorState::Closed);
        let shutdown = Shutdown::new();
        let (reader, mut writer) = tokio::io::duplex(64);

        let handle = tokio::spawn(
            ManualOverride::new(BufReader::new(reader), door_tx).run(shutdown.clone()),
        );

        writer.write_all(b"\n").await.unwrap();
        door_rx.changed().await.unwrap();
        assert_eq!(*door_rx.borrow(), DoorState::Open);

        writer.write_all(b"exit\n").await.unwrap();
        handle.await.unwrap();
        assert!(shutdown.is_triggered());
    }
}
