//! Fire-and-forget side effects.
//!
//! Background tasks run on detached threads. Their outcome only ever reaches
//! the log; callers never join them and never see their errors.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, error, warn};

use crate::error::Result;

/// Run `task` on a detached, named thread.
pub fn spawn_detached<F>(name: &str, task: F)
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let label = name.to_string();
    let spawned = thread::Builder::new()
        .name(format!("bg-{label}"))
        .spawn(move || match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => debug!(task = %label, "background task finished"),
            Ok(Err(err)) => warn!(task = %label, error = %err, "background task failed"),
            Err(_) => error!(task = %label, "background task panicked"),
        });

    if let Err(err) = spawned {
        warn!(task = %name, error = %err, "could not spawn background task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SgError;
    use std::time::Duration;

    #[test]
    fn task_runs_and_failures_stay_local() {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let tx_fail = tx.clone();

        spawn_detached("ok", move || {
            tx.send("ok").ok();
            Ok(())
        });
        spawn_detached("fails", move || {
            tx_fail.send("fails").ok();
            Err(SgError::NotFound("nothing".into()))
        });

        let mut seen = vec![
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        seen.sort_unstable();
        assert_eq!(seen, ["fails", "ok"]);
    }

    #[test]
    fn panicking_task_does_not_propagate() {
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        spawn_detached("panics", move || {
            let _keep = tx;
            panic!("boom");
        });
        // The sender is dropped during unwinding, closing the channel.
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
    }
}
