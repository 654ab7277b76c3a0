//! Signal-driven shutdown. Kept in its own test binary so the raised signal
//! only reaches the coordinator under test.
#![cfg(unix)]

use std::time::Duration;

use jobvisor::{Coordinator, CoordinatorConfig, LifecycleState};
use tokio::time::timeout;

#[tokio::test]
async fn test_sigterm_shuts_down_running_coordinator() {
    let coordinator = Coordinator::new(CoordinatorConfig {
        queue_capacity: 16,
        poll_interval: Duration::from_millis(20),
        startup_timeout: Duration::from_secs(1),
    });
    let runner = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run().await })
    };
    assert!(coordinator.wait_until_running().await);

    // SAFETY: raise(3) only delivers a signal to this process; tokio's handler is installed.
    let rc = unsafe { libc::raise(libc::SIGTERM) };
    assert_eq!(rc, 0);

    timeout(Duration::from_secs(2), runner)
        .await
        .expect("SIGTERM should end run()")
        .unwrap()
        .unwrap();

    assert_eq!(coordinator.state(), LifecycleState::Stopped);
    assert!(!coordinator.is_running());
    assert!(!coordinator.bus().is_running());
}
