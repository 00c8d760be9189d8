//! Relaying termination signals from dev to its captured child.
//!
//! While a captured child runs, the parent must not die first and leave the
//! child orphaned. The forwarder installs handlers on the surrounding tokio
//! runtime, relays what the child would otherwise miss, and is torn down when
//! the child has been reaped.

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    SigInt,
    SigTerm,
}

impl ProcessSignal {
    pub fn label(self) -> &'static str {
        match self {
            ProcessSignal::SigInt => "SIGINT",
            ProcessSignal::SigTerm => "SIGTERM",
        }
    }
}

/// Background task relaying signals to one child; aborted on drop.
pub struct SignalForwarder {
    task: Option<JoinHandle<()>>,
}

impl SignalForwarder {
    /// Starts forwarding to `pid` when called inside a tokio runtime.
    ///
    /// Terminate is always relayed. Interrupt is relayed only when
    /// `forward_interrupt` is set; otherwise it is absorbed so the parent
    /// outlives the child and reports its exit status.
    pub fn spawn(pid: Option<u32>, forward_interrupt: bool) -> Self {
        let (Some(pid), Ok(handle)) = (pid, tokio::runtime::Handle::try_current()) else {
            return Self { task: None };
        };
        let task = handle.spawn(forward(pid, forward_interrupt));
        Self { task: Some(task) }
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(unix)]
async fn forward(pid: u32, forward_interrupt: bool) {
    use tokio::signal::unix::{signal, SignalKind};

    let Ok(mut interrupt) = signal(SignalKind::interrupt()) else {
        return;
    };
    let Ok(mut terminate) = signal(SignalKind::terminate()) else {
        return;
    };
    loop {
        let received = tokio::select! {
            Some(()) = interrupt.recv() => ProcessSignal::SigInt,
            Some(()) = terminate.recv() => ProcessSignal::SigTerm,
            else => break,
        };
        if received == ProcessSignal::SigInt && !forward_interrupt {
            tracing::debug!(pid, "interrupt left to the child's process group");
            continue;
        }
        tracing::debug!(pid, signal = received.label(), "forwarding signal to child");
        send_os_signal(pid, received);
    }
}

#[cfg(not(unix))]
async fn forward(pid: u32, _forward_interrupt: bool) {
    // Console children receive Ctrl+C themselves; keep the parent alive until they exit.
    while tokio::signal::ctrl_c().await.is_ok() {
        tracing::debug!(pid, "interrupt left to the child's console");
    }
}

#[cfg(unix)]
fn send_os_signal(pid: u32, signal: ProcessSignal) {
    let sig = match signal {
        ProcessSignal::SigInt => libc::SIGINT,
        ProcessSignal::SigTerm => libc::SIGTERM,
    };
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    unsafe {
        let _ = libc::kill(-pid, sig);
        let _ = libc::kill(pid, sig);
    }
}
