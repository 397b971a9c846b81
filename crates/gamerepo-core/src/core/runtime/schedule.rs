use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flight guard for one periodic task.
///
/// The guard is either idle or running. Starting a task that is already
/// running is refused; the caller drops that invocation instead of queueing it.
#[derive(Debug)]
pub struct TaskGuard {
    name: &'static str,
    running: AtomicBool,
}

impl TaskGuard {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            running: AtomicBool::new(false),
        }
    }

    /// Moves the guard to running. The returned ticket moves it back to idle
    /// when dropped.
    #[must_use]
    pub fn try_start(&self) -> Option<TaskTicket<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TaskTicket { guard: self })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug)]
pub struct TaskTicket<'a> {
    guard: &'a TaskGuard,
}

impl Drop for TaskTicket<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    use super::*;

    #[test]
    fn second_start_is_refused_while_running() {
        let guard = TaskGuard::new("catalog");
        let ticket = guard.try_start().expect("idle guard starts");
        assert!(guard.is_running());
        assert!(guard.try_start().is_none());
        drop(ticket);
        assert!(!guard.is_running());
        assert!(guard.try_start().is_some());
    }

    #[test]
    fn only_one_thread_wins_a_race() {
        let guard = Arc::new(TaskGuard::new("race"));
        let barrier = Arc::new(Barrier::new(8));
        let winners = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                let release = Arc::clone(&release);
                std::thread::spawn(move || {
                    barrier.wait();
                    let ticket = guard.try_start();
                    if ticket.is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    release.wait();
                    drop(ticket);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(!guard.is_running());
    }
}
