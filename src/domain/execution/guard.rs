//! Single-flight guard for the evaluate/execute critical section

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// At most one [`FlightPermit`] exists at any instant.
///
/// Acquisition never waits: a caller that finds the guard held is expected to
/// drop its work rather than queue it.
#[derive(Debug, Clone, Default)]
pub struct SingleFlightGuard {
    held: Arc<AtomicBool>,
}

impl SingleFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<FlightPermit> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit {
                held: Arc::clone(&self.held),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped, including during unwinding.
#[derive(Debug)]
pub struct FlightPermit {
    held: Arc<AtomicBool>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().expect("first acquire");
        assert!(guard.is_held());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_held());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let guard = SingleFlightGuard::new();
        let cloned = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = cloned.try_acquire().unwrap();
            panic!("coordinator blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_held());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquirers_never_overlap() {
        let guard = SingleFlightGuard::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let guard = guard.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                if let Some(_permit) = guard.try_acquire() {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!guard.is_held());
    }
}
