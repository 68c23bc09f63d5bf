use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const IDLE: u8 = 0;
const ARMED: u8 = 1;
const FIRING: u8 = 2;

/// Shared "still wanted" flag between a scheduled callback and its owner.
///
/// A fresh token is armed. The owner disarms it with
/// [`cancel`](Self::cancel); a one-shot callback moves it to firing with
/// [`try_claim`](Self::try_claim) right before it runs and back to idle with
/// [`finish`](Self::finish) once it returns. Claiming and canceling race on
/// one atomic, so exactly one of them wins an armed token.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<AtomicU8>,
}

impl CancelToken {
    /// An armed token.
    pub fn new() -> Self {
        Self::with_state(ARMED)
    }

    /// A token that is already idle.
    pub fn inactive() -> Self {
        Self::with_state(IDLE)
    }

    fn with_state(state: u8) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(state)),
        }
    }

    /// True while armed or while a claimed callback is still running.
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// True only while armed and unclaimed.
    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }

    /// Makes the token idle. Returns `true` if it was active. Canceling a
    /// firing token does not interrupt the running callback.
    pub fn cancel(&self) -> bool {
        self.state.swap(IDLE, Ordering::AcqRel) != IDLE
    }

    /// Armed to firing. `true` means the caller owns the single permitted
    /// execution.
    pub fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(ARMED, FIRING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Firing to idle, after the claimed callback returned. No effect if the
    /// token was canceled meanwhile.
    pub fn finish(&self) {
        let _ = self
            .state
            .compare_exchange(FIRING, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_claim_then_finish() {
        let token = CancelToken::new();
        assert!(token.is_armed());
        assert!(token.try_claim());
        assert!(token.is_active());
        assert!(!token.is_armed());
        assert!(!token.try_claim());

        token.finish();
        assert!(!token.is_active());
        assert!(!token.cancel());
    }

    #[test]
    fn test_cancel_beats_claim() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(!token.try_claim());
        assert!(!token.is_active());
    }

    #[test]
    fn test_cancel_while_firing() {
        let token = CancelToken::new();
        assert!(token.try_claim());
        assert!(token.cancel());
        token.finish();
        assert!(!token.is_active());
    }

    #[test]
    fn test_inactive() {
        let token = CancelToken::inactive();
        assert!(!token.is_active());
        assert!(!token.try_claim());
    }

    #[test]
    fn test_racing_claims() {
        for _ in 0..100 {
            let token = CancelToken::new();
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let token = token.clone();
                    thread::spawn(move || token.try_claim())
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }
}
