use {
    crate::{LuceneError, LuceneResult},
    std::sync::atomic::{AtomicI32, Ordering},
};

/// An atomic reference count that starts at one and can be decremented to zero exactly once.
///
/// Once the count reaches zero it can never be incremented again; [RefCount::try_inc_ref] fails and
/// [RefCount::dec_ref] reports an [LuceneError::IllegalState] error instead of going negative.
#[derive(Debug)]
pub struct RefCount {
    count: AtomicI32,
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCount {
    /// Create a new reference count with a single reference held by the creator.
    pub const fn new() -> Self {
        Self {
            count: AtomicI32::new(1),
        }
    }

    /// Returns the current count.
    #[inline]
    pub fn get(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    /// Increments the count if it is still positive. Returns `false` if the count already reached zero.
    pub fn try_inc_ref(&self) -> bool {
        let mut count = self.count.load(Ordering::Acquire);
        while count > 0 {
            match self.count.compare_exchange_weak(count, count + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }

        false
    }

    /// Decrements the count. Returns `true` if this call released the last reference; the caller is then
    /// responsible for disposing of the guarded object.
    pub fn dec_ref(&self) -> LuceneResult<bool> {
        let mut count = self.count.load(Ordering::Acquire);
        loop {
            if count <= 0 {
                return Err(LuceneError::IllegalState(format!(
                    "too many dec_ref calls: ref count is {count} before decrement"
                )));
            }

            match self.count.compare_exchange_weak(count, count - 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(count == 1),
                Err(actual) => count = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::RefCount,
        pretty_assertions::assert_eq,
        std::{
            sync::{
                atomic::{AtomicUsize, Ordering},
                Arc,
            },
            thread,
        },
        test_log::test,
    };

    #[test]
    fn test_balanced_inc_dec() {
        let rc = RefCount::new();
        for _ in 0..10 {
            assert!(rc.try_inc_ref());
        }
        for _ in 0..10 {
            assert!(!rc.dec_ref().unwrap());
        }
        assert_eq!(rc.get(), 1);
        assert!(rc.dec_ref().unwrap());
        assert_eq!(rc.get(), 0);
    }

    #[test]
    fn test_no_resurrection() {
        let rc = RefCount::new();
        assert!(rc.dec_ref().unwrap());
        assert!(!rc.try_inc_ref());
        assert!(rc.dec_ref().unwrap_err().is_illegal_state());
        assert_eq!(rc.get(), 0);
    }

    #[test]
    fn test_concurrent_zero_transition_happens_once() {
        let rc = Arc::new(RefCount::new());
        for _ in 0..63 {
            assert!(rc.try_inc_ref());
        }

        let zeroes = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let rc = Arc::clone(&rc);
                let zeroes = Arc::clone(&zeroes);
                thread::spawn(move || {
                    if rc.dec_ref().unwrap() {
                        zeroes.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(zeroes.load(Ordering::SeqCst), 1);
    }
}
