use std::fmt::Debug;

use derive_more::{Add, AddAssign};

/// Number of nucleotide symbols processed by a stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Add, AddAssign)]
#[repr(transparent)]
pub struct SymbolNum(usize);

impl SymbolNum {
    pub const ZERO: SymbolNum = SymbolNum(0);

    #[inline]
    #[must_use]
    pub const fn new(symbols: usize) -> Self {
        Self(symbols)
    }

    #[inline]
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }
}

/// Receives progress updates from the long-running stages (assembly sweep,
/// reads matching, Pg deduplication).
pub trait ProgressNotifier: Debug + Send + Sync {
    fn processed_symbols(&self, symbols: SymbolNum);

    fn set_iter_num(&self, num_iter: u64);

    fn inc_iter(&self);
}

impl<T: ProgressNotifier> ProgressNotifier for &T {
    fn processed_symbols(&self, symbols: SymbolNum) {
        T::processed_symbols(self, symbols)
    }

    fn set_iter_num(&self, num_iter: u64) {
        T::set_iter_num(self, num_iter)
    }

    fn inc_iter(&self) {
        T::inc_iter(self)
    }
}

#[derive(Clone, Debug)]
pub struct DummyProgressNotifier;

impl ProgressNotifier for DummyProgressNotifier {
    fn processed_symbols(&self, _symbols: SymbolNum) {
        // do nothing
    }

    fn set_iter_num(&self, _num_iter: u64) {
        // do nothing
    }

    fn inc_iter(&self) {
        // do nothing
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::progress::{DummyProgressNotifier, ProgressNotifier, SymbolNum};

    #[derive(Debug, Default)]
    struct CountingNotifier {
        symbols: AtomicU64,
        iters: AtomicU64,
    }

    impl ProgressNotifier for CountingNotifier {
        fn processed_symbols(&self, symbols: SymbolNum) {
            self.symbols
                .fetch_add(symbols.get() as u64, Ordering::Relaxed);
        }

        fn set_iter_num(&self, _num_iter: u64) {}

        fn inc_iter(&self) {
            self.iters.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_dummy_progress_notifier() {
        let notifier = DummyProgressNotifier;
        notifier.processed_symbols(SymbolNum::new(1337));
        let notifier_2 = notifier;
        notifier_2.processed_symbols(SymbolNum::new(666));
    }

    #[test]
    fn test_notifier_by_reference() {
        let notifier = CountingNotifier::default();
        let by_ref = &notifier;
        by_ref.processed_symbols(SymbolNum::new(10));
        by_ref.processed_symbols(SymbolNum::new(5));
        by_ref.inc_iter();

        assert_eq!(notifier.symbols.load(Ordering::Relaxed), 15);
        assert_eq!(notifier.iters.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_symbol_num_add() {
        let mut num = SymbolNum::ZERO;
        num += SymbolNum::new(3);
        assert_eq!(num + SymbolNum::new(4), SymbolNum::new(7));
    }
}
