use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pgcomp::progress::{ProgressNotifier, SymbolNum};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ProgressUnit {
    Symbols,
    Iterations,
}

#[derive(Debug)]
struct PgProgressBarState {
    length: u64,
    unit: ProgressUnit,
    initialized: bool,
}

/// Progress bar shared by the logger and the library stages.
///
/// Counts either processed symbols or stage iterations, whichever the stage
/// announced last.
#[derive(Debug, Clone)]
pub(crate) struct PgProgressBar {
    bar: ProgressBar,
    state: Arc<Mutex<PgProgressBarState>>,
}

impl PgProgressBar {
    pub fn new() -> PgProgressBar {
        let bar = ProgressBar::hidden();
        bar.set_style(ProgressStyle::default_spinner());
        bar.enable_steady_tick(Duration::from_millis(50));
        bar.set_message("Initializing...");

        Self {
            bar,
            state: Arc::new(Mutex::new(PgProgressBarState {
                length: 0,
                unit: ProgressUnit::Symbols,
                initialized: false,
            })),
        }
    }

    pub fn show(&self) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear()
    }

    pub fn println<I: AsRef<str>>(&self, msg: I) {
        self.bar.println(msg);
    }

    fn lock_state(&self) -> MutexGuard<PgProgressBarState> {
        self.state
            .lock()
            .expect("Could not acquire progress bar lock")
    }

    fn style(unit: ProgressUnit, length: u64) -> ProgressStyle {
        let template = match (unit, length) {
            (ProgressUnit::Symbols, 0) => "{spinner} {pos} symbols ({per_sec}) {msg}",
            (ProgressUnit::Symbols, _) => "{wide_bar} {pos}/{len} symbols [ETA {eta}]",
            (ProgressUnit::Iterations, 0) => "{spinner} {pos}/? {msg}",
            (ProgressUnit::Iterations, _) => "{wide_bar} {pos}/{len} [ETA {eta}]",
        };

        let style = if length == 0 {
            ProgressStyle::default_spinner()
        } else {
            ProgressStyle::default_bar()
        };
        style
            .template(template)
            .expect("Invalid progress bar template")
    }

    #[inline]
    fn inc(&self, unit: ProgressUnit, value: u64) {
        let mut state = self.lock_state();
        if state.unit != unit {
            return;
        }

        if !state.initialized {
            if state.length != 0 {
                self.bar.set_length(state.length);
            }
            self.bar.set_position(0);
            self.bar.set_style(Self::style(state.unit, state.length));
            state.initialized = true;
        }
        self.bar.inc(value);
    }

    fn reset(&self, unit: ProgressUnit, length: u64) {
        let mut state = self.lock_state();

        state.initialized = false;
        state.unit = unit;
        state.length = length;
    }

    /// Switches to counting symbols; `0` if the total is unknown.
    pub fn set_total_symbols(&self, length: u64) {
        self.reset(ProgressUnit::Symbols, length);
    }
}

impl ProgressNotifier for PgProgressBar {
    fn processed_symbols(&self, symbols: SymbolNum) {
        self.inc(ProgressUnit::Symbols, symbols.get() as u64);
    }

    fn set_iter_num(&self, num_iter: u64) {
        self.reset(ProgressUnit::Iterations, num_iter);
    }

    fn inc_iter(&self) {
        self.inc(ProgressUnit::Iterations, 1);
    }
}
