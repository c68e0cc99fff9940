use std::time::Instant;

use number_prefix::NumberPrefix;

use crate::progress::SymbolNum;

#[must_use]
pub(crate) fn format_stats(start_time: Instant, symbols: SymbolNum) -> String {
    let elapsed = start_time.elapsed();

    let size_human = format_symbols(symbols);

    let rate = symbols.get() as f32 / elapsed.as_secs_f32();
    let rate_human = match NumberPrefix::decimal(rate) {
        NumberPrefix::Standalone(symbols) => {
            format!("{} sym/s", symbols)
        }
        NumberPrefix::Prefixed(prefix, n) => {
            format!("{:.3} {}sym/s", n, prefix)
        }
    };

    format!(
        "{} in {:.2}s ({})",
        size_human,
        elapsed.as_secs_f32(),
        rate_human,
    )
}

#[must_use]
pub(crate) fn format_symbols(symbols: SymbolNum) -> String {
    match NumberPrefix::decimal(symbols.get() as f32) {
        NumberPrefix::Standalone(symbols) => {
            format!("{} symbols", symbols)
        }
        NumberPrefix::Prefixed(prefix, n) => {
            format!("{:.2} {}symbols", n, prefix)
        }
    }
}

/// Ratio as a percentage, `0` when the denominator is empty.
#[must_use]
pub(crate) fn percentage(part: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use crate::progress::SymbolNum;
    use crate::stats::{format_symbols, percentage};

    #[test]
    fn test_format_symbols() {
        assert_eq!(format_symbols(SymbolNum::new(999)), "999 symbols");
        assert_eq!(format_symbols(SymbolNum::new(12_500)), "12.50 ksymbols");
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 0), 0.0);
    }
}
