//! Formatting utilities
use std::fmt;
use std::time::Duration;

/// Pretty-printing
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd)]
pub struct PrettyPrint<T>(pub T);

impl fmt::Display for PrettyPrint<f64> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let magnitude = self.0.abs();
        if (magnitude >= 1e6 || magnitude <= 1e-4) && self.0 != 0.0 {
            fmt::LowerExp::fmt(&self.0, f)
        } else {
            fmt::Display::fmt(&self.0, f)
        }
    }
}

impl fmt::Display for PrettyPrint<Duration> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Display a rate of events per second.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Rate(pub f64);

impl Rate {
    pub fn from_period(period: Duration) -> Self {
        Self(period.as_secs_f64().recip())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = self.0;
        let (coef, unit) = if (1e3..1e6).contains(&value) {
            (value / 1e3, "k/s")
        } else if value >= 1e6 {
            (value / 1e6, "M/s")
        } else {
            (value, "/s")
        };
        fmt::Display::fmt(&PrettyPrint(coef), f)?;
        f.write_str(unit)
    }
}

/// Wraps a closure as the Display implementation
#[derive(Debug)]
pub struct DisplayFn<F>(pub F)
where
    F: Fn(&mut fmt::Formatter) -> fmt::Result;

impl<F> fmt::Display for DisplayFn<F>
where
    F: Fn(&mut fmt::Formatter) -> fmt::Result,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self.0)(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_print_small_uses_exponent() {
        assert_eq!(format!("{}", PrettyPrint(1e-5)), "1e-5");
        assert_eq!(format!("{}", PrettyPrint(0.0)), "0");
        assert_eq!(format!("{}", PrettyPrint(1.5)), "1.5");
    }

    #[test]
    fn rate_units() {
        assert_eq!(format!("{:.1}", Rate(2500.0)), "2.5k/s");
        assert_eq!(format!("{:.1}", Rate::from_period(Duration::from_millis(500))), "2.0/s");
    }
}
