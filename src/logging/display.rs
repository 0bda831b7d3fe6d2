//! Command-line logger
use super::chunk::{ByTime, ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
use super::{Id, LogError, LogValue, StatsLogger};
use crate::utils::fmt::{DisplayFn, PrettyPrint, Rate};
use std::fmt;
use std::time::Duration;
use yansi::Paint;

/// Logger that displays grouped summaries to standard output.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DisplayLogger<C: Chunker = ByTime>(ChunkLogger<C, DisplayBackend>);

impl<C: Chunker> DisplayLogger<C> {
    #[inline]
    pub fn new(chunker: C) -> Self {
        Self(ChunkLogger::new(chunker, DisplayBackend))
    }
}

impl<C: Chunker> StatsLogger for DisplayLogger<C> {
    #[inline]
    fn group_start(&mut self) {
        self.0.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.0.group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.0.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.0.flush()
    }
}

/// Logging backend that displays summaries to standard output.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayBackend;

impl SummaryWriter for DisplayBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
    {
        let elapsed = &elapsed;
        println!();
        for (id, summary) in summaries {
            println!(
                "{:<32} {}",
                Paint::fixed(35, id),
                DisplaySummary { summary, elapsed }
            );
        }
    }
}

#[derive(Debug)]
struct DisplaySummary<'a> {
    summary: &'a ChunkSummary,
    elapsed: &'a Duration,
}

impl<'a> fmt::Display for DisplaySummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.summary {
            ChunkSummary::Counter {
                increment,
                initial_value,
            } => {
                write!(
                    f,
                    "{}  (+{})",
                    initial_value + increment,
                    Paint::fixed(253, increment)
                )?;
                if *increment > 5 {
                    // Only accurate with several increments per chunk
                    let period = duration_div_u64(*self.elapsed, *increment);
                    write!(f, "  {:.2}", Paint::fixed(111, Rate::from_period(period)))?;
                }
                Ok(())
            }
            ChunkSummary::Duration { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.4}", PrettyPrint(Duration::from_secs_f64(mean)))?;
                    if stats.count() > 1 {
                        let stddev = stats.stddev().unwrap_or(0.0);
                        write!(
                            f,
                            " {}",
                            Paint::fixed(
                                8,
                                DisplayFn(|f| write!(
                                    f,
                                    "(σ {:.4})",
                                    PrettyPrint(Duration::from_secs_f64(stddev))
                                ))
                            )
                        )?;
                    }
                    write!(
                        f,
                        " {}",
                        Paint::fixed(
                            221,
                            DisplayFn(|f| write!(
                                f,
                                "{:.2}%",
                                mean * stats.count() as f64 / self.elapsed.as_secs_f64() * 100.0
                            ))
                        )
                    )?;
                }
                Ok(())
            }
            ChunkSummary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.3}", PrettyPrint(mean))?;
                    if stats.count() > 1 {
                        let stddev = stats.stddev().unwrap_or(0.0);
                        write!(
                            f,
                            " {}",
                            Paint::fixed(
                                8,
                                DisplayFn(|f| write!(f, "(σ {:.3})", PrettyPrint(stddev)))
                            )
                        )?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Divide a `Duration` by `u64`
fn duration_div_u64(d: Duration, x: u64) -> Duration {
    // Float division if the divisor does not fit in u32
    if let Ok(x32) = u32::try_from(x) {
        d / x32
    } else {
        #[allow(clippy::cast_precision_loss)]
        d.div_f64(x as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::stats::OnlineMeanVariance;

    #[test]
    fn display_scalar() {
        Paint::disable();
        let stats: OnlineMeanVariance<f64> = [1.0, 3.0].into_iter().collect();
        let summary = ChunkSummary::Scalar { stats };
        let elapsed = Duration::from_secs(1);
        let text = DisplaySummary {
            summary: &summary,
            elapsed: &elapsed,
        }
        .to_string();
        assert_eq!(text, "2.000 (σ 1.000)");
    }

    #[test]
    fn display_counter() {
        Paint::disable();
        let summary = ChunkSummary::Counter {
            increment: 2,
            initial_value: 10,
        };
        let elapsed = Duration::from_secs(1);
        let text = DisplaySummary {
            summary: &summary,
            elapsed: &elapsed,
        }
        .to_string();
        assert_eq!(text, "12  (+2)");
    }

    #[test]
    fn duration_div() {
        assert_eq!(
            duration_div_u64(Duration::from_secs(10), 4),
            Duration::from_millis(2500)
        );
    }
}
