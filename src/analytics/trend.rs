//! Baseline divergence and deviation text.
//!
//! A divergence starts at the first of `consecutive_points` successive
//! values that sit further than the threshold from the baseline average.
//! The threshold is `divergence_sigma` standard deviations, or
//! `fallback_fraction` of the average when the baseline has no spread.

use chrono::{DateTime, Utc};

use crate::analytics::stats::{money, round_to};
use crate::config::TrendConfig;
use crate::types::{Deviation, Direction, Divergence, MetricBaseline, TimeSeriesPoint};

/// Compares live series against stored baselines.
#[derive(Debug, Clone, Default)]
pub struct TrendDetector {
    config: TrendConfig,
}

impl TrendDetector {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Find where `series` began to diverge from a baseline.
    ///
    /// Returns `None` for fewer than three points or when no run of
    /// consecutive out-of-band values is long enough.
    pub fn detect_trend_start(
        &self,
        series: &[TimeSeriesPoint],
        baseline_avg: f64,
        baseline_std: f64,
        now: DateTime<Utc>,
    ) -> Option<Divergence> {
        let needed = self.config.consecutive_points.max(1);
        if series.len() < 3 {
            return None;
        }

        let threshold = if baseline_std > 0.0 {
            baseline_std * self.config.divergence_sigma
        } else {
            baseline_avg.abs() * self.config.fallback_fraction
        };

        let mut run = 0usize;
        for (i, point) in series.iter().enumerate() {
            if (point.value - baseline_avg).abs() > threshold {
                run += 1;
                if run >= needed {
                    let start = &series[i + 1 - run];
                    return Some(Divergence {
                        started_at: start.timestamp,
                        value: start.value,
                        days_ago: (now - start.timestamp).num_days(),
                    });
                }
            } else {
                run = 0;
            }
        }
        None
    }

    /// Divergence of `series` from a stored baseline.
    pub fn divergence_from(
        &self,
        series: &[TimeSeriesPoint],
        baseline: &MetricBaseline,
        now: DateTime<Utc>,
    ) -> Option<Divergence> {
        self.detect_trend_start(series, baseline.rolling_avg, baseline.rolling_std, now)
    }

    /// Quantify `current` against the baseline average.
    ///
    /// A zero baseline yields a zero percentage and multiplier, with the
    /// direction taken from the sign of `current`.
    pub fn calculate_deviation(&self, current: f64, baseline_avg: f64) -> Deviation {
        if baseline_avg == 0.0 {
            return Deviation {
                deviation_pct: 0.0,
                deviation_abs: round_to(current, 2),
                multiplier: 0.0,
                direction: if current > 0.0 {
                    Direction::Higher
                } else {
                    Direction::Lower
                },
            };
        }

        let diff = current - baseline_avg;
        Deviation {
            deviation_pct: round_to(diff / baseline_avg * 100.0, 1),
            deviation_abs: round_to(diff, 2),
            multiplier: round_to(current / baseline_avg, 2),
            direction: if current > baseline_avg {
                Direction::Higher
            } else {
                Direction::Lower
            },
        }
    }

    /// One-line comparison, e.g.
    /// `Material cost is $13,500.00 vs your typical $10,000.00 (1.35x higher) - started 3 days ago`.
    pub fn format_comparative_text(
        &self,
        metric_name: &str,
        current: f64,
        baseline_avg: f64,
        divergence: Option<&Divergence>,
    ) -> String {
        let mut text = format!(
            "{} is {} vs your typical {}",
            metric_name,
            money(current),
            money(baseline_avg)
        );

        let deviation = self.calculate_deviation(current, baseline_avg);
        if baseline_avg != 0.0 && (deviation.multiplier - 1.0).abs() > self.config.multiplier_note_band {
            text.push_str(&format!(
                " ({:.2}x {})",
                deviation.multiplier,
                deviation.direction.as_str()
            ));
        }

        if let Some(d) = divergence {
            text.push_str(&started_suffix(d.days_ago));
        }
        text
    }
}

fn started_suffix(days_ago: i64) -> String {
    match days_ago {
        d if d <= 0 => " - started today".to_string(),
        1 => " - started yesterday".to_string(),
        d if d < 7 => format!(" - started {d} days ago"),
        d if d < 30 => {
            let weeks = d / 7;
            let unit = if weeks == 1 { "week" } else { "weeks" };
            format!(" - started {weeks} {unit} ago")
        }
        d => format!(" - started {d} days ago"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap()
    }

    fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
        let n = values.len() as i64;
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesPoint::new(now() - Duration::days(n - i as i64), *v))
            .collect()
    }

    #[test]
    fn test_divergence_reports_first_of_run() {
        let detector = TrendDetector::default();
        // avg 100, std 5 -> threshold 10
        let s = series(&[101.0, 120.0, 99.0, 115.0, 118.0, 125.0, 130.0]);
        let d = detector.detect_trend_start(&s, 100.0, 5.0, now()).unwrap();
        assert!((d.value - 115.0).abs() < f64::EPSILON, "Run restarts after an in-band value");
        assert_eq!(d.days_ago, 4);
    }

    #[test]
    fn test_divergence_falls_back_to_fraction_of_average() {
        let detector = TrendDetector::default();
        // std 0 -> threshold 20% of 100
        let s = series(&[119.0, 119.0, 119.0, 119.0]);
        assert!(detector.detect_trend_start(&s, 100.0, 0.0, now()).is_none());
        let s = series(&[121.0, 121.0, 121.0]);
        assert!(detector.detect_trend_start(&s, 100.0, 0.0, now()).is_some());
    }

    #[test]
    fn test_divergence_needs_three_points() {
        let detector = TrendDetector::default();
        assert!(detector.detect_trend_start(&series(&[500.0, 500.0]), 1.0, 0.1, now()).is_none());
    }

    #[test]
    fn test_deviation_against_baseline() {
        let d = TrendDetector::default().calculate_deviation(13_500.0, 10_000.0);
        assert!((d.deviation_pct - 35.0).abs() < 1e-9);
        assert!((d.deviation_abs - 3_500.0).abs() < 1e-9);
        assert!((d.multiplier - 1.35).abs() < 1e-9);
        assert_eq!(d.direction, Direction::Higher);
    }

    #[test]
    fn test_deviation_zero_baseline() {
        let detector = TrendDetector::default();
        let d = detector.calculate_deviation(5.0, 0.0);
        assert!(d.deviation_pct.abs() < f64::EPSILON);
        assert!(d.multiplier.abs() < f64::EPSILON);
        assert_eq!(d.direction, Direction::Higher);
        assert_eq!(detector.calculate_deviation(-5.0, 0.0).direction, Direction::Lower);
    }

    #[test]
    fn test_comparative_text() {
        let detector = TrendDetector::default();
        let div = Divergence {
            started_at: now(),
            value: 0.0,
            days_ago: 3,
        };
        assert_eq!(
            detector.format_comparative_text("Material cost", 13_500.0, 10_000.0, Some(&div)),
            "Material cost is $13,500.00 vs your typical $10,000.00 (1.35x higher) - started 3 days ago"
        );
        assert_eq!(
            detector.format_comparative_text("Labor", 110.0, 100.0, None),
            "Labor is $110.00 vs your typical $100.00",
            "Multipliers within the band are not mentioned"
        );
    }

    #[test]
    fn test_started_suffix_buckets() {
        assert_eq!(started_suffix(0), " - started today");
        assert_eq!(started_suffix(1), " - started yesterday");
        assert_eq!(started_suffix(6), " - started 6 days ago");
        assert_eq!(started_suffix(7), " - started 1 week ago");
        assert_eq!(started_suffix(20), " - started 2 weeks ago");
        assert_eq!(started_suffix(45), " - started 45 days ago");
    }
}
