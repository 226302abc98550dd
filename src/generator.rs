//! Synthetic sensor readings.
//!
//! Values are independent uniform draws inside fixed bounds; there is no
//! trend or autocorrelation. The random source is always passed in, so a
//! seeded `StdRng` reproduces a series exactly.

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::metrics::{Node, Reading};
use crate::period::{self, Period};

/// Half-open interval `[low, high)` a value is drawn from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

impl ValueRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.low..self.high)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value < self.high
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SampleRanges {
    pub temperature: ValueRange,
    pub humidity: ValueRange,
    pub weight: ValueRange,
}

impl Default for SampleRanges {
    fn default() -> Self {
        Self {
            temperature: ValueRange::new(20.0, 35.0),
            humidity: ValueRange::new(40.0, 70.0),
            weight: ValueRange::new(45.0, 55.0),
        }
    }
}

impl SampleRanges {
    pub fn validate(&self) -> Result<()> {
        for (name, range) in [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("weight", self.weight),
        ] {
            if !(range.low.is_finite() && range.high.is_finite() && range.low < range.high) {
                return Err(Error::invalid(format!(
                    "{} range [{}, {}) is empty",
                    name, range.low, range.high
                )));
            }
        }
        Ok(())
    }

    /// Draws one reading for `node`. Weight is only drawn for hive nodes.
    pub fn sample<R: Rng>(&self, rng: &mut R, node: &Node, timestamp: DateTime<Utc>) -> Reading {
        let temperature = self.temperature.sample(rng);
        let humidity = self.humidity.sample(rng);
        let weight = node.is_hive().then(|| self.weight.sample(rng));

        Reading {
            timestamp,
            temperature,
            humidity,
            weight,
        }
    }
}

/// Builds the historical chart series for a node
#[derive(Debug, Clone, Default)]
pub struct SeriesGenerator {
    ranges: SampleRanges,
}

impl SeriesGenerator {
    pub fn new(ranges: SampleRanges) -> Result<Self> {
        ranges.validate()?;
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &SampleRanges {
        &self.ranges
    }

    /// Readings for every bucket of `period` around `reference`, ascending by timestamp.
    pub fn generate<Tz, R>(
        &self,
        rng: &mut R,
        node: &Node,
        period: Period,
        reference: &DateTime<Tz>,
    ) -> Result<Vec<Reading>>
    where
        Tz: TimeZone,
        R: Rng,
    {
        let window = period::resolve(period, reference)?;
        debug!(
            node = %node.id,
            %period,
            start = %window.start.with_timezone(&Utc),
            count = window.sample_count,
            "Generating series"
        );

        let readings = window
            .timestamps()
            .map(|ts| self.ranges.sample(&mut *rng, node, ts.with_timezone(&Utc)))
            .collect();

        Ok(readings)
    }

    /// Same as [`generate`](Self::generate) but from a date-picker value.
    pub fn generate_for_selection<Tz, R>(
        &self,
        rng: &mut R,
        node: &Node,
        period: Period,
        value: &str,
        tz: &Tz,
    ) -> Result<Vec<Reading>>
    where
        Tz: TimeZone,
        R: Rng,
    {
        let reference = period::parse_reference(tz, period, value)?;
        self.generate(rng, node, period, &reference)
    }
}

/// One chart line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartDataset {
    pub label: String,
    pub unit: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub x: DateTime<Utc>,
    pub y: f64,
}

/// Splits a series into temperature, humidity and, when the series carries it, weight lines.
pub fn chart_datasets(readings: &[Reading]) -> Vec<ChartDataset> {
    let mut datasets = vec![
        dataset(readings, "Temperature", "°C", |r| Some(r.temperature)),
        dataset(readings, "Humidity", "%", |r| Some(r.humidity)),
    ];

    if readings.first().and_then(|r| r.weight).is_some() {
        datasets.push(dataset(readings, "Weight", "kg", |r| r.weight));
    }

    datasets
}

fn dataset<F>(readings: &[Reading], label: &str, unit: &str, value: F) -> ChartDataset
where
    F: Fn(&Reading) -> Option<f64>,
{
    ChartDataset {
        label: label.to_string(),
        unit: unit.to_string(),
        points: readings
            .iter()
            .filter_map(|r| value(r).map(|y| ChartPoint { x: r.timestamp, y }))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::metrics::NodeKind;

    fn hive() -> Node {
        Node::new("node_001", "North hive", NodeKind::Hive)
    }

    fn ambient() -> Node {
        Node::new("node_A_001", "North ambient", NodeKind::Ambient)
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 20, 0).unwrap()
    }

    #[test]
    fn test_series_length_per_period() {
        let generator = SeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        for (period, expected) in [
            (Period::Day, 24),
            (Period::Week, 7),
            (Period::Month, 30),
            (Period::Year, 12),
        ] {
            let series = generator.generate(&mut rng, &hive(), period, &reference()).unwrap();
            assert_eq!(series.len(), expected, "{}", period);
        }
    }

    #[test]
    fn test_values_within_bounds() {
        let generator = SeriesGenerator::default();
        let ranges = SampleRanges::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            for reading in generator.generate(&mut rng, &hive(), Period::Month, &reference()).unwrap() {
                assert!(ranges.temperature.contains(reading.temperature));
                assert!(ranges.humidity.contains(reading.humidity));
                assert!(ranges.weight.contains(reading.weight.unwrap()));
            }
        }
    }

    #[test]
    fn test_weight_only_for_hives() {
        let generator = SeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(1);
        let hive_series = generator.generate(&mut rng, &hive(), Period::Week, &reference()).unwrap();
        let ambient_series = generator.generate(&mut rng, &ambient(), Period::Week, &reference()).unwrap();
        assert!(hive_series.iter().all(|r| r.weight.is_some()));
        assert!(ambient_series.iter().all(|r| r.weight.is_none()));
    }

    #[test]
    fn test_seeded_generation_is_repeatable() {
        let generator = SeriesGenerator::default();
        let first = generator
            .generate(&mut StdRng::seed_from_u64(99), &hive(), Period::Day, &reference())
            .unwrap();
        let second = generator
            .generate(&mut StdRng::seed_from_u64(99), &hive(), Period::Day, &reference())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unseeded_generation_keeps_timestamps() {
        let generator = SeriesGenerator::default();
        let first = generator
            .generate(&mut rand::thread_rng(), &hive(), Period::Week, &reference())
            .unwrap();
        let second = generator
            .generate(&mut rand::thread_rng(), &hive(), Period::Week, &reference())
            .unwrap();
        let ts = |s: &[Reading]| s.iter().map(|r| r.timestamp).collect::<Vec<_>>();
        assert_eq!(ts(&first), ts(&second));
    }

    #[test]
    fn test_timestamps_ascend_by_interval() {
        let generator = SeriesGenerator::default();
        let series = generator
            .generate(&mut StdRng::seed_from_u64(3), &ambient(), Period::Day, &reference())
            .unwrap();
        assert_eq!(series[0].timestamp, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
        for pair in series.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
        }
    }

    #[test]
    fn test_generate_for_selection() {
        let generator = SeriesGenerator::default();
        let series = generator
            .generate_for_selection(&mut StdRng::seed_from_u64(5), &hive(), Period::Month, "2024-03", &Utc)
            .unwrap();
        assert_eq!(series.len(), 30);
        assert_eq!(series[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let err = generator
            .generate_for_selection(&mut StdRng::seed_from_u64(5), &hive(), Period::Month, "March", &Utc)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let mut ranges = SampleRanges::default();
        ranges.humidity = ValueRange::new(70.0, 40.0);
        assert!(SeriesGenerator::new(ranges).is_err());
    }

    #[test]
    fn test_chart_datasets() {
        let generator = SeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(11);
        let hive_series = generator.generate(&mut rng, &hive(), Period::Week, &reference()).unwrap();
        let datasets = chart_datasets(&hive_series);
        assert_eq!(datasets.len(), 3);
        assert_eq!(datasets[2].label, "Weight");
        assert_eq!(datasets[2].points.len(), 7);

        let ambient_series = generator.generate(&mut rng, &ambient(), Period::Week, &reference()).unwrap();
        assert_eq!(chart_datasets(&ambient_series).len(), 2);
        assert!(chart_datasets(&[]).iter().all(|d| d.points.is_empty()));
    }
}
