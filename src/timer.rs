use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

/// Rolling average over the last `capacity` tic/tac intervals.
///
/// The buffer always holds exactly `capacity` slots. Slots stay empty until
/// enough samples arrived, and the average only counts the populated ones.
#[derive(Debug)]
pub struct RollingTimer {
    tic: Option<Instant>,
    samples: VecDeque<Option<Duration>>,
}

impl RollingTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            tic: None,
            samples: std::iter::repeat(None).take(capacity).collect(),
        }
    }

    pub fn tic(&mut self) {
        self.tic = Some(Instant::now());
    }

    /// Close the interval opened by `tic` and return the updated average.
    pub fn tac(&mut self) -> Result<Duration> {
        let Some(tic) = self.tic.take() else {
            bail!("tac called without a matching tic");
        };
        Ok(self.record(tic.elapsed()))
    }

    /// Push a sample, evicting the oldest one. Returns the new average.
    pub fn record(&mut self, sample: Duration) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.pop_front();
        self.samples.push_back(Some(sample));
        self.average().unwrap_or_default()
    }

    pub fn average(&self) -> Option<Duration> {
        let (sum, count) = self
            .samples
            .iter()
            .flatten()
            .fold((Duration::ZERO, 0u32), |(sum, count), d| (sum + *d, count + 1));
        if count == 0 {
            return None;
        }
        Some(sum / count)
    }

    /// Samples per second implied by the average
    pub fn rate(&self) -> Option<f64> {
        let average = self.average()?.as_secs_f64();
        if average > 0. {
            Some(1. / average)
        } else {
            None
        }
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.samples.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_average_warm_up() {
        let mut timer = RollingTimer::new(30);
        assert_eq!(timer.average(), None);
        assert_eq!(timer.rate(), None);

        assert_eq!(timer.record(ms(10)), ms(10));
        assert_eq!(timer.record(ms(20)), ms(15));
        assert_eq!(timer.record(ms(60)), ms(30));
        assert_eq!(timer.len(), 3);
        assert_eq!(timer.capacity(), 30);
    }

    #[test]
    fn test_average_matches_mean_of_fed_samples() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let capacity = 30;
        let mut timer = RollingTimer::new(capacity);
        let mut fed = vec![];
        for _ in 0..capacity {
            let sample = Duration::from_micros(rng.gen_range(100..50_000));
            fed.push(sample);
            timer.record(sample);
            let mean = fed.iter().sum::<Duration>() / fed.len() as u32;
            assert_eq!(timer.average(), Some(mean));
        }
    }

    #[test]
    fn test_oldest_sample_evicted() {
        let mut timer = RollingTimer::new(3);
        timer.record(ms(100));
        timer.record(ms(1));
        timer.record(ms(2));
        assert_eq!(timer.average(), Some(ms(103) / 3));
        timer.record(ms(3));
        assert_eq!(timer.average(), Some(ms(2)));
        assert_eq!(timer.len(), 3);
        assert_eq!(timer.capacity(), 3);
    }

    #[test]
    fn test_window_keeps_last_samples() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let capacity = 8;
        let mut timer = RollingTimer::new(capacity);
        let fed: Vec<Duration> = (0..capacity * 3 + 1)
            .map(|_| Duration::from_micros(rng.gen_range(1..10_000)))
            .collect();
        for sample in &fed {
            timer.record(*sample);
        }
        let tail = &fed[fed.len() - capacity..];
        let mean = tail.iter().sum::<Duration>() / capacity as u32;
        assert_eq!(timer.average(), Some(mean));
    }

    #[test]
    fn test_tic_tac() {
        let mut timer = RollingTimer::new(2);
        assert!(timer.tac().is_err());
        assert!(timer.is_empty());

        timer.tic();
        std::thread::sleep(ms(2));
        let average = timer.tac().unwrap();
        assert!(average >= ms(2));
        assert_eq!(timer.len(), 1);

        // the tic is consumed by the first tac
        assert!(timer.tac().is_err());
        assert_eq!(timer.len(), 1);
    }

    #[test]
    fn test_rate() {
        let mut timer = RollingTimer::new(4);
        timer.record(ms(20));
        timer.record(ms(30));
        let rate = timer.rate().unwrap();
        assert!((rate - 40.).abs() < 1e-9);

        let mut zero = RollingTimer::new(1);
        zero.record(Duration::ZERO);
        assert_eq!(zero.rate(), None);
    }

    #[test]
    fn test_zero_capacity() {
        let mut timer = RollingTimer::new(0);
        assert_eq!(timer.record(ms(5)), Duration::ZERO);
        assert_eq!(timer.average(), None);
        assert_eq!(timer.capacity(), 0);
    }
}
