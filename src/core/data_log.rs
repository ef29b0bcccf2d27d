// In-memory time-series model: named channels of timestamped samples

use serde::Serialize;

use crate::core::constants::MAX_CHANNEL_SAMPLES;
use crate::core::error::{LdError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub name: String,
    pub units: String,
    /// Display precision hint.
    pub decimals: i32,
    samples: Vec<Sample>,
}

impl Channel {
    pub fn new(name: impl Into<String>, units: impl Into<String>, decimals: i32) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            decimals,
            samples: Vec::new(),
        }
    }

    /// Append a sample. Callers feed samples in time-ascending order; nothing
    /// here reorders them.
    pub fn append_sample(&mut self, timestamp: f64, value: f64) {
        self.samples.push(Sample { timestamp, value });
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start(&self) -> Option<f64> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn end(&self) -> Option<f64> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Average sample rate in Hz over the channel's own span.
    pub fn avg_frequency(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let duration = self.samples[self.samples.len() - 1].timestamp - self.samples[0].timestamp;
        if duration <= 0.0 {
            return 0.0;
        }
        (self.samples.len() - 1) as f64 / duration
    }

    /// Replace the samples with values linearly interpolated on the grid
    /// `start + k / frequency` for every grid point up to `end`. Grid points
    /// outside the channel's span take its first or last value.
    ///
    /// Fails without touching the samples if the grid would not fit in one
    /// LD sample buffer or cannot be allocated.
    pub fn resample(&mut self, start: f64, end: f64, frequency: f64) -> Result<()> {
        if let Some(resampled) = self.resampled(start, end, frequency)? {
            self.samples = resampled;
        }
        Ok(())
    }

    fn resampled(&self, start: f64, end: f64, frequency: f64) -> Result<Option<Vec<Sample>>> {
        check_frequency(frequency)?;
        if self.samples.is_empty() || end < start {
            return Ok(None);
        }

        let steps = ((end - start) * frequency + 1e-9).floor();
        if !steps.is_finite() || steps >= MAX_CHANNEL_SAMPLES as f64 {
            return Err(LdError::OffsetOverflow("resample grid"));
        }
        let count = (steps as usize)
            .checked_add(1)
            .ok_or(LdError::OffsetOverflow("resample grid"))?;

        let mut resampled: Vec<Sample> = Vec::new();
        resampled
            .try_reserve_exact(count)
            .map_err(|_| LdError::AllocationFailure {
                requested: count.saturating_mul(std::mem::size_of::<Sample>()),
            })?;

        let period = 1.0 / frequency;
        let mut idx = 0;

        for k in 0..count {
            let t = start + k as f64 * period;
            while idx + 1 < self.samples.len() && self.samples[idx + 1].timestamp <= t {
                idx += 1;
            }
            resampled.push(Sample {
                timestamp: t,
                value: self.interpolate_from(idx, t),
            });
        }

        Ok(Some(resampled))
    }

    fn interpolate_from(&self, idx: usize, t: f64) -> f64 {
        let first = self.samples[0];
        let last = self.samples[self.samples.len() - 1];
        if t <= first.timestamp {
            return first.value;
        }
        if t >= last.timestamp {
            return last.value;
        }

        let a = self.samples[idx];
        let b = self.samples[idx + 1];
        let span = b.timestamp - a.timestamp;
        if span <= 0.0 {
            return b.value;
        }
        a.value + (b.value - a.value) * (t - a.timestamp) / span
    }
}

/// A named collection of channels, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataLog {
    pub name: String,
    channels: Vec<Channel>,
}

impl DataLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    /// Append an empty channel and hand it back for filling.
    pub fn add_channel(
        &mut self,
        name: impl Into<String>,
        units: impl Into<String>,
        decimals: i32,
    ) -> &mut Channel {
        self.channels.push(Channel::new(name, units, decimals));
        let last = self.channels.len() - 1;
        &mut self.channels[last]
    }

    pub fn push_channel(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Channel] {
        &mut self.channels
    }

    /// First channel with the given name.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Earliest first-sample timestamp across channels, 0 when no channel
    /// holds samples.
    pub fn start(&self) -> f64 {
        self.channels
            .iter()
            .filter_map(Channel::start)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Latest last-sample timestamp across channels, 0 when no channel holds
    /// samples.
    pub fn end(&self) -> f64 {
        self.channels
            .iter()
            .filter_map(Channel::end)
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    /// Resample every channel onto one shared grid spanning the whole log.
    /// Either every channel is resampled or none is.
    pub fn resample(&mut self, frequency: f64) -> Result<()> {
        check_frequency(frequency)?;
        let (start, end) = (self.start(), self.end());

        let mut grids = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            grids.push(channel.resampled(start, end, frequency)?);
        }
        for (channel, grid) in self.channels.iter_mut().zip(grids) {
            if let Some(samples) = grid {
                channel.samples = samples;
            }
        }
        Ok(())
    }
}

fn check_frequency(frequency: f64) -> Result<()> {
    if frequency > 0.0 && frequency.is_finite() {
        Ok(())
    } else {
        Err(LdError::Config(format!(
            "resample frequency must be positive and finite, got {}",
            frequency
        )))
    }
}
