// Simulation clock: a synthetic calendar measured in steps.
//
// A `SimTime` is an epoch date plus a signed step offset. The epoch is always
// snapped to a period boundary (any leftover step is dropped), so phase
// arithmetic only has to look at the offset.
//
// The calendar is fixed-width: 8 steps per week (one period), 4 weeks per
// month, 12 months per year. There are no leap years or ragged months, and
// `diff` is plain multiplication by these constants.
//
// `next_step(n, modulus)` answers "when is the next step whose phase within
// `modulus` equals `n`, strictly after now if we are already at or past that
// phase". Standing actions use it to register at a fixed point of every
// period (e.g. `next_step(7)` is the last step of the current week).
//
// See also: `event.rs` whose `Scheduler` converts `SimTime`s to absolute
// step numbers, `config.rs` for the epoch fields.
//
// **Critical constraint: determinism.** Integer arithmetic only.

use crate::error::{ConfigError, ContractViolation};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Steps in one period (one simulated week).
pub const STEPS_PER_PERIOD: i64 = 8;

// Calendar units, in periods.
pub const WEEK: i64 = 1;
pub const WEEKS_PER_MONTH: i64 = 4;
pub const MONTH: i64 = WEEKS_PER_MONTH * WEEK;
pub const MONTHS_PER_YEAR: i64 = 12;
pub const YEAR: i64 = MONTHS_PER_YEAR * MONTH;

// ---------------------------------------------------------------------------
// Months
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// Zero-based position in the year.
    pub const fn ordinal(self) -> i64 {
        self as i64
    }

    /// The month at `ordinal`, wrapping around the year.
    pub fn from_ordinal(ordinal: i64) -> Month {
        Self::ALL[ordinal.rem_euclid(MONTHS_PER_YEAR) as usize]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Month::Jan => "JAN",
            Month::Feb => "FEB",
            Month::Mar => "MAR",
            Month::Apr => "APR",
            Month::May => "MAY",
            Month::Jun => "JUN",
            Month::Jul => "JUL",
            Month::Aug => "AUG",
            Month::Sep => "SEP",
            Month::Oct => "OCT",
            Month::Nov => "NOV",
            Month::Dec => "DEC",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == upper)
            .ok_or_else(|| ConfigError::UnknownMonth(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Calendar dates
// ---------------------------------------------------------------------------

/// A calendar position. `week` and `step` are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeData {
    pub year: i64,
    pub month: Month,
    pub week: i64,
    pub step: i64,
}

impl TimeData {
    pub const fn new(year: i64, month: Month, week: i64, step: i64) -> Self {
        Self {
            year,
            month,
            week,
            step,
        }
    }

    /// Signed step distance `self - other`.
    pub fn diff(&self, other: &TimeData) -> i64 {
        STEPS_PER_PERIOD
            * (YEAR * (self.year - other.year)
                + MONTH * (self.month.ordinal() - other.month.ordinal())
                + WEEK * (self.week - other.week))
            + (self.step - other.step)
    }
}

impl fmt::Display for TimeData {
    /// `JAN 1/0, 2000`: month, one-based week / step, year.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}, {}",
            self.month,
            self.week + 1,
            self.step,
            self.year
        )
    }
}

// ---------------------------------------------------------------------------
// Simulation time
// ---------------------------------------------------------------------------

/// A point in simulated time: a period-aligned epoch plus a step offset.
///
/// Equality compares instants, so two times built from different epochs are
/// equal when they land on the same step.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimTime {
    epoch: TimeData,
    offset: i64,
}

impl SimTime {
    /// `offset` steps after `epoch`, with the epoch snapped back to the start
    /// of its period.
    pub fn absolute(epoch: TimeData, offset: i64) -> Self {
        let partial = epoch.step.rem_euclid(STEPS_PER_PERIOD);
        let epoch = TimeData {
            step: epoch.step - partial,
            ..epoch
        };
        Self { epoch, offset }
    }

    pub fn epoch(&self) -> TimeData {
        self.epoch
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The next step at phase `step_number` of the period. See
    /// `next_step_mod`.
    pub fn next_step(&self, step_number: i64) -> Result<SimTime, ContractViolation> {
        self.next_step_mod(step_number, STEPS_PER_PERIOD)
    }

    /// The next time whose offset is congruent to `step_number` modulo
    /// `modulus`. If the current phase already equals or exceeds the target
    /// phase, the result is one full cycle later. A `step_number` equal to
    /// `modulus` means phase 0 of the next cycle.
    ///
    /// Both arguments must be positive.
    pub fn next_step_mod(
        &self,
        step_number: i64,
        modulus: i64,
    ) -> Result<SimTime, ContractViolation> {
        if modulus <= 0 || step_number <= 0 {
            return Err(ContractViolation::InvalidPhase {
                step_number,
                modulus,
            });
        }
        let target = step_number % modulus;
        let current = self.offset.rem_euclid(modulus);
        let mut offset = self.offset + target - current;
        if current >= target {
            offset += modulus;
        }
        Ok(SimTime {
            epoch: self.epoch,
            offset,
        })
    }

    /// This time moved by `steps` (which may be negative).
    pub fn plus_steps(&self, steps: i64) -> SimTime {
        SimTime {
            epoch: self.epoch,
            offset: self.offset + steps,
        }
    }

    /// Signed step distance `self - other`.
    pub fn diff(&self, other: &SimTime) -> i64 {
        self.epoch.diff(&other.epoch) + self.offset - other.offset
    }

    /// Decompose into a calendar date by carrying steps into weeks, weeks
    /// into months, and months into years.
    pub fn time_data(&self) -> TimeData {
        let total_step = self.epoch.step + self.offset;
        let step = total_step.rem_euclid(STEPS_PER_PERIOD);
        let total_week = self.epoch.week + total_step.div_euclid(STEPS_PER_PERIOD);
        let week = total_week.rem_euclid(WEEKS_PER_MONTH);
        let total_month = self.epoch.month.ordinal() + total_week.div_euclid(WEEKS_PER_MONTH);
        let month = Month::from_ordinal(total_month);
        let year = self.epoch.year + total_month.div_euclid(MONTHS_PER_YEAR);
        TimeData::new(year, month, week, step)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.diff(other) == 0
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.diff(other).cmp(&0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.time_data().fmt(f)
    }
}

/// A stepping unit for batch advancement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInterval {
    Step,
    Week,
    Month,
    Year,
}

impl TimeInterval {
    /// Length of the interval in steps.
    pub const fn steps(self) -> i64 {
        match self {
            TimeInterval::Step => 1,
            TimeInterval::Week => WEEK * STEPS_PER_PERIOD,
            TimeInterval::Month => MONTH * STEPS_PER_PERIOD,
            TimeInterval::Year => YEAR * STEPS_PER_PERIOD,
        }
    }
}
