//! Trading session schedule.
//!
//! A day has three phases: regular trading, a pre-close window in which the
//! monitor polls faster, and the hard cutoff after which every open position
//! is squared off and no new exposure is accepted.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Regular,
    PreClose,
    Cutoff,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Regular => write!(f, "REGULAR"),
            SessionPhase::PreClose => write!(f, "PRE_CLOSE"),
            SessionPhase::Cutoff => write!(f, "CUTOFF"),
        }
    }
}

/// Local wall-clock boundaries of the trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSchedule {
    pre_close: NaiveTime,
    cutoff: NaiveTime,
}

impl SessionSchedule {
    /// # Errors
    /// `Validation` unless `pre_close` is strictly earlier than `cutoff`.
    pub fn new(pre_close: NaiveTime, cutoff: NaiveTime) -> EngineResult<Self> {
        if pre_close >= cutoff {
            return Err(EngineError::Validation(format!(
                "pre-close time {} must be earlier than cutoff {}",
                pre_close, cutoff
            )));
        }
        Ok(Self { pre_close, cutoff })
    }

    pub fn pre_close(&self) -> NaiveTime {
        self.pre_close
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// Phase of the session at local time `now`.
    pub fn phase(&self, now: NaiveTime) -> SessionPhase {
        if now >= self.cutoff {
            SessionPhase::Cutoff
        } else if now >= self.pre_close {
            SessionPhase::PreClose
        } else {
            SessionPhase::Regular
        }
    }

    /// Whether orders that add exposure are still accepted at `now`.
    pub fn accepts_new_exposure(&self, now: NaiveTime) -> bool {
        self.phase(now) != SessionPhase::Cutoff
    }
}

impl Default for SessionSchedule {
    /// 15:10 pre-close, 15:15 cutoff.
    fn default() -> Self {
        Self {
            pre_close: NaiveTime::from_hms_opt(15, 10, 0).unwrap_or(NaiveTime::MIN),
            cutoff: NaiveTime::from_hms_opt(15, 15, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_phases() {
        let schedule = SessionSchedule::default();

        assert_eq!(schedule.phase(t(9, 15, 0)), SessionPhase::Regular);
        assert_eq!(schedule.phase(t(15, 9, 59)), SessionPhase::Regular);
        assert_eq!(schedule.phase(t(15, 10, 0)), SessionPhase::PreClose);
        assert_eq!(schedule.phase(t(15, 14, 59)), SessionPhase::PreClose);
        assert_eq!(schedule.phase(t(15, 15, 0)), SessionPhase::Cutoff);
        assert_eq!(schedule.phase(t(23, 0, 0)), SessionPhase::Cutoff);
    }

    #[test]
    fn test_exposure_gate() {
        let schedule = SessionSchedule::default();
        assert!(schedule.accepts_new_exposure(t(15, 12, 0)));
        assert!(!schedule.accepts_new_exposure(t(15, 15, 0)));
    }

    #[test]
    fn test_pre_close_must_precede_cutoff() {
        assert!(SessionSchedule::new(t(15, 15, 0), t(15, 10, 0)).is_err());
        assert!(SessionSchedule::new(t(15, 15, 0), t(15, 15, 0)).is_err());
        assert!(SessionSchedule::new(t(14, 0, 0), t(15, 0, 0)).is_ok());
    }
}
