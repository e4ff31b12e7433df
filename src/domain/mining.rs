use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::errors::MiningError;

/// Persisted state of a user's mining rig. Expired phases are only resolved
/// when the session is next read.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MiningSession {
    Idle,
    #[serde(rename_all = "camelCase")]
    Mining {
        #[serde(with = "time::serde::rfc3339")]
        started_at: OffsetDateTime,
    },
    #[serde(rename_all = "camelCase")]
    Cooldown {
        #[serde(with = "time::serde::rfc3339")]
        until: OffsetDateTime,
    },
}

impl MiningSession {
    pub fn from_columns(
        started_at: Option<OffsetDateTime>,
        cooldown_until: Option<OffsetDateTime>,
    ) -> Self {
        match (started_at, cooldown_until) {
            (Some(started_at), _) => Self::Mining { started_at },
            (None, Some(until)) => Self::Cooldown { until },
            (None, None) => Self::Idle,
        }
    }

    /// `(mining_started_at, mining_cooldown_until)` as stored on the user row.
    pub fn to_columns(self) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        match self {
            Self::Idle => (None, None),
            Self::Mining { started_at } => (Some(started_at), None),
            Self::Cooldown { until } => (None, Some(until)),
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MiningPhase {
    Idle,
    Mining,
    Cooldown,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    pub phase: MiningPhase,
    pub progress: f64,
    pub remaining_secs: i64,
    pub reward: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub previous: MiningSession,
    pub session: MiningSession,
    pub payout: i64,
}

impl Settlement {
    pub fn changed(&self) -> bool {
        self.previous != self.session
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MiningTimer {
    duration: Duration,
    cooldown: Duration,
    reward: i64,
}

impl MiningTimer {
    pub fn new(duration: Duration, cooldown: Duration, reward: i64) -> Self {
        Self {
            duration: duration.max(Duration::SECOND),
            cooldown: cooldown.max(Duration::ZERO),
            reward,
        }
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }

    /// Percentage of the session completed after `elapsed`, clamped to [0, 100].
    pub fn progress(&self, elapsed: Duration) -> f64 {
        let ratio = elapsed.as_seconds_f64() / self.duration.as_seconds_f64();
        (ratio * 100.0).clamp(0.0, 100.0)
    }

    /// Completes finished sessions and lifts expired cooldowns.
    pub fn settle(&self, session: MiningSession, now: OffsetDateTime) -> Settlement {
        let mut current = session;
        let mut payout = 0;

        if let MiningSession::Mining { started_at } = current {
            if self.progress(now - started_at) >= 100.0 {
                payout = self.reward;
                current = MiningSession::Cooldown {
                    until: started_at + self.duration + self.cooldown,
                };
            }
        }

        if let MiningSession::Cooldown { until } = current {
            if now >= until {
                current = MiningSession::Idle;
            }
        }

        Settlement {
            previous: session,
            session: current,
            payout,
        }
    }

    pub fn start(
        &self,
        session: MiningSession,
        now: OffsetDateTime,
    ) -> Result<Settlement, MiningError> {
        let settled = self.settle(session, now);
        match settled.session {
            MiningSession::Idle => Ok(Settlement {
                session: MiningSession::Mining { started_at: now },
                ..settled
            }),
            MiningSession::Mining { .. } => Err(MiningError::AlreadyMining),
            MiningSession::Cooldown { until } => Err(MiningError::CoolingDown {
                remaining_secs: (until - now).whole_seconds().max(0),
            }),
        }
    }

    /// Status of an already settled session.
    pub fn status(&self, session: MiningSession, now: OffsetDateTime) -> MiningStatus {
        let (phase, progress, remaining) = match session {
            MiningSession::Idle => (MiningPhase::Idle, 0.0, Duration::ZERO),
            MiningSession::Mining { started_at } => {
                let elapsed = now - started_at;
                (
                    MiningPhase::Mining,
                    self.progress(elapsed),
                    self.duration - elapsed,
                )
            }
            MiningSession::Cooldown { until } => (MiningPhase::Cooldown, 100.0, until - now),
        };

        MiningStatus {
            phase,
            progress,
            remaining_secs: remaining.whole_seconds().max(0),
            reward: self.reward,
        }
    }
}
