use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::protocol::error::LedgerError;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Lower bound of the backwards skew applied to generated valid-start times.
const MIN_VALID_START_SKEW: Duration = Duration::from_secs(5);

/// Upper bound of the backwards skew applied to generated valid-start times.
const MAX_VALID_START_SKEW: Duration = Duration::from_secs(8);

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name {
            pub shard: u64,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// Shorthand for an id in shard 0, realm 0.
            pub const fn from_num(num: u64) -> Self {
                Self::new(0, 0, num)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let parse = |part: Option<&str>| {
                    part.and_then(|p| p.parse::<u64>().ok()).ok_or_else(|| {
                        LedgerError::BasicParse(format!(
                            "expected `<shard>.<realm>.<num>` for {}, got `{}`",
                            stringify!($name),
                            s
                        ))
                    })
                };

                let mut parts = s.splitn(3, '.');
                let shard = parse(parts.next())?;
                let realm = parse(parts.next())?;
                let num = parse(parts.next())?;

                Ok(Self::new(shard, realm, num))
            }
        }
    };
}

entity_id! {
    /// Identifier of a ledger account. Nodes are addressed by their account id.
    AccountId
}

entity_id! {
    /// Identifier of a consensus topic.
    TopicId
}

/// Nanosecond-precision wall-clock instant, ordered by `(seconds, nanos)`.
///
/// `nanos` is always below one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        let carry = i64::from(nanos) / NANOS_PER_SECOND as i64;
        Self {
            seconds: seconds.saturating_add(carry),
            nanos: nanos % NANOS_PER_SECOND as u32,
        }
    }

    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub fn from_unix_nanos(total: i128) -> Self {
        let seconds = total.div_euclid(i128::from(NANOS_PER_SECOND));
        let nanos = total.rem_euclid(i128::from(NANOS_PER_SECOND));
        Self {
            seconds: seconds.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
            nanos: nanos as u32,
        }
    }

    pub fn unix_nanos(&self) -> i128 {
        i128::from(self.seconds) * i128::from(NANOS_PER_SECOND) + i128::from(self.nanos)
    }

    /// The timestamp one nanosecond later. Used to resume a subscription
    /// strictly after the last delivered item.
    pub fn plus_nanos(self, nanos: u64) -> Self {
        Self::from_unix_nanos(self.unix_nanos() + i128::from(nanos))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since) => Self::from_unix_nanos(since.as_nanos() as i128),
            Err(before) => Self::from_unix_nanos(-(before.duration().as_nanos() as i128)),
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self::from_unix_nanos(self.unix_nanos() + rhs.as_nanos() as i128)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::from_unix_nanos(self.unix_nanos() - rhs.as_nanos() as i128)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl FromStr for Timestamp {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::BasicParse(format!("expected `<seconds>.<nanos>`, got `{s}`"));

        let (seconds, nanos) = s.split_once('.').ok_or_else(invalid)?;
        let seconds = seconds.parse::<i64>().map_err(|_| invalid())?;
        let nanos = nanos.parse::<u32>().map_err(|_| invalid())?;
        if u64::from(nanos) >= NANOS_PER_SECOND {
            return Err(invalid());
        }

        Ok(Self { seconds, nanos })
    }
}

/// Identifier of a transaction: the paying account plus the valid-start time.
///
/// Two transactions with the same id are the same transaction to the ledger,
/// which is what makes resubmitting a signed transaction to another node safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
}

impl TransactionId {
    pub fn new(account_id: AccountId, valid_start: Timestamp) -> Self {
        Self { account_id, valid_start }
    }

    /// Generates a fresh id for `account_id`.
    ///
    /// The valid-start is set a few seconds in the past so that a node whose
    /// clock lags slightly behind ours still accepts the transaction.
    pub fn generate(account_id: AccountId) -> Self {
        let skew = rand::rng().random_range(MIN_VALID_START_SKEW..MAX_VALID_START_SKEW);
        Self::new(account_id, Timestamp::now() - skew)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

impl FromStr for TransactionId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (account_id, valid_start) = s.split_once('@').ok_or_else(|| {
            LedgerError::BasicParse(format!("expected `<account>@<seconds>.<nanos>`, got `{s}`"))
        })?;

        Ok(Self::new(account_id.parse()?, valid_start.parse()?))
    }
}
