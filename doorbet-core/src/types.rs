use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the eight wager targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Door {
    #[serde(rename = "Chua")]
    Chua,
    #[serde(rename = "Cải")]
    Cai,
    #[serde(rename = "Ngô")]
    Ngo,
    #[serde(rename = "Rốt")]
    Rot,
    #[serde(rename = "Bò")]
    Bo,
    #[serde(rename = "Gà")]
    Ga,
    #[serde(rename = "Heo")]
    Heo,
    #[serde(rename = "Cá")]
    Ca,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorGroup {
    Vegetable,
    Meat,
}

impl Door {
    pub const ALL: [Door; 8] = [
        Door::Chua,
        Door::Cai,
        Door::Ngo,
        Door::Rot,
        Door::Bo,
        Door::Ga,
        Door::Heo,
        Door::Ca,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Door::Chua => "Chua",
            Door::Cai => "Cải",
            Door::Ngo => "Ngô",
            Door::Rot => "Rốt",
            Door::Bo => "Bò",
            Door::Ga => "Gà",
            Door::Heo => "Heo",
            Door::Ca => "Cá",
        }
    }

    pub fn group(&self) -> DoorGroup {
        match self {
            Door::Chua | Door::Cai | Door::Ngo | Door::Rot => DoorGroup::Vegetable,
            Door::Bo | Door::Ga | Door::Heo | Door::Ca => DoorGroup::Meat,
        }
    }
}

impl fmt::Display for Door {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown door: {0}")]
pub struct UnknownDoor(pub String);

impl FromStr for Door {
    type Err = UnknownDoor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Door::ALL
            .iter()
            .find(|door| door.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownDoor(s.to_string()))
    }
}

/// Drawn result of a round: a whole group or a single door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Every vegetable door pays its stake back.
    Salad,
    /// Every meat door pays its stake back.
    Pizza,
    /// The named door pays double.
    Door(Door),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Salad => "SALAD",
            Outcome::Pizza => "PIZZA",
            Outcome::Door(door) => door.as_str(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = UnknownDoor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SALAD" => Ok(Outcome::Salad),
            "PIZZA" => Ok(Outcome::Pizza),
            other => other.parse().map(Outcome::Door),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeError {
    #[error(transparent)]
    UnknownDoor(#[from] UnknownDoor),

    #[error("total stake overflows")]
    Overflow,
}

/// Amounts wagered per door, in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakes(BTreeMap<Door, u64>);

impl Stakes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, door: Door, amount: u64) -> Self {
        self.set(door, amount);
        self
    }

    pub fn set(&mut self, door: Door, amount: u64) {
        if amount == 0 {
            self.0.remove(&door);
        } else {
            self.0.insert(door, amount);
        }
    }

    /// Build stakes from loosely typed input such as a request body.
    ///
    /// Values that are not non-negative integers (negative numbers, fractions, non-numeric
    /// strings, null, ...) count as zero. Door ids must be known.
    pub fn from_raw<I, K>(entries: I) -> Result<Self, StakeError>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: AsRef<str>,
    {
        let mut stakes = Self::new();
        for (key, value) in entries {
            let door: Door = key.as_ref().parse()?;
            let amount = clamp_amount(&value);
            let current = stakes.get(door);
            stakes.set(door, current.checked_add(amount).ok_or(StakeError::Overflow)?);
        }
        stakes.total().ok_or(StakeError::Overflow)?;
        Ok(stakes)
    }

    pub fn get(&self, door: Door) -> u64 {
        self.0.get(&door).copied().unwrap_or(0)
    }

    /// Sum of all stakes, `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        self.0
            .values()
            .try_fold(0u64, |acc, amount| acc.checked_add(*amount))
    }

    /// Sum of the stakes placed on doors of `group`.
    pub fn group_total(&self, group: DoorGroup) -> Option<u64> {
        self.0
            .iter()
            .filter(|(door, _)| door.group() == group)
            .try_fold(0u64, |acc, (_, amount)| acc.checked_add(*amount))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Door, u64)> + '_ {
        self.0.iter().map(|(door, amount)| (*door, *amount))
    }
}

fn clamp_amount(value: &serde_json::Value) -> u64 {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| whole_amount(n.as_f64()?)).unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// `1000.0` is a valid amount; `1.5`, negatives and anything past `u64` are not.
fn whole_amount(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then(|| f as u64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub balance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Betting,
    Locked,
    Settled,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Betting => "betting",
            RoundStatus::Locked => "locked",
            RoundStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "betting" => Ok(RoundStatus::Betting),
            "locked" => Ok(RoundStatus::Locked),
            "settled" => Ok(RoundStatus::Settled),
            other => Err(format!("unknown round status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub status: RoundStatus,
    pub result: Option<Outcome>,
    pub jackpot_seed: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Lifecycle counter, bumped by every (re-)open.
    pub epoch: u64,
    /// Settlement claim generation, bumped by every won compare-and-swap.
    pub claim: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub round_id: String,
    pub account_id: String,
    pub stakes: Stakes,
    pub total_stake: u64,
    pub placed_at: DateTime<Utc>,
    pub epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub round_id: String,
    pub epoch: u64,
    pub result: Outcome,
    pub settled_at: DateTime<Utc>,
}
