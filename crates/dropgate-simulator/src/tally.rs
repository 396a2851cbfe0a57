//! Pure vote tallying rules.
//!
//! Effect-free functions over a [`VoteRecord`], following the Aragon voting
//! app:
//!
//! - a vote is open for `vote_time` seconds after it starts
//! - once yea exceeds `support_required` of the total voting power, the
//!   outcome is decided and the vote may execute while still open
//! - otherwise, after the vote closes, it passes when yea exceeds
//!   `support_required` of the votes cast and `min_accept_quorum` of the total
//!   voting power
//!
//! Percentages are fractions of [`PCT_BASE`]. Every comparison is strict.

use dropgate_core::{Address, Amount, Payment, ProposalPhase};
use std::collections::BTreeMap;

/// 100% expressed in tally units (10^18).
pub const PCT_BASE: u64 = 1_000_000_000_000_000_000;

/// Voting app parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingSettings {
    /// Required share of yea, in [`PCT_BASE`] units
    pub support_required: u64,
    /// Required share of total voting power voting yea, in [`PCT_BASE`] units
    pub min_accept_quorum: u64,
    /// Vote window in seconds
    pub vote_time: u64,
    /// Whether the proposer's stake votes yea when the vote is created
    pub creator_votes: bool,
}

impl Default for VotingSettings {
    fn default() -> Self {
        Self {
            support_required: PCT_BASE / 2,
            min_accept_quorum: PCT_BASE / 20,
            vote_time: 72 * 60 * 60,
            creator_votes: true,
        }
    }
}

/// A single vote and its tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    /// Payment executed if the vote passes
    pub payment: Payment,
    /// Start time, seconds
    pub start: u64,
    /// Settings frozen at creation
    pub settings: VotingSettings,
    /// Stake per holder at creation
    pub snapshot: BTreeMap<Address, Amount>,
    /// Total voting power at creation
    pub voting_power: Amount,
    /// Yea stake
    pub yea: Amount,
    /// Nay stake
    pub nay: Amount,
    /// Cast votes: holder to support
    pub voters: BTreeMap<Address, bool>,
    /// Whether the payment ran
    pub executed: bool,
}

impl VoteRecord {
    /// Open a vote at `now` over the given stake snapshot.
    pub fn new(
        payment: Payment,
        now: u64,
        settings: VotingSettings,
        snapshot: BTreeMap<Address, Amount>,
    ) -> Self {
        let voting_power = snapshot
            .values()
            .fold(Amount::zero(), |acc, stake| acc.saturating_add(*stake));
        Self {
            payment,
            start: now,
            settings,
            snapshot,
            voting_power,
            yea: Amount::zero(),
            nay: Amount::zero(),
            voters: BTreeMap::new(),
            executed: false,
        }
    }

    /// Stake `voter` held when the vote started.
    pub fn stake_of(&self, voter: &Address) -> Amount {
        self.snapshot.get(voter).copied().unwrap_or_default()
    }
}

/// Whether `value` is strictly more than `pct` of `total`.
pub fn is_value_pct(value: Amount, total: Amount, pct: u64) -> bool {
    if total.is_zero() {
        return false;
    }
    let scaled = value.full_mul(Amount::from(PCT_BASE));
    let required = total.full_mul(Amount::from(pct));
    scaled > required
}

/// Whether the vote window is still open at `now`.
pub fn is_open(vote: &VoteRecord, now: u64) -> bool {
    !vote.executed && now < vote.start.saturating_add(vote.settings.vote_time)
}

/// Whether the vote may execute at `now`.
pub fn can_execute(vote: &VoteRecord, now: u64) -> bool {
    if vote.executed {
        return false;
    }
    // Decided early: more than the required support of all voting power
    if is_value_pct(vote.yea, vote.voting_power, vote.settings.support_required) {
        return true;
    }
    if is_open(vote, now) {
        return false;
    }
    let cast = vote.yea.saturating_add(vote.nay);
    is_value_pct(vote.yea, cast, vote.settings.support_required)
        && is_value_pct(vote.yea, vote.voting_power, vote.settings.min_accept_quorum)
}

/// Whether `voter` may vote at `now`.
pub fn can_vote(vote: &VoteRecord, voter: &Address, now: u64) -> bool {
    is_open(vote, now) && !vote.stake_of(voter).is_zero()
}

/// Record `voter`'s choice, replacing any earlier vote by the same holder.
///
/// Callers check [`can_vote`] first.
pub fn apply_vote(vote: &mut VoteRecord, voter: Address, support: bool) {
    let stake = vote.stake_of(&voter);
    match vote.voters.insert(voter, support) {
        Some(true) => vote.yea = vote.yea.saturating_sub(stake),
        Some(false) => vote.nay = vote.nay.saturating_sub(stake),
        None => {}
    }
    if support {
        vote.yea = vote.yea.saturating_add(stake);
    } else {
        vote.nay = vote.nay.saturating_add(stake);
    }
}

/// Lifecycle phase at `now`.
pub fn phase(vote: &VoteRecord, now: u64) -> ProposalPhase {
    if vote.executed {
        ProposalPhase::Executed
    } else if can_execute(vote, now) {
        ProposalPhase::Passed
    } else if is_open(vote, now) {
        ProposalPhase::Open
    } else {
        ProposalPhase::Rejected
    }
}
