//! Pipeline stages and the state keys each one depends on.

use crate::keys;
use dropgate_core::ContractKind;
use std::fmt;
use std::str::FromStr;

/// Claim entitlements from the funded distributor
pub mod claim;
/// Deploy or adopt the airdrop's distributor
pub mod deploy;
/// Execute the funding proposal
pub mod execute;
/// Propose funding the distributor from the DAO treasury
pub mod propose;
/// Cast holder votes on the funding proposal
pub mod vote;

/// One step of the airdrop pipeline, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Deploy the distributor
    Deploy,
    /// Propose the funding payment
    Propose,
    /// Vote on the proposal
    Vote,
    /// Execute the proposal
    Execute,
    /// Claim entitlements
    Claim,
}

impl Stage {
    /// All stages in run order.
    pub const ALL: [Stage; 5] = [
        Stage::Deploy,
        Stage::Propose,
        Stage::Vote,
        Stage::Execute,
        Stage::Claim,
    ];

    /// Lowercase stage name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Deploy => "deploy",
            Stage::Propose => "propose",
            Stage::Vote => "vote",
            Stage::Execute => "execute",
            Stage::Claim => "claim",
        }
    }

    /// Keys that must be present in the network record before the stage runs.
    pub fn required_keys(self, airdrop_id: &str) -> Vec<String> {
        let dao_token = keys::DAO_TOKEN.to_string();
        let voting = keys::app_proxy(ContractKind::Voting);
        let merkle_file = keys::merkle_file(airdrop_id);
        let distributor = keys::distributor(airdrop_id);
        let vote_id = keys::vote_id(airdrop_id);

        match self {
            Stage::Deploy => vec![dao_token, merkle_file],
            Stage::Propose => vec![
                dao_token,
                keys::app_proxy(ContractKind::Finance),
                keys::app_proxy(ContractKind::TokenManager),
                voting,
                distributor,
                merkle_file,
            ],
            Stage::Vote => vec![voting, vote_id],
            Stage::Execute => vec![dao_token, voting, distributor, merkle_file, vote_id],
            Stage::Claim => vec![dao_token, distributor, merkle_file],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| format!("unknown stage {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(stage.to_string().parse::<Stage>(), Ok(stage));
        }
        assert!("fund".parse::<Stage>().is_err());
    }

    #[test]
    fn test_later_stages_need_earlier_outputs() {
        let propose = Stage::Propose.required_keys("a");
        assert!(propose.contains(&"a.merkleDistributorAddress".to_string()));
        let execute = Stage::Execute.required_keys("a");
        assert!(execute.contains(&"a.voteId".to_string()));
        assert!(!Stage::Deploy
            .required_keys("a")
            .contains(&"a.merkleDistributorAddress".to_string()));
    }
}
