//! Key layout of the network state record.
//!
//! DAO-wide keys are written by whoever deployed the DAO; the per-airdrop keys
//! live under `<airdropId>.` and are written by the stages.

use crate::errors::Result;
use dropgate_core::{ContractHandle, ContractKind, DaoApps};
use dropgate_store::NetworkState;

/// Governance token of the DAO.
pub const DAO_TOKEN: &str = "daoTokenAddress";

/// Proxy address key of a DAO app.
pub fn app_proxy(kind: ContractKind) -> String {
    match kind.app_state_key() {
        Some(app) => format!("{app}.proxyAddress"),
        None => format!("{}.proxyAddress", kind.name()),
    }
}

/// Manifest path of an airdrop, relative to the base directory.
pub fn merkle_file(airdrop_id: &str) -> String {
    format!("{airdrop_id}.merkleFile")
}

/// Deployed distributor of an airdrop.
pub fn distributor(airdrop_id: &str) -> String {
    format!("{airdrop_id}.merkleDistributorAddress")
}

/// Funding proposal of an airdrop.
pub fn vote_id(airdrop_id: &str) -> String {
    format!("{airdrop_id}.voteId")
}

/// Typed handle to a DAO app recorded in `state`.
pub fn app(state: &NetworkState, kind: ContractKind) -> Result<ContractHandle> {
    Ok(ContractHandle::at(
        kind,
        state.get_address(&app_proxy(kind))?,
    ))
}

/// Read the three governance app proxies.
pub fn dao_apps(state: &NetworkState) -> Result<DaoApps> {
    Ok(DaoApps {
        voting: app(state, ContractKind::Voting)?.address,
        token_manager: app(state, ContractKind::TokenManager)?.address,
        finance: app(state, ContractKind::Finance)?.address,
    })
}
