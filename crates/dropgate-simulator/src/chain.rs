//! The simulated chain.

use crate::state::{
    ChainState, DistributorState, FinanceState, ProposalEntry, TokenManagerState, TokenState,
    VotingState,
};
use crate::tally::{self, VoteRecord, VotingSettings};
use async_trait::async_trait;
use dropgate_core::{
    Address, Amount, ClaimLedger, ClaimReceipt, ClaimRequest, ContractKind, DaoApps, Digest,
    GovernanceAdapter, LedgerEffects, LedgerError, Payment, ProposalId, ProposalStatus,
};
use dropgate_store::{NetworkState, StateError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Simulated genesis time, seconds.
const GENESIS_TIME: u64 = 1_600_000_000;

/// Addresses of a DAO created by [`SimulatedChain::deploy_dao`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaoDeployment {
    /// Governance token
    pub token: Address,
    /// App proxies
    pub apps: DaoApps,
    /// Account the finance app pays from
    pub vault: Address,
}

impl DaoDeployment {
    /// Record the token and app addresses under the keys the pipeline reads.
    pub fn record_into(&self, state: &mut NetworkState) -> Result<(), StateError> {
        state.set_path("daoTokenAddress", self.token.to_string())?;
        for (kind, address) in [
            (ContractKind::Finance, self.apps.finance),
            (ContractKind::TokenManager, self.apps.token_manager),
            (ContractKind::Voting, self.apps.voting),
        ] {
            if let Some(key) = kind.app_state_key() {
                state.set_path(&format!("{key}.proxyAddress"), address.to_string())?;
            }
        }
        Ok(())
    }
}

/// In-process ledger implementing the ledger and governance effects.
#[derive(Debug)]
pub struct SimulatedChain {
    state: Mutex<ChainState>,
    latency_ms: AtomicU64,
}

impl SimulatedChain {
    /// Empty chain with the given chain id.
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Mutex::new(ChainState::new(chain_id, GENESIS_TIME)),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Make the next call fail with `fault` without executing.
    pub fn inject_fault(&self, fault: LedgerError) {
        self.state.lock().pending_fault = Some(fault);
    }

    /// Current simulated time, seconds.
    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    /// Move the clock forward.
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock();
        state.now = state.now.saturating_add(seconds);
        debug!(now = state.now, "Simulated clock advanced");
    }

    /// Number of confirmed transactions.
    pub fn tx_count(&self) -> u64 {
        self.state.lock().tx_count
    }

    /// Deploy an ERC20 with the given initial balances.
    pub fn deploy_token(&self, deployer: Address, holders: &[(Address, Amount)]) -> Address {
        let mut state = self.state.lock();
        let address = state.create_address(deployer, ContractKind::Erc20);
        let mut token = TokenState::default();
        for (holder, amount) in holders {
            token.mint(*holder, *amount);
        }
        state.tokens.insert(address, token);
        state.confirm();
        info!(token = %address, holders = holders.len(), "Token deployed");
        address
    }

    /// Mint `amount` of `token` to `account`.
    pub fn mint(&self, token: Address, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.token_mut(token)?.mint(account, amount);
        state.confirm();
        Ok(())
    }

    /// Deploy a DAO governing `token` with a vault holding `vault_balance`
    /// newly minted tokens.
    pub fn deploy_dao(
        &self,
        deployer: Address,
        token: Address,
        vault_balance: Amount,
        settings: VotingSettings,
    ) -> Result<DaoDeployment, LedgerError> {
        let mut state = self.state.lock();
        state.token(token)?;

        let vault = state.next_address(deployer);
        let token_manager = state.create_address(deployer, ContractKind::TokenManager);
        let finance = state.create_address(deployer, ContractKind::Finance);
        let voting = state.create_address(deployer, ContractKind::Voting);

        state
            .token_managers
            .insert(token_manager, TokenManagerState { token });
        state.finances.insert(finance, FinanceState { vault });
        state.votings.insert(
            voting,
            VotingState {
                token,
                settings,
                votes: Vec::new(),
            },
        );
        state.token_mut(token)?.mint(vault, vault_balance);
        state.confirm();

        info!(%token, %voting, %finance, %token_manager, %vault, "DAO deployed");
        Ok(DaoDeployment {
            token,
            apps: DaoApps {
                voting,
                token_manager,
                finance,
            },
            vault,
        })
    }

    /// Balance of `account` in `token`, outside the effect interface.
    pub fn token_balance(&self, token: Address, account: Address) -> Result<Amount, LedgerError> {
        Ok(self.state.lock().token(token)?.balance_of(&account))
    }

    /// Copy of a vote record.
    pub fn vote_record(&self, voting: Address, id: ProposalId) -> Result<VoteRecord, LedgerError> {
        Ok(self.state.lock().proposal(voting, id)?.vote.clone())
    }

    async fn delay(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Pay `payment` out of the vault behind `finance`. Changes nothing on failure.
fn execute_payment(
    state: &mut ChainState,
    finance: Address,
    payment: &Payment,
) -> Result<(), LedgerError> {
    state.dispatch(finance, ContractKind::Finance, "newImmediatePayment")?;
    let vault = state
        .finances
        .get(&finance)
        .map(|f| f.vault)
        .ok_or(LedgerError::WrongContract {
            address: finance,
            expected: ContractKind::Finance,
            found: None,
        })?;
    state.dispatch(payment.token, ContractKind::Erc20, "transfer")?;
    state
        .token_mut(payment.token)?
        .transfer(vault, payment.recipient, payment.amount)?;
    info!(
        recipient = %payment.recipient,
        amount = %payment.amount,
        reference = %payment.reference,
        "Payment executed"
    );
    Ok(())
}

/// Apply a vote and, if asked and decided, execute. Reverts the vote when
/// execution fails. Returns whether the proposal executed.
fn cast_vote_locked(
    state: &mut ChainState,
    voting: Address,
    id: ProposalId,
    support: bool,
    execute_if_decided: bool,
    from: Address,
) -> Result<bool, LedgerError> {
    let now = state.now;
    let (payment, finance, previous) = {
        let entry = state.proposal_mut(voting, id)?;
        if !tally::is_open(&entry.vote, now) {
            return Err(LedgerError::VoteClosed(id));
        }
        if !tally::can_vote(&entry.vote, &from, now) {
            return Err(LedgerError::NoVotingPower { account: from });
        }
        let previous = entry.vote.clone();
        tally::apply_vote(&mut entry.vote, from, support);
        if !(execute_if_decided && tally::can_execute(&entry.vote, now)) {
            return Ok(false);
        }
        (entry.vote.payment.clone(), entry.finance, previous)
    };

    if let Err(e) = execute_payment(state, finance, &payment) {
        state.proposal_mut(voting, id)?.vote = previous;
        return Err(e);
    }
    state.proposal_mut(voting, id)?.vote.executed = true;
    Ok(true)
}

#[async_trait]
impl LedgerEffects for SimulatedChain {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        Ok(state.chain_id)
    }

    async fn deploy_distributor(
        &self,
        token: Address,
        root: Digest,
        from: Address,
    ) -> Result<Address, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.token(token)?;

        let address = state.create_address(from, ContractKind::MerkleDistributor);
        state.distributors.insert(
            address,
            DistributorState {
                deployer: from,
                token,
                ledger: ClaimLedger::for_root(root),
            },
        );
        state.distributor_order.push(address);
        state.confirm();

        info!(distributor = %address, %token, %root, deployer = %from, "Distributor deployed");
        Ok(address)
    }

    async fn find_distributor(
        &self,
        deployer: Address,
        token: Address,
        root: Digest,
    ) -> Result<Option<Address>, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        let found = state.distributor_order.iter().copied().find(|address| {
            state.distributors.get(address).is_some_and(|d| {
                d.deployer == deployer && d.token == token && d.ledger.root() == root
            })
        });
        Ok(found)
    }

    async fn distributor_token(&self, distributor: Address) -> Result<Address, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(distributor, ContractKind::MerkleDistributor, "token")?;
        Ok(state.distributor(distributor)?.token)
    }

    async fn distributor_root(&self, distributor: Address) -> Result<Digest, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(distributor, ContractKind::MerkleDistributor, "merkleRoot")?;
        Ok(state.distributor(distributor)?.ledger.root())
    }

    async fn is_claimed(&self, distributor: Address, index: u64) -> Result<bool, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(distributor, ContractKind::MerkleDistributor, "isClaimed")?;
        Ok(state.distributor(distributor)?.ledger.is_claimed(index))
    }

    async fn claim(
        &self,
        distributor: Address,
        request: &ClaimRequest,
        from: Address,
    ) -> Result<ClaimReceipt, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;

        state.dispatch(distributor, ContractKind::MerkleDistributor, "claim")?;
        let entitlement = &request.entitlement;
        let dist = state.distributor(distributor)?;
        let token = dist.token;
        let available = state.token(token)?.balance_of(&distributor);

        // A transfer failure reverts the whole claim, mark included
        if entitlement.amount > available
            && dist.ledger.verifies(entitlement, &request.proof)
            && !dist.ledger.is_claimed(entitlement.index)
        {
            return Err(LedgerError::InsufficientBalance {
                account: distributor,
                needed: entitlement.amount,
                available,
            });
        }
        let amount = dist
            .ledger
            .claim(&dist.ledger.root(), entitlement, &request.proof)?;

        state
            .token_mut(token)?
            .transfer(distributor, entitlement.account, amount)?;
        state.confirm();

        debug!(%distributor, index = entitlement.index, account = %entitlement.account, sender = %from, "Claimed");
        Ok(ClaimReceipt {
            distributor,
            index: entitlement.index,
            account: entitlement.account,
            amount,
        })
    }

    async fn total_supply(&self, token: Address) -> Result<Amount, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(token, ContractKind::Erc20, "totalSupply")?;
        Ok(state.token(token)?.total_supply)
    }

    async fn balance_of(&self, token: Address, account: Address) -> Result<Amount, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(token, ContractKind::Erc20, "balanceOf")?;
        Ok(state.token(token)?.balance_of(&account))
    }
}

#[async_trait]
impl GovernanceAdapter for SimulatedChain {
    async fn propose_payment(
        &self,
        apps: &DaoApps,
        payment: &Payment,
        from: Address,
    ) -> Result<ProposalId, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;

        state.dispatch(apps.token_manager, ContractKind::TokenManager, "forward")?;
        state.dispatch(apps.voting, ContractKind::Voting, "newVote")?;
        state.expect_kind(apps.finance, ContractKind::Finance)?;
        let governance_token = state
            .token_managers
            .get(&apps.token_manager)
            .map(|tm| tm.token)
            .ok_or(LedgerError::WrongContract {
                address: apps.token_manager,
                expected: ContractKind::TokenManager,
                found: None,
            })?;
        state.token(payment.token)?;

        // Only holders can forward through the token manager
        let holdings = state.token(governance_token)?;
        if holdings.balance_of(&from).is_zero() {
            return Err(LedgerError::Reverted {
                reason: "TM_CAN_NOT_FORWARD".to_string(),
            });
        }
        let snapshot = holdings
            .balances
            .iter()
            .filter(|(_, stake)| !stake.is_zero())
            .map(|(holder, stake)| (*holder, *stake))
            .collect();

        let now = state.now;
        let voting = state.voting_mut(apps.voting)?;
        let settings = voting.settings;
        let id = ProposalId(voting.votes.len() as u64);
        voting.votes.push(ProposalEntry {
            vote: VoteRecord::new(payment.clone(), now, settings, snapshot),
            finance: apps.finance,
        });

        // The proposer's stake votes yea and executes if that decides it
        if settings.creator_votes {
            if let Err(e) = cast_vote_locked(&mut state, apps.voting, id, true, true, from) {
                state.voting_mut(apps.voting)?.votes.pop();
                return Err(e);
            }
        }
        state.confirm();

        info!(
            proposal = %id,
            voting = %apps.voting,
            recipient = %payment.recipient,
            amount = %payment.amount,
            proposer = %from,
            "Payment proposed"
        );
        Ok(id)
    }

    async fn cast_vote(
        &self,
        voting: Address,
        proposal: ProposalId,
        support: bool,
        execute_if_decided: bool,
        from: Address,
    ) -> Result<(), LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(voting, ContractKind::Voting, "vote")?;

        let executed =
            cast_vote_locked(&mut state, voting, proposal, support, execute_if_decided, from)?;
        state.confirm();
        debug!(%proposal, voter = %from, support, executed, "Vote cast");
        Ok(())
    }

    async fn can_execute(&self, voting: Address, proposal: ProposalId) -> Result<bool, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(voting, ContractKind::Voting, "canExecute")?;
        let now = state.now;
        Ok(tally::can_execute(&state.proposal(voting, proposal)?.vote, now))
    }

    async fn execute(
        &self,
        voting: Address,
        proposal: ProposalId,
        from: Address,
    ) -> Result<(), LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(voting, ContractKind::Voting, "executeVote")?;

        let now = state.now;
        let entry = state.proposal(voting, proposal)?;
        if entry.vote.executed {
            return Err(LedgerError::AlreadyExecuted(proposal));
        }
        if !tally::can_execute(&entry.vote, now) {
            return Err(LedgerError::CannotExecute(proposal));
        }
        let (payment, finance) = (entry.vote.payment.clone(), entry.finance);

        execute_payment(&mut state, finance, &payment)?;
        state.proposal_mut(voting, proposal)?.vote.executed = true;
        state.confirm();

        info!(%proposal, executor = %from, "Proposal executed");
        Ok(())
    }

    async fn proposal(
        &self,
        voting: Address,
        proposal: ProposalId,
    ) -> Result<ProposalStatus, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.take_fault()?;
        state.dispatch(voting, ContractKind::Voting, "getVote")?;
        let now = state.now;
        let vote = &state.proposal(voting, proposal)?.vote;
        Ok(ProposalStatus {
            id: proposal,
            phase: tally::phase(vote, now),
            yea: vote.yea,
            nay: vote.nay,
            voting_power: vote.voting_power,
            recipient: vote.payment.recipient,
            amount: vote.payment.amount,
        })
    }
}
