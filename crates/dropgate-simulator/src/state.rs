//! Contract and account state held by the simulated chain.

use crate::tally::{VoteRecord, VotingSettings};
use dropgate_core::crypto::hash::hash_parts;
use dropgate_core::{Address, Amount, ClaimLedger, ContractKind, Digest, LedgerError, ProposalId};
use std::collections::{BTreeMap, HashMap};

/// ERC20 ledger.
#[derive(Debug, Default)]
pub struct TokenState {
    /// Balance per holder
    pub balances: BTreeMap<Address, Amount>,
    /// Sum of all balances
    pub total_supply: Amount,
}

impl TokenState {
    /// Balance of `account`.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Create `amount` new tokens for `account`.
    pub fn mint(&mut self, account: Address, amount: Amount) {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
        self.total_supply = self.total_supply.saturating_add(amount);
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(&from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                needed: amount,
                available,
            });
        }
        self.balances.insert(from, available - amount);
        let balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
        Ok(())
    }
}

/// A deployed distributor.
#[derive(Debug)]
pub struct DistributorState {
    /// Account that deployed it
    pub deployer: Address,
    /// Token it pays out
    pub token: Address,
    /// Claim ledger bound to the root
    pub ledger: ClaimLedger,
}

/// A vote plus the finance app that pays it out.
#[derive(Debug, Clone)]
pub struct ProposalEntry {
    /// Tallies and payment
    pub vote: VoteRecord,
    /// Finance app executing the payment
    pub finance: Address,
}

/// A deployed voting app.
#[derive(Debug)]
pub struct VotingState {
    /// Token whose holders vote
    pub token: Address,
    /// Parameters for new votes
    pub settings: VotingSettings,
    /// Votes; the id is the position
    pub votes: Vec<ProposalEntry>,
}

/// A deployed finance app.
#[derive(Debug, Clone, Copy)]
pub struct FinanceState {
    /// Account payments are drawn from
    pub vault: Address,
}

/// A deployed token manager app.
#[derive(Debug, Clone, Copy)]
pub struct TokenManagerState {
    /// Token it manages
    pub token: Address,
}

/// Everything on the chain.
#[derive(Debug)]
pub struct ChainState {
    /// Chain id
    pub chain_id: u64,
    /// Current time, seconds
    pub now: u64,
    /// Confirmed transactions so far
    pub tx_count: u64,
    /// Next deployment nonce per account
    pub nonces: HashMap<Address, u64>,
    /// What lives at each contract address
    pub contracts: HashMap<Address, ContractKind>,
    /// ERC20 tokens
    pub tokens: HashMap<Address, TokenState>,
    /// Distributors by address
    pub distributors: BTreeMap<Address, DistributorState>,
    /// Deployment order of distributors
    pub distributor_order: Vec<Address>,
    /// Voting apps
    pub votings: HashMap<Address, VotingState>,
    /// Finance apps
    pub finances: HashMap<Address, FinanceState>,
    /// Token manager apps
    pub token_managers: HashMap<Address, TokenManagerState>,
    /// Error returned by the next call instead of executing it
    pub pending_fault: Option<LedgerError>,
}

impl ChainState {
    /// Empty chain starting at `now`.
    pub fn new(chain_id: u64, now: u64) -> Self {
        Self {
            chain_id,
            now,
            tx_count: 0,
            nonces: HashMap::new(),
            contracts: HashMap::new(),
            tokens: HashMap::new(),
            distributors: BTreeMap::new(),
            distributor_order: Vec::new(),
            votings: HashMap::new(),
            finances: HashMap::new(),
            token_managers: HashMap::new(),
            pending_fault: None,
        }
    }

    /// Reserve the next address for `deployer`.
    ///
    /// Addresses are the low 20 bytes of `H(deployer || nonce)`.
    pub fn next_address(&mut self, deployer: Address) -> Address {
        let nonce = self.nonces.entry(deployer).or_default();
        let digest: Digest = hash_parts(&[deployer.as_bytes(), &nonce.to_be_bytes()]);
        *nonce += 1;

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[12..]);
        Address::from_bytes(bytes)
    }

    /// Reserve the next address for `deployer` and record a contract of `kind` there.
    pub fn create_address(&mut self, deployer: Address, kind: ContractKind) -> Address {
        let address = self.next_address(deployer);
        self.contracts.insert(address, kind);
        address
    }

    /// Fail unless `address` holds a contract of `expected` kind.
    pub fn expect_kind(&self, address: Address, expected: ContractKind) -> Result<(), LedgerError> {
        match self.contracts.get(&address) {
            Some(kind) if *kind == expected => Ok(()),
            found => Err(LedgerError::WrongContract {
                address,
                expected,
                found: found.copied(),
            }),
        }
    }

    /// Route a call to `method` on the contract of `kind` at `address`.
    ///
    /// Fails like the chain would: `WrongContract` when something else lives
    /// there, a revert when the interface has no such method.
    pub fn dispatch(
        &self,
        address: Address,
        kind: ContractKind,
        method: &str,
    ) -> Result<(), LedgerError> {
        self.expect_kind(address, kind)?;
        if kind.supports(method) {
            Ok(())
        } else {
            Err(LedgerError::Reverted {
                reason: format!("{kind} has no method {method}"),
            })
        }
    }

    /// Token ledger at `address`.
    pub fn token(&self, address: Address) -> Result<&TokenState, LedgerError> {
        self.expect_kind(address, ContractKind::Erc20)?;
        self.tokens.get(&address).ok_or(LedgerError::WrongContract {
            address,
            expected: ContractKind::Erc20,
            found: None,
        })
    }

    /// Mutable token ledger at `address`.
    pub fn token_mut(&mut self, address: Address) -> Result<&mut TokenState, LedgerError> {
        self.expect_kind(address, ContractKind::Erc20)?;
        self.tokens.get_mut(&address).ok_or(LedgerError::WrongContract {
            address,
            expected: ContractKind::Erc20,
            found: None,
        })
    }

    /// Distributor at `address`.
    pub fn distributor(&self, address: Address) -> Result<&DistributorState, LedgerError> {
        self.expect_kind(address, ContractKind::MerkleDistributor)?;
        self.distributors
            .get(&address)
            .ok_or(LedgerError::WrongContract {
                address,
                expected: ContractKind::MerkleDistributor,
                found: None,
            })
    }

    /// Voting app at `address`.
    pub fn voting(&self, address: Address) -> Result<&VotingState, LedgerError> {
        self.expect_kind(address, ContractKind::Voting)?;
        self.votings.get(&address).ok_or(LedgerError::WrongContract {
            address,
            expected: ContractKind::Voting,
            found: None,
        })
    }

    /// Mutable voting app at `address`.
    pub fn voting_mut(&mut self, address: Address) -> Result<&mut VotingState, LedgerError> {
        self.expect_kind(address, ContractKind::Voting)?;
        self.votings.get_mut(&address).ok_or(LedgerError::WrongContract {
            address,
            expected: ContractKind::Voting,
            found: None,
        })
    }

    /// Vote `id` on the voting app at `voting`.
    pub fn proposal(&self, voting: Address, id: ProposalId) -> Result<&ProposalEntry, LedgerError> {
        let index = usize::try_from(id.0).map_err(|_| LedgerError::UnknownProposal(id))?;
        self.voting(voting)?
            .votes
            .get(index)
            .ok_or(LedgerError::UnknownProposal(id))
    }

    /// Mutable vote `id` on the voting app at `voting`.
    pub fn proposal_mut(
        &mut self,
        voting: Address,
        id: ProposalId,
    ) -> Result<&mut ProposalEntry, LedgerError> {
        let index = usize::try_from(id.0).map_err(|_| LedgerError::UnknownProposal(id))?;
        self.voting_mut(voting)?
            .votes
            .get_mut(index)
            .ok_or(LedgerError::UnknownProposal(id))
    }

    /// Take the injected fault, if any.
    pub fn take_fault(&mut self) -> Result<(), LedgerError> {
        match self.pending_fault.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Record one confirmed transaction.
    pub fn confirm(&mut self) {
        self.tx_count += 1;
    }
}
