use crate::context::StageContext;
use crate::errors::{Result, StageError};
use crate::keys;
use crate::stages::Stage;
use dropgate_core::{Address, ClaimReceipt, ClaimRequest, VerifiedManifest};
use tracing::{info, warn};

/// Result of claiming every entitlement in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSummary {
    /// Claims paid by this run
    pub claimed: Vec<ClaimReceipt>,
    /// Indices found already claimed
    pub already_claimed: Vec<u64>,
}

/// Distributor, token and manifest resolved from the state record.
struct ClaimTarget {
    distributor: Address,
    token: Address,
    manifest: VerifiedManifest,
}

/// Claim `account`'s entitlement from the airdrop's distributor.
///
/// Claims read the state record but never write it, so they do not take the
/// state lock and recipients may claim concurrently.
#[tracing::instrument(skip(ctx), fields(airdrop = %ctx.airdrop_id(), network = %ctx.network()))]
pub async fn claim(ctx: &StageContext, account: Address) -> Result<ClaimReceipt> {
    let target = resolve(ctx).await?;
    let request = target
        .manifest
        .claim_for(&account)
        .ok_or(StageError::NoEntitlement { account })?;
    submit(ctx, &target, &request).await
}

/// Claim every entitlement in the manifest, in index order.
///
/// Stops at the first failure. With `idempotent_claims` indices already
/// claimed on the ledger are skipped instead of failing the run.
#[tracing::instrument(skip(ctx), fields(airdrop = %ctx.airdrop_id(), network = %ctx.network()))]
pub async fn claim_all(ctx: &StageContext) -> Result<ClaimSummary> {
    let target = resolve(ctx).await?;
    let idempotent = ctx.config().idempotent_claims;
    let mut summary = ClaimSummary::default();

    for request in target.manifest.claim_requests() {
        let index = request.entitlement.index;
        if idempotent
            && ctx
                .call(
                    "is_claimed",
                    ctx.ledger().is_claimed(target.distributor, index),
                )
                .await?
        {
            info!(index, "Entitlement already claimed");
            summary.already_claimed.push(index);
            continue;
        }
        match submit(ctx, &target, &request).await {
            Ok(receipt) => summary.claimed.push(receipt),
            // Claimed by someone else since the check above
            Err(StageError::AlreadyClaimed { index }) if idempotent => {
                summary.already_claimed.push(index);
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        claimed = summary.claimed.len(),
        skipped = summary.already_claimed.len(),
        "Claims done"
    );
    Ok(summary)
}

async fn resolve(ctx: &StageContext) -> Result<ClaimTarget> {
    let state = ctx.read_state_for(Stage::Claim)?;
    let token = state.get_address(keys::DAO_TOKEN)?;
    let distributor = state.get_address(&keys::distributor(ctx.airdrop_id()))?;
    let manifest = ctx.load_manifest(&state)?;

    let onchain_root = ctx
        .call("distributor_root", ctx.ledger().distributor_root(distributor))
        .await?;
    if onchain_root != manifest.root() {
        return Err(StageError::DistributorRootMismatch {
            distributor,
            expected: manifest.root(),
            found: onchain_root,
        });
    }
    Ok(ClaimTarget {
        distributor,
        token,
        manifest,
    })
}

async fn submit(
    ctx: &StageContext,
    target: &ClaimTarget,
    request: &ClaimRequest,
) -> Result<ClaimReceipt> {
    let entitlement = &request.entitlement;
    // No transaction for a proof the distributor would reject
    if !target.manifest.commitment().verify(entitlement, &request.proof) {
        warn!(index = entitlement.index, "Proof does not verify");
        return Err(StageError::InvalidProof {
            index: entitlement.index,
        });
    }

    let before = ctx
        .call(
            "balance_of",
            ctx.ledger().balance_of(target.token, entitlement.account),
        )
        .await?;
    let receipt = ctx
        .call(
            "claim",
            ctx.ledger().claim(target.distributor, request, ctx.sender()),
        )
        .await
        .map_err(StageError::lift_claim_rejection)?;
    let after = ctx
        .call(
            "balance_of",
            ctx.ledger().balance_of(target.token, entitlement.account),
        )
        .await?;

    if before.checked_add(entitlement.amount) != Some(after) {
        return Err(StageError::BalanceMismatch {
            account: entitlement.account,
            before,
            after,
            amount: entitlement.amount,
        });
    }
    info!(
        index = receipt.index,
        account = %receipt.account,
        amount = %receipt.amount,
        "Claimed"
    );
    Ok(receipt)
}
