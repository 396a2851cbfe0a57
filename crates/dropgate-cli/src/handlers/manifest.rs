//! Manifest Command Handlers

use anyhow::{anyhow, Context, Result};
use dropgate_core::types::parse_amount;
use dropgate_core::{Address, Amount, EntitlementSet, MerkleManifest};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Build a manifest from a balance map file and write it to `output`.
pub fn build(balances: &Path, output: &Path) -> Result<()> {
    let text = std::fs::read_to_string(balances)
        .with_context(|| format!("Failed to read balances {}", balances.display()))?;
    let balances = parse_balances(&text)?;
    let set = EntitlementSet::from_balances(&balances)?;
    let manifest = MerkleManifest::from_set(&set);
    manifest.save(output)?;

    info!(path = %output.display(), root = %manifest.merkle_root, "Manifest written");
    println!("Merkle root: {}", manifest.merkle_root);
    println!("Recipients: {}", set.len());
    println!("Token total: {}", manifest.token_total);
    Ok(())
}

/// Load a manifest, rebuild its tree and check every proof.
pub fn verify(path: &Path) -> Result<()> {
    let verified = MerkleManifest::load(path)?;
    println!("Manifest {} is consistent", path.display());
    println!("Merkle root: {}", verified.root());
    println!("Recipients: {}", verified.entitlements().len());
    println!("Token total: {}", verified.total());
    Ok(())
}

/// Parse `{ "<account>": <amount> }` where amounts are JSON integers or
/// decimal / `0x` hex strings.
pub fn parse_balances(text: &str) -> Result<BTreeMap<Address, Amount>> {
    let raw: BTreeMap<String, Value> =
        serde_json::from_str(text).context("Balances must be a JSON object")?;
    raw.into_iter()
        .map(|(account, value)| {
            let address: Address = account
                .parse()
                .with_context(|| format!("Invalid account {account:?}"))?;
            let amount = match &value {
                Value::String(s) => {
                    parse_amount(s).with_context(|| format!("Invalid amount for {account}"))?
                }
                Value::Number(n) => n
                    .as_u64()
                    .map(Amount::from)
                    .ok_or_else(|| anyhow!("Amount for {account} must be a non-negative integer"))?,
                other => return Err(anyhow!("Amount for {account} has unsupported type: {other}")),
            };
            Ok((address, amount))
        })
        .collect()
}
