//! `tierpad` operator tooling: tier lookups, pool identity prediction and
//! whitelist root/proof generation.

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use tierpad::{
    config::Settings,
    math::mul_bps,
    registry::{derive_identity, init_digest},
    telemetry, Address, LockClass, PoolConfig, Salt, Tier, VestingConfig, WhitelistTree, UNIT,
};

#[derive(Debug, Parser)]
#[command(name = "tierpad", version, about = "Tiered-allocation token sale tooling")]
struct Cli {
    /// Config file (TOML/YAML/JSON). Defaults to ./tierpad.{toml,yaml,yml,json}.
    #[arg(long, global = true, env = "TIERPAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a stake (whole tokens) under a lock class.
    Tier {
        #[arg(long)]
        amount: u128,
        /// 0, 30, 60 or 90.
        #[arg(long, default_value_t = 0)]
        lock_days: u64,
    },
    /// Print the identity a registry would assign to a pool.
    Predict {
        /// JSON file with `config` and `vesting` objects.
        #[arg(long)]
        pool: PathBuf,
        #[arg(long)]
        salt: Salt,
        /// Overrides `registry.factory`.
        #[arg(long)]
        factory: Option<Address>,
        /// Overrides `registry.owner`.
        #[arg(long)]
        owner: Option<Address>,
        /// Overrides `staking.account`.
        #[arg(long)]
        stake_ledger: Option<Address>,
    },
    /// Build a whitelist root and proofs from an address list (one per line, `#` comments).
    Whitelist {
        #[arg(long)]
        file: PathBuf,
        /// Only print the proof for this address.
        #[arg(long)]
        address: Option<Address>,
    },
}

#[derive(Debug, Deserialize)]
struct PoolFile {
    config: PoolConfig,
    vesting: VestingConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let _log = telemetry::init(settings.logging_config())?;
    debug!(?settings, "settings loaded");

    let out = match cli.command {
        Command::Tier { amount, lock_days } => tier_report(amount, lock_days)?,
        Command::Predict { pool, salt, factory, owner, stake_ledger } => {
            let raw = fs::read_to_string(&pool).with_context(|| format!("reading {}", pool.display()))?;
            let file: PoolFile = serde_json::from_str(&raw).context("parsing pool file")?;
            // structural checks only; the start-time check belongs to creation time
            file.config.validate(0)?;
            file.vesting.validate()?;

            let factory = factory.unwrap_or(settings.registry.factory);
            let owner = owner.unwrap_or(settings.registry.owner);
            let ledger = stake_ledger.unwrap_or(settings.staking.account);
            let init = init_digest(&file.config, &file.vesting, ledger, owner);
            let id = derive_identity(factory, &salt, &init);
            info!(pool = %id, "identity computed");
            json!({
                "pool": id,
                "account": id.account(),
                "salt": format!("{salt:?}"),
                "factory": factory,
                "owner": owner,
                "stake_ledger": ledger,
                "init_digest": format!("0x{}", hex::encode(init)),
            })
        }
        Command::Whitelist { file, address } => {
            let raw = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let members = parse_address_list(&raw)?;
            whitelist_report(&members, address)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn tier_report(amount: u128, lock_days: u64) -> anyhow::Result<serde_json::Value> {
    let class = LockClass::from_days(lock_days)?;
    let principal = amount.checked_mul(UNIT).context("amount too large")?;
    let weighted = mul_bps(principal, class.multiplier_bps())?;
    let tier = Tier::classify(weighted);
    Ok(json!({
        "amount": amount.to_string(),
        "lock_class": class,
        "weighted": weighted.to_string(),
        "tier": tier,
        "allocation_multiplier_bps": tier.allocation_multiplier_bps(),
        "guaranteed": tier.is_guaranteed(),
        "private_eligible": tier.is_private_eligible(),
    }))
}

fn parse_address_list(raw: &str) -> anyhow::Result<Vec<Address>> {
    raw.lines()
        .enumerate()
        .map(|(n, l)| (n + 1, l.split('#').next().unwrap_or("").trim()))
        .filter(|(_, l)| !l.is_empty())
        .map(|(n, l)| l.parse::<Address>().with_context(|| format!("line {n}: bad address `{l}`")))
        .collect()
}

fn whitelist_report(members: &[Address], only: Option<Address>) -> anyhow::Result<serde_json::Value> {
    let tree = WhitelistTree::build(members);
    let Some(root) = tree.root() else {
        bail!("address list is empty");
    };
    let encode = |p: Vec<[u8; 32]>| p.iter().map(|h| format!("0x{}", hex::encode(h))).collect::<Vec<_>>();

    let proofs: BTreeMap<String, Vec<String>> = match only {
        Some(a) => {
            let p = tree.proof(&a).with_context(|| format!("{a} is not whitelisted"))?;
            BTreeMap::from([(a.to_string(), encode(p))])
        }
        None => members
            .iter()
            .filter_map(|m| tree.proof(m).map(|p| (m.to_string(), encode(p))))
            .collect(),
    };
    info!(members = tree.len(), "whitelist built");
    Ok(json!({
        "root": format!("0x{}", hex::encode(root)),
        "members": tree.len(),
        "proofs": proofs,
    }))
}
