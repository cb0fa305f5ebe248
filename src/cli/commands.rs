//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use anyhow::{anyhow, bail, Result};
use dialoguer::Confirm;
use tracing::{info, warn};

use crate::config::{Config, ContractAddress};
use crate::executor::{Coordinator, ExecutionMode, ExecutionReport};
use crate::planner::diff::{asset_intents, diff, operator_intents, owner_intents, DesiredState};
use crate::planner::withdrawal::display_amount;
use crate::planner::{BatchBuilder, CallTargets, Intent, WithdrawalPlanner, WithdrawalRequest};
use crate::safe::contracts::{IDutchXModule, IGnosisSafe};
use crate::safe::{SafeChain, SnapshotReader, WalletState};

/// What every command works with, built once per run
pub struct Context {
    pub config: Config,
    pub conf_path: PathBuf,
    pub chain: Arc<dyn SafeChain>,
    pub mode: ExecutionMode,
}

/// Flags shared by state-changing commands
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the confirmation prompt
    pub yes: bool,

    /// Plan and print only
    pub dry_run: bool,
}

/// Show the Safe and module as they are on chain
pub async fn status(ctx: &Context) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let module = ctx.config.dx_module.address();

    let chain_id = ctx.chain.chain_id().await?;
    let snapshot = SnapshotReader::new(ctx.chain.clone()).read(safe, module).await?;
    let modules = ctx.chain.modules(safe).await?;

    println!("\n=== SAFE {} ===\n", safe);
    println!("Network ID: {}", chain_id);
    println!("Threshold:  {} owner/s", snapshot.wallet.threshold);
    println!("Nonce:      {}", snapshot.wallet.nonce);
    println!("Owners:");
    for owner in &snapshot.wallet.owners {
        println!("  {}", owner);
    }
    println!("Modules:    {:?}", modules);

    let (Some(module), Some(policy)) = (module, snapshot.policy) else {
        println!("\nNo dxModule configured.");
        return Ok(());
    };

    println!("\n=== DX MODULE {} ===\n", module);
    println!(
        "Module ENABLED: {}",
        if modules.contains(&module) { "Yes" } else { "No" }
    );
    println!("Module type:    {}", ctx.config.module_type);
    println!("DX Proxy:       {}", ctx.config.dx_proxy);
    println!("Whitelisted tokens: ({} tokens)", policy.tokens.len());
    for token in &policy.tokens {
        match ctx.chain.token_info(*token).await {
            Ok(info) => println!("  {:<8} {}", info.symbol, token),
            Err(e) => {
                warn!("Could not read token {}: {}", token, e);
                println!("  {:<8} {}", "?", token);
            }
        }
    }
    println!("Operators:");
    for operator in &policy.operators {
        println!("  {}", operator);
    }

    Ok(())
}

/// Reconcile owners and threshold with the configuration
pub async fn update_owners(ctx: &Context, opts: RunOptions) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let wallet = SnapshotReader::new(ctx.chain.clone()).wallet_state(safe).await?;

    print_change("Owners", &wallet.owners, &ctx.config.owners);
    println!("Threshold: {} -> {}", wallet.threshold, ctx.config.safe_threshold);

    let intents = owner_intents(&wallet, &ctx.config.owners, ctx.config.safe_threshold);
    execute_intents(ctx, opts, CallTargets::safe_only(safe), &wallet, intents, None).await
}

/// Reconcile module operators with the configuration
pub async fn update_operators(ctx: &Context, opts: RunOptions) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let module = ctx.config.require_module()?;
    let reader = SnapshotReader::new(ctx.chain.clone());
    let wallet = reader.wallet_state(safe).await?;
    let policy = reader.policy_state(module).await?;

    print_change("Operators", &policy.operators, &ctx.config.operators);

    let intents = operator_intents(&policy.operators, &ctx.config.operators);
    execute_intents(ctx, opts, module_targets(safe, module), &wallet, intents, None).await
}

/// Reconcile whitelisted tokens with the configuration
pub async fn update_tokens(ctx: &Context, opts: RunOptions) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let module = ctx.config.require_module()?;
    let reader = SnapshotReader::new(ctx.chain.clone());
    let wallet = reader.wallet_state(safe).await?;
    let policy = reader.policy_state(module).await?;

    print_change("Whitelisted tokens", &policy.tokens, &ctx.config.whitelisted_tokens);

    let intents = asset_intents(&policy.tokens, &ctx.config.whitelisted_tokens);
    execute_intents(ctx, opts, module_targets(safe, module), &wallet, intents, None).await
}

/// Reconcile owners, threshold, operators and tokens in one batch
pub async fn sync(ctx: &Context, opts: RunOptions) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let module = ctx.config.require_module()?;
    let snapshot = SnapshotReader::new(ctx.chain.clone())
        .read(safe, Some(module))
        .await?;
    let policy = snapshot.policy.unwrap_or_default();

    let desired = DesiredState {
        owners: &ctx.config.owners,
        threshold: ctx.config.safe_threshold,
        operators: &ctx.config.operators,
        tokens: &ctx.config.whitelisted_tokens,
    };
    let intents = diff(&snapshot.wallet, &policy, &desired);
    execute_intents(ctx, opts, module_targets(safe, module), &snapshot.wallet, intents, None).await
}

/// Move tokens out of the Safe, draining the exchange balance first
pub async fn withdraw(
    ctx: &Context,
    opts: RunOptions,
    token: Address,
    amount: &str,
    destination: Address,
) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let custody = ctx.config.require_custody()?;
    let wallet = SnapshotReader::new(ctx.chain.clone()).wallet_state(safe).await?;

    let planner = WithdrawalPlanner::new(ctx.chain.clone(), safe, custody);
    let plan = planner
        .plan(&WithdrawalRequest {
            token,
            amount: amount.to_string(),
            destination,
        })
        .await?;

    println!("\n=== WITHDRAWAL ===\n");
    println!("Token:       {} ({})", plan.token.symbol, token);
    println!("Amount:      {}", display_amount(plan.requested, &plan.token));
    println!("In exchange: {}", display_amount(plan.custody_balance, &plan.token));
    println!("In Safe:     {}", display_amount(plan.wallet_balance, &plan.token));
    println!("Destination: {}", destination);

    let targets = CallTargets {
        safe,
        module: None,
        custody: Some(custody),
    };
    execute_intents(ctx, opts, targets, &wallet, plan.intents, None).await
}

/// Execute one arbitrary call from the Safe
pub async fn safe_tx(
    ctx: &Context,
    opts: RunOptions,
    to: Address,
    amount: &str,
    data: &str,
) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let value = parse_ether(amount).map_err(|e| anyhow!("Invalid amount {}: {}", amount, e))?;
    let data: Bytes = if data.trim().is_empty() {
        Bytes::new()
    } else {
        data.trim()
            .parse()
            .map_err(|e| anyhow!("Invalid hex data: {}", e))?
    };

    let wallet = SnapshotReader::new(ctx.chain.clone()).wallet_state(safe).await?;
    let approvers = if ctx.mode.is_manual() {
        Some(ctx.config.require_owners_to_sign(wallet.threshold)?)
    } else {
        None
    };

    let intents = vec![Intent::Custom { to, value, data }];
    execute_intents(ctx, opts, CallTargets::safe_only(safe), &wallet, intents, approvers).await
}

/// Enable the configured module on the Safe
pub async fn enable_module(ctx: &Context, opts: RunOptions) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let module = ctx.config.require_module()?;
    let wallet = SnapshotReader::new(ctx.chain.clone()).wallet_state(safe).await?;

    let modules = ctx.chain.modules(safe).await?;
    let intents = if modules.contains(&module) {
        Vec::new()
    } else {
        vec![Intent::EnableModule { module }]
    };
    execute_intents(ctx, opts, CallTargets::safe_only(safe), &wallet, intents, None).await
}

/// Deploy a Safe and a module bound to it, then record both addresses
pub async fn create(ctx: &mut Context, opts: RunOptions) -> Result<()> {
    if let ContractAddress::Deployed(safe) = ctx.config.safe {
        bail!("Safe already created at {}; use update-module to deploy a new module", safe);
    }

    let factory = ctx.config.require_factory()?;
    let safe_master_copy = ctx
        .config
        .safe_master_copy
        .address()
        .ok_or_else(|| anyhow!("safeMasterCopy address required"))?;
    let module_master_copy = ctx.config.require_module_master_copy()?;
    let custody = ctx.config.require_custody()?;

    println!("\n=== CREATE ===\n");
    println!("Network ID:         {}", ctx.chain.chain_id().await?);
    println!("Proxy factory:      {}", factory);
    println!("Safe master copy:   {}", safe_master_copy);
    println!("Module master copy: {} ({})", module_master_copy, ctx.config.module_type);
    println!("DX Proxy:           {}", custody);
    println!("Owners:             {:?}", ctx.config.owners);
    println!("Threshold:          {}", ctx.config.safe_threshold);
    println!("Operators:          {:?}", ctx.config.operators);
    println!("Tokens:             {:?}", ctx.config.whitelisted_tokens);

    if opts.dry_run {
        println!("\nDRY-RUN: nothing deployed");
        return Ok(());
    }
    require_payer(&ctx.mode)?;
    if !opts.yes
        && !confirm(format!(
            "Create a new Safe with a {} module?",
            ctx.config.module_type
        ))?
    {
        return Ok(());
    }

    let setup = IGnosisSafe::setupCall {
        _owners: ctx.config.owners.clone(),
        _threshold: U256::from(ctx.config.safe_threshold),
        to: Address::ZERO,
        data: Bytes::new(),
    }
    .abi_encode();
    let safe = ctx
        .chain
        .create_proxy(factory, safe_master_copy, setup.into(), ctx.config.gas_params())
        .await?;
    info!("Safe deployed at {}", safe);

    // Persist right away so a failed module deployment does not lose the Safe
    ctx.config.safe = ContractAddress::Deployed(safe);
    ctx.config.save(&ctx.conf_path)?;

    let module = deploy_module(ctx, factory, safe, module_master_copy, custody).await?;

    println!("\nSafe:      {}", safe);
    println!("DX Module: {}", module);
    warn!("Module {} is not enabled yet, run `enable-module`", module);
    Ok(())
}

/// Deploy a fresh module for the existing Safe and record its address
pub async fn update_module(ctx: &mut Context, opts: RunOptions) -> Result<()> {
    let safe = ctx.config.require_safe()?;
    let factory = ctx.config.require_factory()?;
    let module_master_copy = ctx.config.require_module_master_copy()?;
    let custody = ctx.config.require_custody()?;
    let modules = ctx.chain.modules(safe).await?;

    println!("\n=== UPDATE MODULE ===\n");
    println!("Safe:               {}", safe);
    println!("Current modules:    {:?}", modules);
    println!("Current dxModule:   {}", ctx.config.dx_module);
    println!("Module master copy: {} ({})", module_master_copy, ctx.config.module_type);
    println!("DX Proxy:           {}", custody);

    if opts.dry_run {
        println!("\nDRY-RUN: nothing deployed");
        return Ok(());
    }
    require_payer(&ctx.mode)?;
    if !opts.yes
        && !confirm(format!(
            "Create a new {} module for the safe {}?",
            ctx.config.module_type, safe
        ))?
    {
        return Ok(());
    }

    let module = deploy_module(ctx, factory, safe, module_master_copy, custody).await?;
    println!("\nDX Module: {}", module);
    if !modules.contains(&module) {
        warn!("Module {} is not enabled yet, run `enable-module`", module);
    }
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

async fn deploy_module(
    ctx: &mut Context,
    factory: Address,
    safe: Address,
    master_copy: Address,
    custody: Address,
) -> Result<Address> {
    let setup = IDutchXModule::setupCall {
        dx: custody,
        tokens: ctx.config.whitelisted_tokens.clone(),
        operators: ctx.config.operators.clone(),
        safe,
    }
    .abi_encode();

    let module = ctx
        .chain
        .create_proxy(factory, master_copy, setup.into(), ctx.config.gas_params())
        .await?;
    info!("{} module deployed at {}", ctx.config.module_type, module);

    ctx.config.dx_module = ContractAddress::Deployed(module);
    ctx.config.save(&ctx.conf_path)?;
    Ok(module)
}

/// Plan, confirm and run a batch of intents
async fn execute_intents(
    ctx: &Context,
    opts: RunOptions,
    targets: CallTargets,
    wallet: &WalletState,
    intents: Vec<Intent>,
    approvers: Option<Vec<Address>>,
) -> Result<()> {
    if intents.is_empty() {
        println!("Nothing to update.");
        return Ok(());
    }
    if intents.iter().any(Intent::is_owner_change) {
        warn!("Batch changes owners or threshold; check the new owner set before confirming");
    }

    let operations = BatchBuilder::new(ctx.chain.clone(), targets)
        .build(intents, wallet.nonce)
        .await?;

    println!("\n=== PLANNED OPERATIONS ({}) ===\n", operations.len());
    for operation in &operations {
        println!("  {}", operation);
    }

    if opts.dry_run {
        println!("\nDRY-RUN: nothing signed or submitted");
        return Ok(());
    }

    let prompt = match &ctx.mode {
        ExecutionMode::LocalSigning(_) => {
            format!("Sign and execute {} operation/s?", operations.len())
        }
        ExecutionMode::ManualApproval => {
            format!("Prepare approval data for {} operation/s?", operations.len())
        }
    };
    if !opts.yes && !confirm(prompt)? {
        return Ok(());
    }

    let mut coordinator = Coordinator::new(
        ctx.chain.clone(),
        targets.safe,
        ctx.mode.clone(),
        ctx.config.gas_params(),
    );
    if let Some(approvers) = approvers {
        coordinator = coordinator.with_approvers(approvers);
    }

    let report = coordinator.run(operations, wallet).await?;
    print_report(&report)?;
    report.into_result()?;
    Ok(())
}

fn print_report(report: &ExecutionReport) -> Result<()> {
    println!("\n=== EXECUTION REPORT ===\n");
    print!("{}", report);

    for artifact in &report.artifacts {
        println!(
            "\n--- #{} nonce {}: {} ---",
            artifact.index, artifact.nonce, artifact.description
        );
        println!("Operation hash: {}", artifact.operation_hash);
        println!("Approve (each owner):");
        println!("{}", serde_json::to_string_pretty(&artifact.approve)?);
        println!("Execute (once approved):");
        println!("{}", serde_json::to_string_pretty(&artifact.execute)?);
    }
    Ok(())
}

fn print_change(label: &str, current: &[Address], desired: &[Address]) {
    println!("\n{} (current): {:?}", label, current);
    println!("{} (desired): {:?}", label, desired);
}

fn module_targets(safe: Address, module: Address) -> CallTargets {
    CallTargets {
        safe,
        module: Some(module),
        custody: None,
    }
}

fn require_payer(mode: &ExecutionMode) -> Result<()> {
    if mode.is_manual() {
        bail!("Deployments are sent from a local account: set MNEMONIC or PK");
    }
    Ok(())
}

fn confirm(prompt: String) -> Result<bool> {
    let confirmed = Confirm::new().with_prompt(prompt).default(false).interact()?;
    if !confirmed {
        info!("Cancelled by user");
    }
    Ok(confirmed)
}
