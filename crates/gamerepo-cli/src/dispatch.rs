use std::sync::Arc;

use anyhow::{Context, Result};
use gamerepo_core::{
    run_periodic, CacheError, Config, ConfigError, ExecutionOutcome, InstallError,
    InstallOutcome, LogObserver, RepoContext, ScanDiagnostics, SyncError,
};
use gamerepo_domain::PackageRecord;
use serde_json::{json, Value};
use tracing::warn;

use crate::{CommandGroupCli, GamerepoCli};

/// Runs the selected command on a fresh multi-threaded runtime.
pub fn execute(cli: &GamerepoCli) -> Result<(&'static str, ExecutionOutcome)> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    Ok(runtime.block_on(dispatch_command(cli)))
}

async fn dispatch_command(cli: &GamerepoCli) -> (&'static str, ExecutionOutcome) {
    let name = cli.command.name();
    let config = match Config::from_env(cli.root.clone()) {
        Ok(config) => config,
        Err(err) => return (name, config_error_outcome(&err)),
    };
    let ctx = Arc::new(RepoContext::open(config, Arc::new(LogObserver)));
    let outcome = match &cli.command {
        CommandGroupCli::Sync => sync(&ctx).await,
        CommandGroupCli::List => list(&ctx).await,
        CommandGroupCli::Reconcile => reconcile(&ctx).await,
        CommandGroupCli::Install(args) => install(&ctx, &args.id).await,
        CommandGroupCli::Watch => watch(ctx).await,
    };
    (name, outcome)
}

fn config_error_outcome(err: &ConfigError) -> ExecutionOutcome {
    match err {
        ConfigError::MissingRoot => ExecutionOutcome::user_error(
            err.to_string(),
            json!({ "hint": "pass --root DIR or set GAMEREPO_ROOT" }),
        ),
        ConfigError::InvalidNumber { key, value } => ExecutionOutcome::user_error(
            err.to_string(),
            json!({ "key": key, "value": value }),
        ),
    }
}

async fn sync(ctx: &RepoContext) -> ExecutionOutcome {
    match ctx.owned_packages().await {
        Ok(owned) => {
            let mut outcome = catalog_outcome(ctx, &owned.packages);
            attach_diagnostics(&mut outcome.details, &owned.diagnostics);
            outcome
        }
        Err(err) => sync_failure(ctx, &err),
    }
}

async fn list(ctx: &RepoContext) -> ExecutionOutcome {
    let packages = ctx.packages().await;
    catalog_outcome(ctx, &packages)
}

async fn reconcile(ctx: &RepoContext) -> ExecutionOutcome {
    let reconciled = match ctx.reconcile().await {
        Ok(reconciled) => reconciled,
        Err(err) => return sync_failure(ctx, &err),
    };
    let diff = &reconciled.diff;
    let message = if diff.is_empty() {
        "catalog unchanged".to_string()
    } else {
        format!("{} added, {} removed", diff.added.len(), diff.removed.len())
    };
    let mut details = json!({
        "added": diff.added.iter().map(summary).collect::<Vec<_>>(),
        "removed": diff.removed.iter().map(summary).collect::<Vec<_>>(),
        "persisted": reconciled.persisted,
    });
    attach_diagnostics(&mut details, &reconciled.diagnostics);
    ExecutionOutcome::success(message, details)
}

async fn install(ctx: &RepoContext, id: &str) -> ExecutionOutcome {
    match ctx.install(id).await {
        Ok(InstallOutcome::NothingToInstall { id }) => ExecutionOutcome::success(
            format!("nothing to install for {id}"),
            json!({ "id": id, "installed": false }),
        ),
        Ok(InstallOutcome::Installed {
            id,
            output,
            persisted,
        }) => ExecutionOutcome::success(
            format!("installed {id}"),
            json!({
                "id": id,
                "installed": true,
                "persisted": persisted,
                "exit_code": output.code,
                "stdout": output.stdout,
                "stderr": output.stderr,
            }),
        ),
        Err(err) => install_failure(&err),
    }
}

fn install_failure(err: &InstallError) -> ExecutionOutcome {
    match err {
        InstallError::UnknownPackage(id) => ExecutionOutcome::user_error(
            err.to_string(),
            json!({ "id": id, "hint": "run `gamerepo sync` to refresh the catalog" }),
        ),
        InstallError::InProgress(id) => {
            ExecutionOutcome::user_error(err.to_string(), json!({ "id": id }))
        }
        InstallError::Spawn {
            id,
            command,
            source,
        } => ExecutionOutcome::failure(
            err.to_string(),
            json!({
                "id": id,
                "command": command.display().to_string(),
                "reason": source.to_string(),
            }),
        ),
        InstallError::Failed {
            id,
            command,
            output,
        } => ExecutionOutcome::failure(
            err.to_string(),
            json!({
                "id": id,
                "command": command.display().to_string(),
                "exit_code": output.code,
                "stdout": output.stdout,
                "stderr": output.stderr,
            }),
        ),
    }
}

async fn watch(ctx: Arc<RepoContext>) -> ExecutionOutcome {
    let root = ctx.config().repo_root().display().to_string();
    run_periodic(ctx, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C; stopping");
        }
    })
    .await;
    ExecutionOutcome::success("stopped watching", json!({ "root": root }))
}

fn catalog_outcome(ctx: &RepoContext, packages: &[PackageRecord]) -> ExecutionOutcome {
    let message = match packages.len() {
        1 => "1 package".to_string(),
        n => format!("{n} packages"),
    };
    ExecutionOutcome::success(
        message,
        json!({
            "root": ctx.config().repo_root().display().to_string(),
            "cache_file": ctx.config().cache_file().display().to_string(),
            "packages": packages.iter().map(package_details).collect::<Vec<_>>(),
        }),
    )
}

fn attach_diagnostics(details: &mut Value, diagnostics: &ScanDiagnostics) {
    let Some(map) = details.as_object_mut() else {
        return;
    };
    let rejected = diagnostics
        .rejected
        .iter()
        .map(|failure| {
            json!({
                "directory": failure.directory.display().to_string(),
                "error": failure.error.to_string(),
            })
        })
        .collect::<Vec<_>>();
    let warnings = diagnostics
        .warnings
        .iter()
        .map(|warning| {
            json!({
                "path": warning.path().display().to_string(),
                "error": warning.to_string(),
            })
        })
        .collect::<Vec<_>>();
    map.insert("rejected".into(), Value::Array(rejected));
    map.insert("warnings".into(), Value::Array(warnings));
}

fn sync_failure(ctx: &RepoContext, err: &SyncError) -> ExecutionOutcome {
    match err {
        SyncError::RootUnreadable(unreadable) => ExecutionOutcome::failure(
            err.to_string(),
            json!({
                "root": unreadable.root.display().to_string(),
                "reason": unreadable.source.to_string(),
                "hint": "the catalog and cache were left unchanged",
            }),
        ),
        SyncError::ScanAborted(source) => ExecutionOutcome::failure(
            err.to_string(),
            json!({
                "root": ctx.config().repo_root().display().to_string(),
                "reason": source.to_string(),
            }),
        ),
        SyncError::Cache(cache) => cache_failure(ctx, cache),
    }
}

fn cache_failure(ctx: &RepoContext, err: &CacheError) -> ExecutionOutcome {
    ExecutionOutcome::failure(
        err.to_string(),
        json!({
            "cache_file": ctx.config().cache_file().display().to_string(),
            "reason": err.source.to_string(),
        }),
    )
}

fn summary(record: &PackageRecord) -> Value {
    json!({ "id": record.id, "title": record.title })
}

fn package_details(record: &PackageRecord) -> Value {
    json!({
        "id": record.id,
        "title": record.title,
        "location": record.location.display().to_string(),
        "installer": record.installer_path,
        "image_files": record.image_paths,
        "compatible_os": record.compatible_os,
        "installed": record.installed,
        "running": record.running,
        "local_state": record.local_state().bits(),
        "os_compatibility": record.os_compatibility().map(|mask| mask.bits()),
    })
}
