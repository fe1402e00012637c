//! CLI commands for injection and backups

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use console::style;

use crate::cli::progress::{bar_callback, percent_bar, print_done, print_step, DOCUMENT, GEAR, REWIND};
use crate::inject::{filter_records, list_backups, restore_backup, InjectOptions, Injector};
use crate::inventory::Inventory;

pub fn execute(
    inventory_path: &Path,
    game_path: Option<&Path>,
    backup_dir: &Path,
    options: &InjectOptions,
    dry_run: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    print_step(1, 2, DOCUMENT, &format!("Reading {}...", inventory_path.display()));
    let inventory = Inventory::load(inventory_path)?;
    let game_path = game_path.unwrap_or(&inventory.game_path);

    if dry_run {
        let outcome = filter_records(&inventory.texts);
        for (file, records) in outcome.group_by_file() {
            println!("{} ({} records)", file.display(), records.len());
        }
        for rejection in outcome.nul_rejections() {
            println!("{} {}: {}", style("rejected").red(), rejection.id, rejection.reason);
        }
        println!(
            "{} records would be written, {} skipped",
            outcome.accepted.len(),
            outcome.rejected.len()
        );
        return Ok(());
    }

    print_step(2, 2, GEAR, &format!("Injecting into {}...", game_path.display()));
    let injector = Injector::new(game_path, backup_dir).with_options(options.clone());
    let pb = percent_bar(quiet);
    let report = injector.inject(&inventory, &bar_callback(&pb), &AtomicBool::new(false))?;
    pb.finish_and_clear();

    for file in &report.files {
        if let Some(error) = &file.error {
            println!("{} {}: {}", style("failed").red(), file.path.display(), error);
        }
        for (id, reason) in &file.failed {
            println!("{} {}: {}", style("skipped").yellow(), id, reason);
        }
    }
    println!("{}", report.summary());
    if let Some(dir) = &report.backup_dir {
        println!("Backups in {}", dir.display());
    }
    print_done(started.elapsed());
    Ok(())
}

pub fn restore(game_path: &Path, backup: Option<&Path>, backup_dir: &Path) -> anyhow::Result<()> {
    let backup = match backup {
        Some(path) => path.to_path_buf(),
        None => list_backups(backup_dir)?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no backups under {}", backup_dir.display()))?,
    };
    print_step(1, 1, REWIND, &format!("Restoring {}...", backup.display()));
    let result = restore_backup(&backup, game_path)?;
    println!("Restored {} files, {} failed", result.success_count, result.fail_count);
    if result.fail_count > 0 {
        for line in result.results.iter().filter(|r| r.starts_with("Failed")) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub fn list(backup_dir: &Path) -> anyhow::Result<()> {
    let backups = list_backups(backup_dir)?;
    if backups.is_empty() {
        println!("No backups under {}", backup_dir.display());
    }
    for backup in backups {
        println!("{}", backup.display());
    }
    Ok(())
}
