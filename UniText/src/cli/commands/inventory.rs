//! CLI commands for editing inventories

use std::path::Path;

use crate::inventory::{load_import, Inventory};

pub fn stats(path: &Path) -> anyhow::Result<()> {
    let inventory = Inventory::load(path)?;
    let stats = inventory.stats();
    println!("Inventory: {}", path.display());
    println!("Game path: {}", inventory.game_path.display());
    println!("Scanned:   {}", inventory.scan_date);
    println!();
    println!("Total texts: {}", stats.total);
    println!(
        "Translated:  {} ({:.1}%)",
        stats.translated,
        stats.percent_translated()
    );
    println!("Remaining:   {}", stats.remaining());
    println!();
    println!("By type:");
    for (asset_type, count) in &stats.by_type {
        println!("  {asset_type:<18} {count}");
    }
    Ok(())
}

pub fn prune(path: &Path, ids: &[String], keep_text_assets: bool, output: Option<&Path>) -> anyhow::Result<()> {
    let mut inventory = Inventory::load(path)?;
    let mut removed = inventory.prune(ids);
    if keep_text_assets {
        removed += inventory.keep_text_assets();
    }
    inventory.save(output.unwrap_or(path))?;
    println!("Removed {removed} records, {} remain", inventory.texts.len());
    Ok(())
}

pub fn mark(path: &Path, ids: &[String], original: bool) -> anyhow::Result<()> {
    let mut inventory = Inventory::load(path)?;
    let changed = if original {
        inventory.mark_original(ids)
    } else {
        inventory.mark_translated(ids)
    };
    inventory.save(path)?;
    println!(
        "{changed} records marked {}",
        if original { "original" } else { "translated" }
    );
    Ok(())
}

pub fn import(path: &Path, from: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let mut inventory = Inventory::load(path)?;
    let incoming = load_import(from)?;
    let updated = inventory.import_translations(&incoming);
    inventory.save(output.unwrap_or(path))?;
    println!("Imported {updated} translations from {}", from.display());
    Ok(())
}
