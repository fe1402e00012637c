//! CLI command for scanning a game directory

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use crate::cli::progress::{bar_callback, percent_bar, print_done, print_step, DISK, LOOKING_GLASS};
use crate::scanner::{ScanOptions, Scanner};

pub fn execute(game_path: &Path, output: &Path, options: ScanOptions, quiet: bool) -> anyhow::Result<()> {
    let started = Instant::now();
    let scanner = Scanner::new(game_path, options);

    print_step(1, 2, LOOKING_GLASS, &format!("Scanning {}...", game_path.display()));
    let pb = percent_bar(quiet);
    let mut inventory = scanner.scan(&bar_callback(&pb), &AtomicBool::new(false))?;
    pb.finish_and_clear();

    print_step(2, 2, DISK, &format!("Writing {}...", output.display()));
    inventory.save(output)?;

    let stats = inventory.stats();
    println!("Found {} texts", stats.total);
    for (asset_type, count) in &stats.by_type {
        println!("  {asset_type:<18} {count}");
    }
    print_done(started.elapsed());
    Ok(())
}
