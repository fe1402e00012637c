use clap::Subcommand;
use std::path::PathBuf;

use crate::config::ToolConfig;

pub mod inject;
pub mod inspect;
pub mod inventory;
pub mod scan;

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a game directory and write a text inventory
    Scan {
        /// Game directory
        game_path: PathBuf,

        /// Inventory file to write
        #[arg(short, long, default_value = "inventory.json")]
        output: PathBuf,

        /// Looser text test for MonoBehaviour fields, structure analysis for every unreadable container
        #[arg(long)]
        deep: bool,

        /// Skip TextAsset objects
        #[arg(long)]
        no_textassets: bool,

        /// Skip MonoBehaviour objects
        #[arg(long)]
        no_monobehaviours: bool,

        /// Skip plain .json/.xml/.txt files
        #[arg(long)]
        no_textfiles: bool,

        /// Deepest MonoBehaviour nesting level searched
        #[arg(long)]
        max_depth: Option<usize>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write translated records back into the game files
    Inject {
        /// Inventory file
        inventory: PathBuf,

        /// Game directory (defaults to the inventory's game_path)
        #[arg(short, long)]
        game_path: Option<PathBuf>,

        /// Root of the backup directories
        #[arg(short, long)]
        backup_dir: Option<PathBuf>,

        /// Only report which records would be written
        #[arg(long)]
        dry_run: bool,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Copy a backup back into the game directory
    Restore {
        /// Game directory
        game_path: PathBuf,

        /// Backup to restore (defaults to the most recent one)
        #[arg(long)]
        backup: Option<PathBuf>,

        /// Root of the backup directories
        #[arg(short, long)]
        backup_dir: Option<PathBuf>,
    },

    /// List backup directories
    Backups {
        /// Root of the backup directories
        #[arg(short, long)]
        backup_dir: Option<PathBuf>,
    },

    /// Show the first objects of a container with their field types
    Inspect {
        /// Container file
        file: PathBuf,

        /// Number of objects to show
        #[arg(short, long, default_value = "10")]
        sample: usize,
    },

    /// Dump the strings recoverable from any file without parsing it
    Sweep {
        /// Input file
        file: PathBuf,

        /// Only show strings that look like game text
        #[arg(long)]
        relevant: bool,

        /// Also print signature, entropy and decompression results
        #[arg(long)]
        analyze: bool,
    },

    /// Inventory statistics
    Stats {
        /// Inventory file
        inventory: PathBuf,
    },

    /// Remove records from an inventory
    Prune {
        /// Inventory file
        inventory: PathBuf,

        /// Record ids to remove
        ids: Vec<String>,

        /// Remove everything that is not a TextAsset
        #[arg(long)]
        keep_text_assets: bool,

        /// Write the result here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Flag records as translated, or back to original with --original
    Mark {
        /// Inventory file
        inventory: PathBuf,

        /// Record ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Flag as untranslated instead
        #[arg(long)]
        original: bool,
    },

    /// Merge translations from another inventory file by record id
    Import {
        /// Inventory file to update
        inventory: PathBuf,

        /// Inventory holding the translations
        from: PathBuf,

        /// Write the result here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the effective configuration to a TOML file
    InitConfig {
        /// Output file
        #[arg(default_value = "unitext.toml")]
        output: PathBuf,
    },
}

impl Commands {
    pub fn execute(&self, config: &ToolConfig) -> anyhow::Result<()> {
        match self {
            Commands::Scan {
                game_path,
                output,
                deep,
                no_textassets,
                no_monobehaviours,
                no_textfiles,
                max_depth,
                quiet,
            } => {
                let mut options = config.scan.clone();
                options.deep_scan |= *deep;
                options.textassets &= !*no_textassets;
                options.monobehaviours &= !*no_monobehaviours;
                options.textfiles &= !*no_textfiles;
                if let Some(depth) = max_depth {
                    options.max_depth = *depth;
                }
                scan::execute(game_path, output, options, *quiet)
            }
            Commands::Inject {
                inventory,
                game_path,
                backup_dir,
                dry_run,
                quiet,
            } => inject::execute(
                inventory,
                game_path.as_deref(),
                backup_dir.as_deref().unwrap_or(&config.backup_dir),
                &config.inject,
                *dry_run,
                *quiet,
            ),
            Commands::Restore {
                game_path,
                backup,
                backup_dir,
            } => inject::restore(
                game_path,
                backup.as_deref(),
                backup_dir.as_deref().unwrap_or(&config.backup_dir),
            ),
            Commands::Backups { backup_dir } => {
                inject::list(backup_dir.as_deref().unwrap_or(&config.backup_dir))
            }
            Commands::Inspect { file, sample } => inspect::diagnose(file, *sample),
            Commands::Sweep {
                file,
                relevant,
                analyze,
            } => inspect::sweep(file, *relevant, *analyze),
            Commands::Stats { inventory } => inventory::stats(inventory),
            Commands::Prune {
                inventory,
                ids,
                keep_text_assets,
                output,
            } => inventory::prune(inventory, ids, *keep_text_assets, output.as_deref()),
            Commands::Mark {
                inventory,
                ids,
                original,
            } => inventory::mark(inventory, ids, *original),
            Commands::Import {
                inventory,
                from,
                output,
            } => inventory::import(inventory, from, output.as_deref()),
            Commands::InitConfig { output } => {
                config.save(output)?;
                println!("Configuration written to {}", output.display());
                Ok(())
            }
        }
    }
}
