//! # UniText
//!
//! A pure-Rust library for pulling player-visible text out of Unity game
//! assets and writing translations back without corrupting the files.
//!
//! ## Supported Formats
//!
//! - **SerializedFile** - `.assets` files and bundle entries, metadata versions 9 to 22
//! - **UnityFS** - asset bundles with uncompressed, LZ4 and LZ4HC blocks
//! - **TextAsset / MonoBehaviour** - type-tree driven decoding and re-encoding
//! - **Loose text** - `.txt`, `.json`, `.xml`, `.csv` files
//!
//! ## Quick Start
//!
//! ### Scanning a Game
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use unitext::progress::no_progress;
//! use unitext::scanner::{ScanOptions, Scanner};
//!
//! let scanner = Scanner::new("MyGame_Data", ScanOptions::default());
//! let mut inventory = scanner.scan(&no_progress, &AtomicBool::new(false))?;
//! inventory.save("inventory.json")?;
//! # Ok::<(), unitext::Error>(())
//! ```
//!
//! ### Injecting Translations
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use unitext::inject::Injector;
//! use unitext::inventory::Inventory;
//! use unitext::progress::no_progress;
//!
//! let inventory = Inventory::load("inventory.json")?;
//! let injector = Injector::new(&inventory.game_path, "backups");
//! let report = injector.inject(&inventory, &no_progress, &AtomicBool::new(false))?;
//! println!("{}", report.summary());
//! # Ok::<(), unitext::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `unitext` command-line binary

pub mod compression;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod formats;
pub mod inject;
pub mod inventory;
pub mod progress;
pub mod relevance;
pub mod scanner;
pub mod sweep;
pub mod translate;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::formats::{
        Container, ContainerKind, FieldPath, FieldValue, ObjectRef, SerializedFileBuilder, TypeTree,
    };
    pub use crate::inventory::{AssetType, Inventory, TextRecord};
    pub use crate::scanner::{ScanOptions, Scanner};
    pub use crate::inject::{InjectOptions, InjectionReport, Injector, Verifier};
    pub use crate::translate::{batch_translate, TranslateOptions, TranslationCache, Translator};
    pub use crate::progress::{no_progress, ProgressCallback};
    pub use crate::config::ToolConfig;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
