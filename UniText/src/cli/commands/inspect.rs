//! CLI commands for looking inside files

use std::fs;
use std::path::Path;

use crate::diagnostics;
use crate::relevance::is_valid_text_candidate;
use crate::sweep::{analyze_structure, sweep as sweep_strings};

pub fn diagnose(file: &Path, sample: usize) -> anyhow::Result<()> {
    let objects = diagnostics::diagnose(file, sample)?;
    println!("{}: showing {} objects", file.display(), objects.len());
    for object in objects {
        println!("{object}");
    }
    Ok(())
}

pub fn sweep(file: &Path, relevant: bool, analyze: bool) -> anyhow::Result<()> {
    let data = fs::read(file)?;

    if analyze {
        let analysis = analyze_structure(&data);
        println!("Size: {} bytes", analysis.size);
        println!(
            "Signature: {}",
            analysis.signature.map_or("unknown", |s| s.as_str())
        );
        println!(
            "Entropy: {:.2} bits/byte{}",
            analysis.entropy,
            if analysis.likely_encrypted { " (likely encrypted)" } else { "" }
        );
        match &analysis.decompressed {
            Some(hit) => println!(
                "Decompressed: {} bytes via {} at offset {}",
                hit.data.len(),
                hit.method.label(),
                hit.skip
            ),
            None => println!("Decompressed: no strategy succeeded"),
        }
        println!();
    }

    let strings = sweep_strings(&data);
    let mut shown = 0;
    for text in &strings {
        if relevant && !is_valid_text_candidate(text) {
            continue;
        }
        println!("{text}");
        shown += 1;
    }
    println!("\n{shown} of {} strings", strings.len());
    Ok(())
}
