//! `docent stats`: corpus size and per-source breakdown.

use crate::service::{IndexStats, RagService};

pub fn run_stats(service: &RagService) {
    print_stats(&service.stats());
}

fn print_stats(stats: &IndexStats) {
    println!("Docent: Index Stats");
    println!("===================");
    println!();
    println!("  Index:       {}", stats.index_dir);
    println!("  Model:       {}", stats.model);
    println!("  Dimensions:  {}", stats.dims);
    println!("  Chunks:      {}", stats.chunks);
    println!("  Sources:     {}", stats.sources.len());

    if !stats.sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<48} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(57));
        for s in &stats.sources {
            println!("  {:<48} {:>8}", s.source, s.chunks);
        }
    }

    println!();
}
