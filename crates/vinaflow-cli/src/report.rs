//! Terminal output: a progress bar fed by pipeline events and the end-of-run summary.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use vinaflow_molecules::{PipelineProgress, RunReport};

/// Drive a progress bar until the sender side of `rx` is dropped.
pub fn spawn_progress(mut rx: broadcast::Receiver<PipelineProgress>, pairs: usize) -> JoinHandle<()> {
    let bar = ProgressBar::new(pairs as u64);
    if let Ok(s) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}") {
        bar.set_style(s);
    }

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.stage.as_str() {
                    "dock" => {
                        bar.set_position(event.completed as u64);
                        if event.failed {
                            bar.println(format!("{} {}", style("✗").red(), event.message));
                        }
                        bar.set_message(event.message);
                    }
                    _ => {
                        if event.failed {
                            bar.println(format!("{} {}", style("✗").red(), event.message));
                        }
                        bar.set_message(format!("[{}/{}] {}", event.completed, event.total, event.message));
                    }
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        bar.finish_and_clear();
    })
}

/// Wait for the progress task. Returns false (after logging) if it panicked or was cancelled.
pub async fn finish_progress(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Progress display stopped early: {}", e);
            false
        }
    }
}

pub fn print_summary(report: &RunReport) {
    let s = &report.summary;

    println!();
    println!("{}", style("Docking run complete").bold());
    println!("  run id        {}", s.run_id);
    println!("  pairs         {}", s.total_pairs);
    println!("  docked        {}", style(s.docked).green());
    if s.failed > 0 {
        println!("  failed        {}", style(s.failed).red());
    } else {
        println!("  failed        0");
    }
    println!("  downloaded    {}", s.structures_downloaded);
    println!("  converted     {}", s.structures_converted);
    if s.duplicates_dropped > 0 {
        println!("  duplicates    {} (dropped)", s.duplicates_dropped);
    }

    if let Some(ref best) = s.best {
        println!(
            "  best          {} vs {}: {} kcal/mol",
            best.ligand,
            best.receptor,
            style(format!("{:.2}", best.affinity)).cyan()
        );
    }

    if !s.rejected_rows.is_empty() {
        println!();
        println!("{}", style("Rejected rows").yellow().bold());
        for row in &s.rejected_rows {
            println!("  line {:<4} {},{}  {}", row.line, row.receptor, row.ligand, row.reason);
        }
    }

    if !s.failures.is_empty() {
        println!();
        println!("{}", style("Failures").red().bold());
        println!("  {:<12} {:<20} {:<10} {}", "receptor", "ligand", "stage", "error");
        for f in &s.failures {
            println!("  {:<12} {:<20} {:<10} {}", f.receptor, f.ligand, f.stage.to_string(), f.message);
        }
    }

    println!();
    println!("Results written to {}", style(s.results_csv.display()).underlined());
}
