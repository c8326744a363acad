use std::path::PathBuf;
use std::time::Instant;

use refclip_rs::{PipelineConfig, ReferenceClipExtractor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (input, output_dir) = match (args.next(), args.next()) {
        (Some(input), Some(output)) => (PathBuf::from(input), PathBuf::from(output)),
        _ => {
            eprintln!("usage: extract_refs <input.wav> <output_dir> [clip_count]");
            std::process::exit(2);
        }
    };

    let mut config = PipelineConfig::default();
    if let Some(count) = args.next() {
        config.selection.clip_count = count.parse()?;
    }

    let extractor = ReferenceClipExtractor::new(config)?;

    let start = Instant::now();
    let report = extractor.extract_to_dir(&input, &output_dir)?;
    println!(
        "Analyzed {:.1}s of audio in {:.2?}: {} candidates, {} eligible",
        report.source_duration_secs,
        start.elapsed(),
        report.candidates,
        report.eligible
    );

    for clip in &report.clips {
        println!(
            "  #{} {:>6.1}s-{:<6.1}s Q={:>5.1}  {}",
            clip.rank,
            clip.start_secs,
            clip.end_secs,
            clip.composite * 100.0,
            clip.file_name
        );
    }
    if report.undersupplied {
        println!(
            "Only {} of {} requested clips met the quality floors",
            report.selected, report.requested
        );
    }
    println!("Saved to {}", output_dir.display());

    Ok(())
}
