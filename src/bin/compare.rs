/// Compare an indexed CameraSync file with a reference one (e.g. from the legacy tool).
/// Usage: compare <reference_T.dat> <test_T.dat>
///
/// Checks:
/// 1. Line count match
/// 2. Every record (the line without its timestamp) matches
/// 3. Timestamps agree within 1 microsecond (truncation vs rounding)
use std::fs;
use std::path::Path;

const TOLERANCE_US: i64 = 1;
const MAX_LISTED: usize = 20;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: compare <reference_T.dat> <test_T.dat>");
        std::process::exit(1);
    }

    let ref_path = Path::new(&args[1]);
    let test_path = Path::new(&args[2]);

    eprintln!("Reference: {}", ref_path.display());
    eprintln!("Test:      {}", test_path.display());

    let ref_lines = read_indexed(ref_path)?;
    let test_lines = read_indexed(test_path)?;

    let mut record_mismatch = Vec::new();
    let mut time_mismatch = Vec::new();
    let mut matched = 0;

    for (i, (r, t)) in ref_lines.iter().zip(&test_lines).enumerate() {
        if r.record != t.record {
            record_mismatch.push(i + 1);
            continue;
        }
        match (r.timestamp, t.timestamp) {
            (Some(rt), Some(tt)) if (rt - tt).abs() <= TOLERANCE_US => matched += 1,
            (rt, tt) => time_mismatch.push((i + 1, rt, tt)),
        }
    }

    // Report
    println!("=== Comparison Results ===");
    println!("Reference lines: {}", ref_lines.len());
    println!("Test lines:      {}", test_lines.len());
    println!();
    println!("Matched: {}", matched);
    println!("Record mismatch: {}", record_mismatch.len());
    println!("Timestamp mismatch (>{}us): {}", TOLERANCE_US, time_mismatch.len());

    if !record_mismatch.is_empty() {
        println!("\n--- Record mismatches (line numbers) ---");
        for line in record_mismatch.iter().take(MAX_LISTED) {
            println!("  {}", line);
        }
    }

    if !time_mismatch.is_empty() {
        println!("\n--- Timestamp mismatches ---");
        for (line, rt, tt) in time_mismatch.iter().take(MAX_LISTED) {
            println!("  line {}: ref={:?} test={:?}", line, rt, tt);
        }
        if time_mismatch.len() > MAX_LISTED {
            println!("  ... and {} more", time_mismatch.len() - MAX_LISTED);
        }
    }

    let all_matched = ref_lines.len() == test_lines.len() && matched == ref_lines.len();
    if all_matched {
        println!("\nAll records matched!");
        Ok(())
    } else {
        std::process::exit(1);
    }
}

struct IndexedLine {
    record: String,
    timestamp: Option<i64>,
}

fn read_indexed(path: &Path) -> anyhow::Result<Vec<IndexedLine>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().map(split_timestamp).collect())
}

/// Split `<record>    <timestamp>` at the last whitespace run.
fn split_timestamp(line: &str) -> IndexedLine {
    let line = line.trim_end();
    match line.rfind(char::is_whitespace) {
        Some(pos) => IndexedLine {
            record: line[..pos].trim_end().to_string(),
            timestamp: line[pos..].trim().parse().ok(),
        },
        None => IndexedLine {
            record: line.to_string(),
            timestamp: None,
        },
    }
}
