//! Classify errors in a log

use crate::cli::app::ClassifyArgs;
use crate::cli::read_input;
use anyhow::Result;
use autofix_core::errors::{detect, fix_priority};

pub async fn execute(args: ClassifyArgs) -> Result<()> {
    let text = read_input(args.file.as_deref()).await?;
    let detection = detect(&text);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&detection.errors)?);
        return Ok(());
    }

    if detection.errors.is_empty() {
        if detection.classification_miss {
            println!("Output mentions errors but none matched a known format.");
        } else {
            println!("No errors found.");
        }
        return Ok(());
    }

    println!("{} error(s):", detection.errors.len());
    for error in &detection.errors {
        println!(
            "  [{}] p{} {} {}",
            error.severity,
            fix_priority(error),
            error,
            error.framework.as_deref().map(|f| format!("<{}>", f)).unwrap_or_default()
        );
        if let Some(suggestion) = &error.suggestion {
            println!("      hint: {}", suggestion);
        }
    }
    Ok(())
}
