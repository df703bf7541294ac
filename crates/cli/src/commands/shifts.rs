//! `ct-cli shifts` - bulk shift plan round trip.
//!
//! Plan file format:
//!
//! ```yaml
//! shifts:
//!   - date: 2026-03-02
//!     shift_type: morning
//!     role: barista
//!     start: "07:00:00"
//!     end: "15:00:00"
//!     staff_name: Sam
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use countertop_client::{ClientConfig, HttpClient, ShiftPlanner};
use countertop_core::{Shift, ShiftDraft};
use serde::Deserialize;
use tracing::info;

use super::CommandError;

#[derive(Debug, Deserialize)]
struct ShiftPlanFile {
    shifts: Vec<ShiftDraft>,
}

/// Merge the plan in `file_path` into the stored range and save it.
///
/// Drafts matching an already stored shift collapse onto it.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or if the load, save
/// or re-fetch fails.
pub async fn sync(
    config: &ClientConfig,
    file_path: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(CommandError::FileNotFound(file_path.to_string()).into());
    }

    info!(path = %file_path, "Loading shift plan from file");

    // Read and parse YAML before touching the store
    let content = tokio::fs::read_to_string(path).await?;
    let plan: ShiftPlanFile = serde_yaml::from_str(&content)?;
    info!(drafts = plan.shifts.len(), "Parsed shift plan");

    let client = Arc::new(HttpClient::new(config)?);
    let mut planner = ShiftPlanner::new(client, from, to);

    let existing = planner.load().await?.len();
    info!(existing, "Loaded stored shifts");

    for draft in plan.shifts {
        planner.add(draft);
    }

    let saved = planner.save().await?;
    info!(count = saved.len(), "Shift plan saved");
    print_shifts(saved);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_shifts(shifts: &[Shift]) {
    println!("{:<8} {:<10} {:<10} {:<12} {:<11} STAFF", "ID", "DATE", "TYPE", "ROLE", "TIME");
    for shift in shifts {
        println!(
            "{:<8} {:<10} {:<10} {:<12} {}-{} {}",
            shift.id.to_string(),
            shift.date.to_string(),
            format!("{:?}", shift.shift_type).to_lowercase(),
            shift.role,
            shift.start.format("%H:%M"),
            shift.end.format("%H:%M"),
            shift.staff_name.as_deref().unwrap_or("")
        );
    }
}
