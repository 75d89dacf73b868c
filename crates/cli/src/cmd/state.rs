//! Implementation of the `upcheck state` commands.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use super::{load_config, open_state_store};
use crate::output::{
  OutputFormat, format_dimensions, format_time, print_info, print_json, print_stat, print_success, symbols, truncate_hash,
};

pub fn cmd_state_list(state_dir: Option<&Path>, output: OutputFormat) -> Result<()> {
  let config = load_config(None)?;
  let store = open_state_store(&config, state_dir);
  let records = store.records().context("Failed to read check state")?;

  if output.is_json() {
    return print_json(&records);
  }

  if records.is_empty() {
    print_info("No check state recorded.");
    return Ok(());
  }

  for record in &records {
    println!(
      "{} {} [{}]",
      symbols::ARROW,
      record.project_path.display(),
      format_dimensions(&record.dimensions)
    );
    print_stat("Last build", &format_time(record.last_successful_build_start.as_ref()));
    print_stat("Items changed", &format_time(record.items_changed_at.as_ref()));
    if let Some(hash) = &record.item_hash {
      print_stat("Item hash", truncate_hash(&hash.0));
    }
  }
  println!();
  print_stat("Records", &records.len().to_string());
  print_stat("Location", &store.base_path().display().to_string());
  Ok(())
}

pub fn cmd_state_prune(state_dir: Option<&Path>, older_than: Duration) -> Result<()> {
  let config = load_config(None)?;
  let store = open_state_store(&config, state_dir);
  let age = chrono::Duration::from_std(older_than).context("Duration is too large")?;

  let removed = store
    .remove_older_than(Utc::now() - age)
    .context("Failed to read check state")?;
  store.flush().context("Failed to save check state")?;

  print_success(&format!("Pruned {removed} records"));
  Ok(())
}

pub fn cmd_state_clear(state_dir: Option<&Path>) -> Result<()> {
  let config = load_config(None)?;
  let store = open_state_store(&config, state_dir);

  let removed = store.clear().context("Failed to read check state")?;
  store.flush().context("Failed to save check state")?;

  print_success(&format!("Cleared {removed} records"));
  Ok(())
}
