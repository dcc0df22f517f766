use crate::loader::{Batch, Record};
use crate::output;
use crate::store::{MetaStore, WriteSignal};

/// Run-wide tallies, incremented monotonically and read once at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub rows_processed: u64,
    pub rows_failed: u64,
    pub meta_processed: u64,
    pub meta_updated: u64,
    pub meta_failed: u64,
    pub meta_skipped: u64,
    pub meta_unchanged: u64,
}

impl RunCounters {
    pub fn summary(&self, dry_run: bool) -> String {
        if dry_run {
            format!(
                "Rows processed: {}. Meta processed: {}.",
                self.rows_processed, self.meta_processed
            )
        } else {
            format!(
                "Rows processed: {}. Rows failed: {}. Meta processed: {}. Meta updated: {}. Meta skipped: {}. Meta unchanged: {}. Meta failed {}.",
                self.rows_processed,
                self.rows_failed,
                self.meta_processed,
                self.meta_updated,
                self.meta_skipped,
                self.meta_unchanged,
                self.meta_failed,
            )
        }
    }
}

/// Process every record in order. Row and field failures are reported
/// inline and tallied; nothing short of the end of the batch stops the run.
pub fn run_batch<S: MetaStore>(batch: &Batch, store: &mut S, dry_run: bool) -> RunCounters {
    let mut counters = RunCounters::default();

    for (index, record) in batch.records().iter().enumerate() {
        counters.rows_processed += 1;

        let url = record.url().unwrap_or("");
        if record.is_empty() || url.trim().is_empty() {
            counters.rows_failed += 1;
            output::error(&format!(
                "Record or URL is empty for item with the index: {index}"
            ));
            continue;
        }

        let post_id = match store.resolve_url(url) {
            Ok(Some(post_id)) => post_id,
            Ok(None) => {
                counters.rows_failed += 1;
                output::error(&format!(
                    "Could not find post ID for {url}; the URL either doesn't exist or is not a post."
                ));
                continue;
            }
            Err(error) => {
                counters.rows_failed += 1;
                output::error(&format!("Could not resolve {url}: {error:#}"));
                continue;
            }
        };

        output::log(&format!("Post #{post_id} - {url}"));
        update_post(store, post_id, record, url, dry_run, &mut counters);
    }

    counters
}

fn update_post<S: MetaStore>(
    store: &mut S,
    post_id: u64,
    record: &Record,
    url: &str,
    dry_run: bool,
    counters: &mut RunCounters,
) {
    for (raw_key, raw_value) in record.meta_fields() {
        counters.meta_processed += 1;
        let key = raw_key.trim();
        let new_value = raw_value.trim();

        let current_value = match store.get_meta(post_id, key) {
            Ok(value) => value,
            Err(error) => {
                output::error(&format!(
                    "Failed to read current value for '{key}' on {url}: {error:#}"
                ));
                if !dry_run {
                    counters.meta_failed += 1;
                }
                continue;
            }
        };

        if dry_run {
            if new_value.is_empty() {
                continue;
            }
            output::diff_header(key, "Before:");
            output::log(&current_value);
            output::diff_header(key, "After:");
            output::log(new_value);
            continue;
        }

        if new_value.is_empty() {
            output::warning(&format!("The value for field '{key}' on '{url}' is empty"));
            counters.meta_skipped += 1;
            continue;
        }

        match store.set_meta(post_id, key, new_value) {
            Ok(WriteSignal::Written) => {
                counters.meta_updated += 1;
                output::success(&format!("Updated '{key}' field on {url}."));
            }
            // The store reports NotWritten both for failed writes and for
            // no-op writes; only the current value tells them apart.
            Ok(WriteSignal::NotWritten) => {
                if current_value == new_value {
                    counters.meta_unchanged += 1;
                    output::success(&format!(
                        "Value passed for field '{key}' is unchanged on {url}."
                    ));
                } else {
                    counters.meta_failed += 1;
                    output::error(&format!("Failed to update value for '{key}' on {url}."));
                }
            }
            Err(error) => {
                counters.meta_failed += 1;
                output::error(&format!(
                    "Failed to update value for '{key}' on {url}: {error:#}"
                ));
            }
        }
    }
}
