//! # Pushdown Warnings
//!
//! Task-local collection of non-fatal pushdown notes, such as a filter clause
//! that was dropped because the backend cannot evaluate it.

use std::future::Future;
use std::sync::{Arc, Mutex};

tokio::task_local! {
    pub static PUSHDOWN_WARNINGS: Arc<Mutex<Vec<String>>>;
}

/// Adds a warning to the current task's list, if one is active.
pub fn add_warning(warning: String) {
    if let Ok(warnings) = PUSHDOWN_WARNINGS.try_with(|w: &Arc<Mutex<Vec<String>>>| w.clone()) {
        if let Ok(mut lock) = warnings.lock() {
            lock.push(warning);
        }
    }
}

/// Runs `fut` with a fresh warning list and returns what it collected.
pub async fn collect_warnings<F: Future>(fut: F) -> (F::Output, Vec<String>) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let output = PUSHDOWN_WARNINGS.scope(sink.clone(), fut).await;
    let warnings = sink.lock().map(|w| w.clone()).unwrap_or_default();
    (output, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_warnings() {
        let (value, warnings) = collect_warnings(async {
            add_warning("dropped clause".to_string());
            7
        })
        .await;
        assert_eq!(value, 7);
        assert_eq!(warnings, vec!["dropped clause".to_string()]);
    }

    #[test]
    fn test_add_warning_outside_scope_is_ignored() {
        add_warning("nobody listens".to_string());
    }
}
