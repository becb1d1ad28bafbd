//! Search-as-you-type.
//!
//! Every keystroke from a browser bumps that browser's generation counter and
//! then waits out the debounce delay. Only a request whose generation is still
//! the newest afterwards goes on to query the database; the rest are dropped.

use actix_rt::time::delay_for;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const RESULT_LIMIT: i64 = 8;

pub struct SearchDebouncer {
    delay: Duration,
    generations: Mutex<HashMap<String, u64>>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> SearchDebouncer {
        SearchDebouncer {
            delay,
            generations: Mutex::new(HashMap::new()),
        }
    }

    fn generations(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait out the delay; `true` if no newer keystroke from `key` arrived.
    pub async fn settle(&self, key: &str) -> bool {
        let generation = {
            let mut generations = self.generations();
            let counter = generations.entry(key.to_owned()).or_insert(0);
            *counter += 1;
            *counter
        };

        delay_for(self.delay).await;

        let mut generations = self.generations();
        match generations.get(key) {
            Some(latest) if *latest == generation => {
                generations.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// The text worth searching for, if any.
pub fn normalize(query: &str) -> Option<String> {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
