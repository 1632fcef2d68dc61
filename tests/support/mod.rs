use std::collections::HashMap;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the previous values afterwards (also on panic) and serializes
/// access to process-global env vars so parallel tests cannot race each
/// other.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK poisoned");

    let mut snapshot: HashMap<String, Option<String>> = HashMap::new();
    for (key, _) in changes {
        snapshot
            .entry(key.to_string())
            .or_insert_with(|| std::env::var(key).ok());
    }

    struct Restore {
        snapshot: HashMap<String, Option<String>>,
    }

    impl Drop for Restore {
        fn drop(&mut self) {
            for (key, value) in self.snapshot.drain() {
                match value {
                    Some(val) => std::env::set_var(&key, val),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }

    let _restore = Restore { snapshot };

    for (key, value) in changes {
        match value {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }

    f()
}
