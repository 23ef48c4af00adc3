// This file is part of the terraform-provider-appservice project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

lazy_static! {
    /// One mutex per name, never evicted: the set of names is bounded by the
    /// resources of a single Terraform run, so the map only grows.
    static ref LOCKS: Mutex<HashMap<String, Arc<AsyncMutex<()>>>> = Mutex::new(HashMap::new());
}

/// Acquire the process-wide lock registered under `name`.
///
/// The lock is released when the guard is dropped.
pub async fn lock_by_name(name: &str) -> OwnedMutexGuard<()> {
    let mutex = {
        let mut locks = match LOCKS.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(name.to_owned())
            .or_insert_with(Default::default)
            .clone()
    };
    tracing::trace!(name, "acquiring lock");
    mutex.lock_owned().await
}

/// Acquire the lock of a resource by its ID
pub async fn lock_by_id(id: &impl Display) -> OwnedMutexGuard<()> {
    lock_by_name(&id.to_string()).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_name_is_exclusive() {
        let guard = lock_by_name("locks-test-exclusive").await;

        let waiter = tokio::spawn(async {
            let _guard = lock_by_name("locks-test-exclusive").await;
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn entries_outlive_their_guards() {
        drop(lock_by_name("locks-test-kept").await);
        let first = LOCKS.lock().unwrap().get("locks-test-kept").cloned().unwrap();
        drop(lock_by_name("locks-test-kept").await);
        let second = LOCKS.lock().unwrap().get("locks-test-kept").cloned().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn different_names_do_not_block() {
        let _first = lock_by_name("locks-test-a").await;
        let _second = tokio::time::timeout(Duration::from_secs(1), lock_by_name("locks-test-b"))
            .await
            .expect("independent locks should not block each other");
    }
}
