// Copyright 2025 Mix Labs
// Licensed under the Apache License, Version 2.0

use log::{error, info, warn};
use mix_config::MixConfig;
use mix_core::{CommitTree, KeyRegistry, PoolStore, RocksDbStore};
use std::{env, sync::Arc};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let command = env::args().nth(1).unwrap_or_else(|| "status".to_string());
    if command == "sample-config" {
        print!("{}", MixConfig::generate_sample());
        return Ok(());
    }

    let config = MixConfig::global();
    info!("Mix pool store at {}", config.database.path);

    let db = RocksDbStore::open(&config.database.path)?;
    let persisted = db.leaf_count()?;
    let store: Arc<dyn PoolStore> = Arc::new(db);
    let tree = CommitTree::open(store.clone())?;
    let registry = KeyRegistry::open(store.clone())?;

    match command.as_str() {
        "status" => {}
        "recover" => {
            if tree.is_halted() {
                tree.recover()?;
            } else {
                info!("Commitment tree is consistent, nothing to recover");
            }
        }
        other => {
            warn!("Unknown command `{other}` (expected status, recover or sample-config)");
            return Ok(());
        }
    }

    info!("Leaves:       {} ({persisted} persisted)", tree.len());
    info!("Current root: {}", tree.current_root());
    if let Some(reason) = tree.halt_reason() {
        error!("Appends halted: {reason}");
    }

    let active = registry.active_keys();
    if active.is_empty() {
        warn!("No keys configured; every proof will be rejected");
    }
    for blob in active {
        info!(
            "Active key:   {} v{} ({})",
            blob.kind,
            blob.version,
            blob.short_fingerprint()
        );
    }

    info!(
        "Policy:       min fee {}, key grace {}, root window {:?}, max proofs {}",
        config.pool.min_transfer_fee,
        config.pool.key_grace_versions,
        config.pool.root_window,
        config.pool.max_proofs_per_operation
    );

    Ok(())
}
