//! Shared helpers for core tests.

#![allow(dead_code)]

use satchel_core::{Account, Satchel};
use satchel_remote::MemoryGateway;
use std::sync::Arc;

pub fn test_account() -> Account {
    Account::generate("alice", "https://api.satchel.test")
}

/// A first device: fresh account, fresh store, root staged for push.
pub fn first_device(gateway: Arc<MemoryGateway>) -> (Satchel, Account) {
    let account = test_account();
    let copy = Account::import(&account.export().unwrap()).unwrap();
    let satchel = Satchel::create_in_memory(account, gateway).unwrap();
    (satchel, copy)
}

/// Another device holding the same account, attached via export/import.
pub fn another_device(account: &Account, gateway: Arc<MemoryGateway>) -> Satchel {
    let imported = Account::import(&account.export().unwrap()).unwrap();
    Satchel::restore_in_memory(imported, gateway).unwrap()
}
