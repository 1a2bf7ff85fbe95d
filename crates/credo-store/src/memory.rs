//! In-memory stores. Each store holds its map behind a
//! `std::sync::RwLock`; critical sections are short and never held
//! across an await point.

mod audit;
mod blocklist;
mod session;
mod user;

pub use audit::{MemoryAuditEventRepository, MemoryLoginAttemptRepository};
pub use blocklist::MemoryBlocklist;
pub use session::MemorySessionRepository;
pub use user::MemoryUserRepository;

use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use credo_core::error::{CoreError, CoreResult};

pub(crate) fn read_guard<T>(
    lock: &std::sync::RwLock<T>,
) -> CoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| CoreError::Storage("store lock poisoned".into()))
}

pub(crate) fn write_guard<T>(
    lock: &std::sync::RwLock<T>,
) -> CoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| CoreError::Storage("store lock poisoned".into()))
}

pub(crate) fn paginate<T: Clone>(
    items: &[T],
    pagination: &credo_core::repository::Pagination,
) -> credo_core::repository::PaginatedResult<T> {
    let total = items.len() as u64;
    let page = items
        .iter()
        .skip(pagination.offset as usize)
        .take(pagination.limit as usize)
        .cloned()
        .collect();
    credo_core::repository::PaginatedResult {
        items: page,
        total,
        offset: pagination.offset,
        limit: pagination.limit,
    }
}
