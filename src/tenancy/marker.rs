use std::cell::RefCell;
use std::future::Future;

use tracing::{debug, warn};

use super::tenant_id::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<TenantId>>;
}

/// Task-scoped holder of the active tenant.
///
/// A cell only exists inside `TenantMarker::scope` (or `sync_scope`); every unit of work
/// opens its own scope, so two concurrent tasks never see each other's value. Outside a
/// scope `get` returns `None` and `set` is ignored.
pub struct TenantMarker;

impl TenantMarker {
    /// Run `work` with a fresh, empty marker cell
    pub async fn scope<F: Future>(work: F) -> F::Output {
        CURRENT_TENANT.scope(RefCell::new(None), work).await
    }

    /// Blocking counterpart of `scope`, for `spawn_blocking` work
    pub fn sync_scope<R>(work: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(RefCell::new(None), work)
    }

    /// Whether the calling task runs inside a marker scope
    pub fn is_scoped() -> bool {
        CURRENT_TENANT.try_with(|_| ()).is_ok()
    }

    pub fn set(tenant: TenantId) {
        let to = tenant.to_string();
        match CURRENT_TENANT.try_with(|cell| cell.replace(Some(tenant))) {
            Ok(previous) => debug!(from = ?previous.as_ref().map(TenantId::as_str), to = %to, "tenant marker set"),
            Err(_) => warn!("tenant marker set to {} outside a tenant scope; ignored", to),
        }
    }

    pub fn get() -> Option<TenantId> {
        CURRENT_TENANT
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn clear() {
        if let Ok(Some(previous)) = CURRENT_TENANT.try_with(|cell| cell.borrow_mut().take()) {
            debug!(from = %previous, "tenant marker cleared");
        }
    }

    /// Remember the current value; the returned guard puts it back when dropped
    pub fn save() -> MarkerRestore {
        MarkerRestore {
            previous: Self::get(),
        }
    }

    /// Returned guard clears the marker when dropped
    pub fn clear_on_exit() -> ClearOnExit {
        ClearOnExit { _private: () }
    }
}

/// Restores a saved marker value on drop, including on panic or cancellation
#[must_use = "the marker is restored when this guard is dropped"]
pub struct MarkerRestore {
    previous: Option<TenantId>,
}

impl Drop for MarkerRestore {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(tenant) => TenantMarker::set(tenant),
            None => TenantMarker::clear(),
        }
    }
}

/// Clears the marker on drop, including on panic or cancellation
#[must_use = "the marker is cleared when this guard is dropped"]
pub struct ClearOnExit {
    _private: (),
}

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        TenantMarker::clear();
    }
}
