//! Suspending and restoring the search index around bulk writes.
//!
//! While detached, writes skip per-row index maintenance and the index goes
//! stale. Re-attaching does not replay those writes: they reach the index on
//! an explicit [`IndexManager::rebuild`] or the next time the row changes.

use std::future::Future;

use qamus_core::store::{IndexState, LexiconStore};

use crate::{Error, Result, config::RetryPolicy, retry::retry_busy};

#[derive(Debug, Clone)]
pub struct IndexManager {
  retry: RetryPolicy,
}

impl IndexManager {
  pub fn new(retry: RetryPolicy) -> Self { Self { retry } }

  /// Re-attach triggers left detached by a process that died mid-page.
  /// Returns the state that was found.
  pub async fn recover<S: LexiconStore>(&self, store: &S) -> Result<IndexState> {
    let (found, _) = retry_busy(&self.retry, "read index state", move || store.index_state()).await;
    let found = found.map_err(Error::index)?;

    if found != IndexState::Attached {
      tracing::warn!(state = ?found, "search index was not attached; re-attaching");
      self.attach(store).await?;
    }
    Ok(found)
  }

  /// Drop the triggers. Returns `false` if that failed; writes then go
  /// through the live index instead.
  pub async fn detach<S: LexiconStore>(&self, store: &S) -> bool {
    let (result, _) = retry_busy(&self.retry, "detach index", move || store.detach_index()).await;
    match result {
      Ok(()) => true,
      Err(err) => {
        tracing::warn!(error = %err, "could not detach search index; writing with triggers attached");
        false
      }
    }
  }

  /// Recreate the triggers. Failure is fatal for the run.
  pub async fn attach<S: LexiconStore>(&self, store: &S) -> Result<()> {
    let (result, _) = retry_busy(&self.retry, "attach index", move || store.attach_index()).await;
    result.map_err(|err| {
      tracing::error!(error = %err, "failed to re-attach search index");
      Error::index(err)
    })
  }

  pub async fn rebuild<S: LexiconStore>(&self, store: &S) -> Result<()> {
    let (result, _) = retry_busy(&self.retry, "rebuild index", move || store.rebuild_index()).await;
    result.map_err(Error::store)?;
    tracing::info!("search index rebuilt");
    Ok(())
  }

  /// Run `body` with the index detached, then re-attach it whatever `body`
  /// produced. `body` reports its own failures in `T`; only the re-attach
  /// can fail here.
  pub async fn scoped<S, T, F>(&self, store: &S, body: F) -> Result<T>
  where
    S: LexiconStore,
    F: Future<Output = T>,
  {
    self.detach(store).await;
    let output = body.await;
    self.attach(store).await?;
    Ok(output)
  }
}
