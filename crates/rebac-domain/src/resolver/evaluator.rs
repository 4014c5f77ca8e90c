//! Building blocks shared by check and expand: tuple reads and set operators.

use std::collections::HashSet;

use futures::future::{self, BoxFuture, Either};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::error::DomainResult;
use crate::model::{Object, User};

use super::context::ResolutionContext;
use super::traits::TupleReader;

/// Tuple access for one call: contextual tuples overlaid on the store.
pub(crate) struct Evaluator<'a, T: ?Sized> {
    reader: &'a T,
    max_concurrency: usize,
}

impl<'a, T: TupleReader + ?Sized> Evaluator<'a, T> {
    pub(crate) fn new(reader: &'a T, max_concurrency: usize) -> Self {
        Self {
            reader,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Users directly related to `object` by `relation`, contextual tuples first.
    pub(crate) async fn read_users(
        &self,
        ctx: &ResolutionContext,
        object: &Object,
        relation: &str,
    ) -> DomainResult<Vec<User>> {
        ctx.ensure_active()?;
        let contextual = ctx.contextual_tuples().users(object, relation);

        ctx.record_query();
        let stored = self
            .reader
            .read_tuples(
                ctx.store_id(),
                &object.object_type,
                &object.object_id,
                relation,
            )
            .await
            .map_err(|e| {
                warn!(%object, relation, error = %e, "tuple read failed");
                e
            })?;

        Ok(merge_users(contextual, stored.iter().map(|t| t.to_user())))
    }

    /// Objects that `object` points to through its `tupleset` relation.
    ///
    /// Usersets and wildcards in a tupleset carry no parent object and are skipped.
    pub(crate) async fn read_parents(
        &self,
        ctx: &ResolutionContext,
        object: &Object,
        tupleset: &str,
    ) -> DomainResult<Vec<Object>> {
        ctx.ensure_active()?;
        let contextual = ctx.contextual_tuples().users(object, tupleset);

        ctx.record_query();
        let stored = self
            .reader
            .read_tupleset(
                ctx.store_id(),
                &object.object_type,
                &object.object_id,
                tupleset,
            )
            .await
            .map_err(|e| {
                warn!(%object, tupleset, error = %e, "tupleset read failed");
                e
            })?;

        let parents = merge_users(contextual, stored.iter().map(|t| t.to_user()))
            .into_iter()
            .filter_map(|user| match user {
                User::Object(parent) => Some(parent),
                other => {
                    debug!(%object, tupleset, user = %other, "skipping non-object tupleset user");
                    None
                }
            })
            .collect();
        Ok(parents)
    }

    /// Union: true as soon as any branch is true.
    ///
    /// An error only surfaces when no branch is true. Remaining branches are
    /// dropped, and so cancelled, once the answer is known.
    pub(crate) async fn any(&self, branches: Vec<BoxFuture<'_, DomainResult<bool>>>) -> DomainResult<bool> {
        let mut results = stream::iter(branches).buffer_unordered(self.max_concurrency);
        let mut first_error = None;
        while let Some(result) = results.next().await {
            match result {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    /// Intersection: false as soon as any branch is false.
    ///
    /// An empty intersection grants nothing.
    pub(crate) async fn all(&self, branches: Vec<BoxFuture<'_, DomainResult<bool>>>) -> DomainResult<bool> {
        if branches.is_empty() {
            return Ok(false);
        }
        let mut results = stream::iter(branches).buffer_unordered(self.max_concurrency);
        let mut first_error = None;
        while let Some(result) = results.next().await {
            match result {
                Ok(false) => return Ok(false),
                Ok(true) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Difference: `base` and not `subtract`, both evaluated concurrently.
    ///
    /// A false base or a true subtract decides the result even if the other
    /// side fails.
    pub(crate) async fn but_not(
        &self,
        base: BoxFuture<'_, DomainResult<bool>>,
        subtract: BoxFuture<'_, DomainResult<bool>>,
    ) -> DomainResult<bool> {
        match future::select(base, subtract).await {
            Either::Left((base_result, subtract)) => match base_result {
                Ok(false) => Ok(false),
                Ok(true) => subtract.await.map(|excluded| !excluded),
                Err(e) => match subtract.await {
                    Ok(true) => Ok(false),
                    _ => Err(e),
                },
            },
            Either::Right((subtract_result, base)) => match subtract_result {
                Ok(true) => Ok(false),
                Ok(false) => base.await,
                Err(e) => match base.await {
                    Ok(false) => Ok(false),
                    _ => Err(e),
                },
            },
        }
    }

    /// Runs `branches` with bounded concurrency, keeping their order.
    pub(crate) async fn collect<O>(
        &self,
        branches: Vec<BoxFuture<'_, DomainResult<O>>>,
    ) -> DomainResult<Vec<O>> {
        stream::iter(branches)
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }
}

fn merge_users(contextual: &[User], stored: impl Iterator<Item = User>) -> Vec<User> {
    let mut seen: HashSet<User> = contextual.iter().cloned().collect();
    let mut users = contextual.to_vec();
    for user in stored {
        if seen.insert(user.clone()) {
            users.push(user);
        }
    }
    users
}
