//! Check: does a user hold a relation on an object?

use futures::future::BoxFuture;
use tracing::debug;

use crate::error::DomainResult;
use crate::model::{Object, Rewrite, User};

use super::context::ResolutionContext;
use super::evaluator::Evaluator;
use super::traits::TupleReader;

pub(crate) struct CheckResolver<'a, T: ?Sized> {
    evaluator: Evaluator<'a, T>,
}

impl<'a, T: TupleReader + ?Sized> CheckResolver<'a, T> {
    pub(crate) fn new(reader: &'a T, max_concurrency: usize) -> Self {
        Self {
            evaluator: Evaluator::new(reader, max_concurrency),
        }
    }

    /// Resolves `user` against `object#relation`.
    ///
    /// Reaching a node already on the active path contributes `false`.
    pub(crate) fn check<'s>(
        &'s self,
        ctx: ResolutionContext,
        object: Object,
        relation: String,
        user: &'s User,
    ) -> BoxFuture<'s, DomainResult<bool>> {
        Box::pin(async move {
            ctx.ensure_active()?;

            let Some(ctx) = ctx.enter(path_key(&object, &relation, user)) else {
                debug!(%object, relation, %user, "cycle detected, treating as not allowed");
                return Ok(false);
            };

            let model = ctx.model().clone();
            let rewrite = model.rewrite(&object.object_type, &relation)?;
            self.evaluate(ctx, &object, &relation, user, rewrite).await
        })
    }

    fn evaluate<'s>(
        &'s self,
        ctx: ResolutionContext,
        object: &'s Object,
        relation: &'s str,
        user: &'s User,
        rewrite: &'s Rewrite,
    ) -> BoxFuture<'s, DomainResult<bool>> {
        Box::pin(async move {
            match rewrite {
                Rewrite::This => self.check_direct(ctx, object, relation, user).await,

                Rewrite::ComputedUserset { relation: computed } => {
                    // A hop back onto the path is a non-match, even with no budget left.
                    if ctx.on_path(&path_key(object, computed, user)) {
                        debug!(%object, relation = %computed, %user, "cycle detected, treating as not allowed");
                        return Ok(false);
                    }
                    let child = ctx.descend()?;
                    self.check(child, object.clone(), computed.clone(), user)
                        .await
                }

                Rewrite::TupleToUserset {
                    tupleset,
                    computed_userset,
                } => {
                    let parents: Vec<Object> = self
                        .evaluator
                        .read_parents(&ctx, object, tupleset)
                        .await?
                        .into_iter()
                        // Parents of a type without the relation cannot contribute.
                        .filter(|parent| {
                            ctx.model()
                                .has_relation(&parent.object_type, computed_userset)
                        })
                        .filter(|parent| !ctx.on_path(&path_key(parent, computed_userset, user)))
                        .collect();
                    if parents.is_empty() {
                        return Ok(false);
                    }

                    let child = ctx.descend()?;
                    let branches = parents
                        .into_iter()
                        .map(|parent| {
                            self.check(child.clone(), parent, computed_userset.clone(), user)
                        })
                        .collect();
                    self.evaluator.any(branches).await
                }

                Rewrite::Union { children } => {
                    let child = ctx.descend()?;
                    let branches = children
                        .iter()
                        .map(|c| self.evaluate(child.clone(), object, relation, user, c))
                        .collect();
                    self.evaluator.any(branches).await
                }

                Rewrite::Intersection { children } => {
                    let child = ctx.descend()?;
                    let branches = children
                        .iter()
                        .map(|c| self.evaluate(child.clone(), object, relation, user, c))
                        .collect();
                    self.evaluator.all(branches).await
                }

                Rewrite::Difference { base, subtract } => {
                    let child = ctx.descend()?;
                    self.evaluator
                        .but_not(
                            self.evaluate(child.clone(), object, relation, user, base),
                            self.evaluate(child, object, relation, user, subtract),
                        )
                        .await
                }
            }
        })
    }

    /// Direct tuples: a matching user grants access, userset users recurse.
    async fn check_direct(
        &self,
        ctx: ResolutionContext,
        object: &Object,
        relation: &str,
        user: &User,
    ) -> DomainResult<bool> {
        let users = self.evaluator.read_users(&ctx, object, relation).await?;
        if users.iter().any(|stored| stored.grants(user)) {
            return Ok(true);
        }

        let usersets: Vec<(Object, String)> = users
            .into_iter()
            .filter_map(|stored| match stored {
                User::Userset { object, relation } => Some((object, relation)),
                _ => None,
            })
            // Stale tuples may name relations the model no longer has.
            .filter(|(object, relation)| ctx.model().has_relation(&object.object_type, relation))
            .filter(|(object, relation)| !ctx.on_path(&path_key(object, relation, user)))
            .collect();
        if usersets.is_empty() {
            return Ok(false);
        }

        let child = ctx.descend()?;
        let branches = usersets
            .into_iter()
            .map(|(object, relation)| self.check(child.clone(), object, relation, user))
            .collect();
        self.evaluator.any(branches).await
    }
}

/// Active-path key of a check sub-problem.
fn path_key(object: &Object, relation: &str, user: &User) -> String {
    format!("{object}#{relation}@{user}")
}
