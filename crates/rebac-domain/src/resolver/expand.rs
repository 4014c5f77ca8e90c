//! Expand: the userset tree behind `object#relation`.

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::error::DomainResult;
use crate::model::{Object, Rewrite};

use super::context::ResolutionContext;
use super::evaluator::Evaluator;
use super::traits::TupleReader;
use super::types::{ComputedExpansion, ExpandLeaf, ExpandLeafValue, ExpandNode};

pub(crate) struct ExpandResolver<'a, T: ?Sized> {
    evaluator: Evaluator<'a, T>,
}

impl<'a, T: TupleReader + ?Sized> ExpandResolver<'a, T> {
    pub(crate) fn new(reader: &'a T, max_concurrency: usize) -> Self {
        Self {
            evaluator: Evaluator::new(reader, max_concurrency),
        }
    }

    /// Expands `object#relation`. Returns `None` if the node is already on the
    /// active path; the caller records the reference without a subtree.
    pub(crate) fn expand<'s>(
        &'s self,
        ctx: ResolutionContext,
        object: Object,
        relation: String,
    ) -> BoxFuture<'s, DomainResult<Option<ExpandNode>>> {
        Box::pin(async move {
            ctx.ensure_active()?;

            let Some(ctx) = ctx.enter(format!("{object}#{relation}")) else {
                debug!(%object, relation, "cycle detected, leaving userset unexpanded");
                return Ok(None);
            };

            let model = ctx.model().clone();
            let rewrite = model.rewrite(&object.object_type, &relation)?;
            self.expand_rewrite(ctx, &object, &relation, rewrite)
                .await
                .map(Some)
        })
    }

    fn expand_rewrite<'s>(
        &'s self,
        ctx: ResolutionContext,
        object: &'s Object,
        relation: &'s str,
        rewrite: &'s Rewrite,
    ) -> BoxFuture<'s, DomainResult<ExpandNode>> {
        Box::pin(async move {
            let name = format!("{object}#{relation}");
            match rewrite {
                Rewrite::This => {
                    let users = self
                        .evaluator
                        .read_users(&ctx, object, relation)
                        .await?
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    Ok(leaf(name, ExpandLeafValue::Users(users)))
                }

                Rewrite::ComputedUserset { relation: computed } => {
                    let expansion = self.expand_reference(&ctx, object.clone(), computed).await?;
                    Ok(leaf(name, ExpandLeafValue::Computed(expansion)))
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
                        .filter(|parent| {
                            ctx.model()
                                .has_relation(&parent.object_type, computed_userset)
                        })
                        .collect();

                    let branches = parents
                        .into_iter()
                        .map(|parent| self.expand_reference(&ctx, parent, computed_userset).boxed())
                        .collect();
                    let computed = self.evaluator.collect(branches).await?;

                    Ok(leaf(
                        name,
                        ExpandLeafValue::TupleToUserset {
                            tupleset: tupleset.clone(),
                            computed,
                        },
                    ))
                }

                Rewrite::Union { children } => {
                    let nodes = self.expand_children(&ctx, object, relation, children).await?;
                    Ok(ExpandNode::Union { name, nodes })
                }

                Rewrite::Intersection { children } => {
                    let nodes = self.expand_children(&ctx, object, relation, children).await?;
                    Ok(ExpandNode::Intersection { name, nodes })
                }

                Rewrite::Difference { base, subtract } => {
                    let child = ctx.descend()?;
                    let (base, subtract) = futures::try_join!(
                        self.expand_rewrite(child.clone(), object, relation, base),
                        self.expand_rewrite(child, object, relation, subtract),
                    )?;
                    Ok(ExpandNode::Difference {
                        name,
                        base: Box::new(base),
                        subtract: Box::new(subtract),
                    })
                }
            }
        })
    }

    async fn expand_children(
        &self,
        ctx: &ResolutionContext,
        object: &Object,
        relation: &str,
        children: &[Rewrite],
    ) -> DomainResult<Vec<ExpandNode>> {
        let child = ctx.descend()?;
        let branches = children
            .iter()
            .map(|c| self.expand_rewrite(child.clone(), object, relation, c))
            .collect();
        self.evaluator.collect(branches).await
    }

    /// Expands a userset reference reached from a rewrite.
    ///
    /// A reference back onto the active path is recorded without a subtree
    /// and spends no depth.
    async fn expand_reference(
        &self,
        ctx: &ResolutionContext,
        object: Object,
        relation: &str,
    ) -> DomainResult<ComputedExpansion> {
        let userset = format!("{object}#{relation}");
        if ctx.on_path(&userset) {
            debug!(%userset, "cycle detected, leaving userset unexpanded");
            return Ok(ComputedExpansion {
                userset,
                expansion: None,
            });
        }
        let child = ctx.descend()?;
        let expansion = self.expand(child, object, relation.to_string()).await?;
        Ok(ComputedExpansion {
            userset,
            expansion: expansion.map(Box::new),
        })
    }
}

fn leaf(name: String, value: ExpandLeafValue) -> ExpandNode {
    ExpandNode::Leaf(ExpandLeaf { name, value })
}
