//! Graph resolver for permission checks and expansions.
//!
//! The resolver performs async graph traversal to determine
//! if a user has a specific permission on an object, or which
//! usersets make up a relation.
//!
//! # Resolution Rules
//!
//! - **Parallel Execution**: Union, intersection and tuple-to-userset fan-out
//!   evaluate siblings concurrently, bounded by `max_concurrency`. A decided
//!   union or intersection drops its remaining siblings.
//!
//! - **Cycle Detection**: The active path is tracked per branch in an
//!   `Arc<HashSet>`. Re-entering a node on the path contributes `false` to
//!   check and an unexpanded reference to expand.
//!
//! - **Depth Limiting**: Every rewrite edge spends one unit of a budget of
//!   `max_depth` (default 25). Exhaustion is an error, never a denial.
//!
//! - **Model Pinning**: The model is fetched once per call and shared by
//!   every step of that call.
//!
//! - **Timeout and Cancellation**: Each call is bounded by `timeout` and can
//!   be aborted through a [`CancellationToken`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::{is_valid_name, CompiledModel, Object, Tuple, User};

use super::check::CheckResolver;
use super::config::ResolverConfig;
use super::context::{CancellationToken, ContextualTuples, ResolutionContext};
use super::expand::ExpandResolver;
use super::traits::{ModelRepository, TupleReader};
use super::types::{
    CheckRequest, CheckResult, ContextualTuple, ExpandLeaf, ExpandLeafValue, ExpandNode,
    ExpandRequest, ExpandResult, UsersetTree,
};

/// Graph resolver for permission checks.
pub struct GraphResolver<T, M> {
    tuple_reader: Arc<T>,
    model_repository: Arc<M>,
    config: ResolverConfig,
}

impl<T, M> GraphResolver<T, M>
where
    T: TupleReader,
    M: ModelRepository,
{
    /// Creates a new graph resolver with default configuration.
    pub fn new(tuple_reader: Arc<T>, model_repository: Arc<M>) -> Self {
        Self::with_config(tuple_reader, model_repository, ResolverConfig::default())
    }

    /// Creates a new graph resolver with custom configuration.
    pub fn with_config(
        tuple_reader: Arc<T>,
        model_repository: Arc<M>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            tuple_reader,
            model_repository,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Checks if a user has a relation on an object.
    pub async fn check(&self, request: &CheckRequest) -> DomainResult<CheckResult> {
        self.check_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Like [`GraphResolver::check`], aborting with `Cancelled` once `cancellation` fires.
    #[instrument(
        skip_all,
        fields(store_id = %request.store_id, object = %request.object, relation = %request.relation)
    )]
    pub async fn check_with_cancellation(
        &self,
        request: &CheckRequest,
        cancellation: CancellationToken,
    ) -> DomainResult<CheckResult> {
        let object = parse_request_object(&request.object)?;
        let user = User::parse(&request.user)?;
        validate_relation(&request.relation)?;

        let model = self
            .resolve_model(&request.store_id, request.authorization_model_id.as_deref())
            .await?;
        model.rewrite(&object.object_type, &request.relation)?;
        let contextual = self.contextual_tuples(&model, &request.contextual_tuples)?;

        let ctx = ResolutionContext::new(
            &request.store_id,
            model,
            self.config.max_depth,
            contextual,
            cancellation.clone(),
        );
        let resolver = CheckResolver::new(self.tuple_reader.as_ref(), self.config.max_concurrency);
        let allowed = self
            .bounded(
                resolver.check(ctx.clone(), object, request.relation.clone(), &user),
                &cancellation,
            )
            .await?;

        Ok(CheckResult {
            allowed,
            metadata: ctx.metadata(),
        })
    }

    /// Expands a relation into the tree of usersets that define it.
    ///
    /// Computed and tuple-to-userset references are expanded recursively.
    /// Userset users found on direct tuples are listed but not expanded.
    pub async fn expand(&self, request: &ExpandRequest) -> DomainResult<ExpandResult> {
        self.expand_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Like [`GraphResolver::expand`], aborting with `Cancelled` once `cancellation` fires.
    #[instrument(
        skip_all,
        fields(store_id = %request.store_id, object = %request.object, relation = %request.relation)
    )]
    pub async fn expand_with_cancellation(
        &self,
        request: &ExpandRequest,
        cancellation: CancellationToken,
    ) -> DomainResult<ExpandResult> {
        let object = parse_request_object(&request.object)?;
        validate_relation(&request.relation)?;

        let model = self
            .resolve_model(&request.store_id, request.authorization_model_id.as_deref())
            .await?;
        model.rewrite(&object.object_type, &request.relation)?;
        let contextual = self.contextual_tuples(&model, &request.contextual_tuples)?;

        let name = format!("{object}#{}", request.relation);
        let ctx = ResolutionContext::new(
            &request.store_id,
            model,
            self.config.max_depth,
            contextual,
            cancellation.clone(),
        );
        let resolver =
            ExpandResolver::new(self.tuple_reader.as_ref(), self.config.max_concurrency);
        let root = self
            .bounded(
                resolver.expand(ctx.clone(), object, request.relation.clone()),
                &cancellation,
            )
            .await?
            // The root is never on the path when resolution starts.
            .unwrap_or_else(|| {
                ExpandNode::Leaf(ExpandLeaf {
                    name,
                    value: ExpandLeafValue::Users(Vec::new()),
                })
            });

        Ok(ExpandResult {
            tree: UsersetTree { root },
            metadata: ctx.metadata(),
        })
    }

    async fn resolve_model(
        &self,
        store_id: &str,
        model_id: Option<&str>,
    ) -> DomainResult<Arc<CompiledModel>> {
        if store_id.is_empty() {
            return Err(DomainError::StoreNotFound {
                store_id: store_id.to_string(),
            });
        }
        match model_id {
            Some(id) => self.model_repository.get_model(store_id, id).await,
            None => self.model_repository.get_latest_model(store_id).await,
        }
    }

    fn contextual_tuples(
        &self,
        model: &CompiledModel,
        tuples: &[ContextualTuple],
    ) -> DomainResult<ContextualTuples> {
        if tuples.len() > self.config.max_contextual_tuples {
            return Err(DomainError::InvalidContextualTuple {
                message: format!(
                    "{} contextual tuples exceed the limit of {}",
                    tuples.len(),
                    self.config.max_contextual_tuples
                ),
            });
        }

        let parsed = tuples
            .iter()
            .map(|ct| {
                let tuple = Tuple::from_parts(&ct.user, &ct.relation, &ct.object).map_err(|e| {
                    DomainError::InvalidContextualTuple {
                        message: e.to_string(),
                    }
                })?;
                if !model.has_relation(&tuple.object.object_type, &tuple.relation) {
                    return Err(DomainError::InvalidContextualTuple {
                        message: format!(
                            "relation '{}' is not defined on type '{}'",
                            tuple.relation, tuple.object.object_type
                        ),
                    });
                }
                Ok(tuple)
            })
            .collect::<DomainResult<Vec<_>>>()
            .map_err(|e| {
                warn!(error = %e, "rejecting contextual tuples");
                e
            })?;

        Ok(ContextualTuples::new(parsed))
    }

    /// Applies the call timeout and external cancellation to a resolution.
    async fn bounded<O>(
        &self,
        resolution: impl Future<Output = DomainResult<O>>,
        cancellation: &CancellationToken,
    ) -> DomainResult<O> {
        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(DomainError::Cancelled),
            outcome = tokio::time::timeout(self.config.timeout, resolution) => match outcome {
                Ok(result) => result,
                Err(_) => Err(timeout_error(self.config.timeout)),
            },
        };

        if let Err(e @ (DomainError::DepthLimitExceeded { .. } | DomainError::Timeout { .. })) =
            &result
        {
            warn!(error = %e, "resolution did not complete");
        }
        result
    }
}

fn parse_request_object(value: &str) -> DomainResult<Object> {
    let object = Object::parse(value)?;
    if object.is_wildcard() {
        return Err(DomainError::InvalidObjectFormat {
            value: value.to_string(),
        });
    }
    Ok(object)
}

fn validate_relation(relation: &str) -> DomainResult<()> {
    if is_valid_name(relation) {
        Ok(())
    } else {
        Err(DomainError::InvalidRelationFormat {
            value: relation.to_string(),
        })
    }
}

fn timeout_error(timeout: Duration) -> DomainError {
    DomainError::Timeout {
        duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}
