//! Mutation factory
//!
//! Builds the create/update/destroy resolvers of one model. Each resolver is
//! named `{action}{name or type}` (`createPost`, `destroyComment`, ...), runs
//! through a [`MutationWrapper`] and takes its per-call overrides from an
//! explicit [`MutationCall`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::connection::ConnectionScope;
use crate::db::Database;
use crate::error::{ResolverError, Result};
use crate::orm::{Attributes, EntityQuery, Model, persist};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutationAction {
    Create,
    Update,
    Destroy,
}

impl MutationAction {
    pub const ALL: [MutationAction; 3] = [
        MutationAction::Create,
        MutationAction::Update,
        MutationAction::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Destroy => "destroy",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for create and update.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Attributes inserted when the caller does not provide them (create only).
    pub defaults: Attributes,
    /// Fail with `NotFound` when an update changes no row.
    pub require: bool,
}

impl SaveOptions {
    /// Layer per-call options over these ones.
    pub fn extend(&self, overrides: &SaveOptions) -> SaveOptions {
        let mut defaults = self.defaults.clone();
        for (key, value) in &overrides.defaults {
            defaults.insert(key.clone(), value.clone());
        }
        SaveOptions {
            defaults,
            require: self.require || overrides.require,
        }
    }
}

/// Options for destroy.
#[derive(Debug, Clone, Copy)]
pub struct DestroyOptions {
    /// Fail with `NotFound` when the delete affects no row.
    pub require: bool,
}

impl Default for DestroyOptions {
    fn default() -> Self {
        Self { require: true }
    }
}

/// Static configuration of a model's mutations.
#[derive(Debug, Clone)]
pub struct MutationOptions {
    /// GraphQL type name of the entity.
    pub type_name: String,
    /// Overrides `type_name` in resolver names.
    pub name: Option<String>,
    pub enabled: Vec<MutationAction>,
    /// Column used to look up the target row of update/destroy.
    pub id_attribute: &'static str,
    pub save: SaveOptions,
    pub destroy: DestroyOptions,
}

impl MutationOptions {
    pub fn for_model<M: Model>() -> Self {
        Self {
            type_name: M::ENTITY_NAME.to_string(),
            name: None,
            enabled: MutationAction::ALL.to_vec(),
            id_attribute: M::PRIMARY_KEY,
            save: SaveOptions::default(),
            destroy: DestroyOptions::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn enabled(mut self, actions: impl IntoIterator<Item = MutationAction>) -> Self {
        self.enabled = actions.into_iter().collect();
        self
    }

    pub fn id_attribute(mut self, column: &'static str) -> Self {
        self.id_attribute = column;
        self
    }

    pub fn save(mut self, save: SaveOptions) -> Self {
        self.save = save;
        self
    }

    pub fn destroy(mut self, destroy: DestroyOptions) -> Self {
        self.destroy = destroy;
        self
    }

    pub fn resolver_name(&self, action: MutationAction) -> String {
        format!(
            "{}{}",
            action,
            self.name.as_deref().unwrap_or(&self.type_name)
        )
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct MutationCall {
    /// Replaces the attributes given as argument.
    pub attributes: Option<Attributes>,
    pub save: Option<SaveOptions>,
    pub destroy: Option<DestroyOptions>,
    /// Restricts the rows update/destroy may touch.
    pub scope: ConnectionScope,
}

impl MutationCall {
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn save(mut self, save: SaveOptions) -> Self {
        self.save = Some(save);
        self
    }

    pub fn destroy(mut self, destroy: DestroyOptions) -> Self {
        self.destroy = Some(destroy);
        self
    }

    pub fn scope(mut self, scope: ConnectionScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Arguments of one mutation invocation.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub action: MutationAction,
    pub id: Option<i64>,
    pub attributes: Attributes,
}

impl MutationRequest {
    pub fn create(attributes: Attributes) -> Self {
        Self {
            action: MutationAction::Create,
            id: None,
            attributes,
        }
    }

    pub fn update(id: i64, attributes: Attributes) -> Self {
        Self {
            action: MutationAction::Update,
            id: Some(id),
            attributes,
        }
    }

    pub fn destroy(id: i64) -> Self {
        Self {
            action: MutationAction::Destroy,
            id: Some(id),
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<M> {
    Entity(M),
    Destroyed(bool),
}

impl<M> MutationOutcome<M> {
    pub fn into_entity(self) -> Result<M> {
        match self {
            MutationOutcome::Entity(m) => Ok(m),
            MutationOutcome::Destroyed(_) => Err(ResolverError::InvalidArgument(
                "destroy does not return an entity".to_string(),
            )),
        }
    }

    pub fn into_destroyed(self) -> Result<bool> {
        match self {
            MutationOutcome::Destroyed(b) => Ok(b),
            MutationOutcome::Entity(_) => Err(ResolverError::InvalidArgument(
                "expected a destroy outcome".to_string(),
            )),
        }
    }
}

/// Cross-cutting behaviour around every mutation (authorisation, auditing).
///
/// `next` runs the mutation itself; a wrapper may skip it by returning early.
#[async_trait]
pub trait MutationWrapper<M: Model>: Send + Sync {
    async fn around(
        &self,
        request: &MutationRequest,
        next: BoxFuture<'_, Result<MutationOutcome<M>>>,
    ) -> Result<MutationOutcome<M>>;
}

/// Runs the mutation unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl<M: Model> MutationWrapper<M> for Passthrough {
    async fn around(
        &self,
        _request: &MutationRequest,
        next: BoxFuture<'_, Result<MutationOutcome<M>>>,
    ) -> Result<MutationOutcome<M>> {
        next.await
    }
}

struct Inner<M: Model> {
    db: Database,
    options: MutationOptions,
    wrapper: Arc<dyn MutationWrapper<M>>,
}

/// Create/update/destroy for one model.
pub struct MutationFactory<M: Model> {
    inner: Arc<Inner<M>>,
}

impl<M: Model> Clone for MutationFactory<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Model> MutationFactory<M> {
    pub fn new(db: Database, options: MutationOptions) -> Self {
        Self::with_wrapper(db, options, Passthrough)
    }

    pub fn with_wrapper(
        db: Database,
        options: MutationOptions,
        wrapper: impl MutationWrapper<M> + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                options,
                wrapper: Arc::new(wrapper),
            }),
        }
    }

    pub fn options(&self) -> &MutationOptions {
        &self.inner.options
    }

    /// Resolvers for every enabled action, keyed by resolver name.
    pub fn resolvers(&self) -> BTreeMap<String, MutationResolver<M>> {
        self.inner
            .options
            .enabled
            .iter()
            .map(|action| {
                (
                    self.inner.options.resolver_name(*action),
                    MutationResolver {
                        action: *action,
                        factory: self.clone(),
                    },
                )
            })
            .collect()
    }

    pub async fn create(&self, attributes: Attributes, call: &MutationCall) -> Result<M> {
        self.execute(MutationRequest::create(attributes), call)
            .await?
            .into_entity()
    }

    pub async fn update(&self, id: i64, attributes: Attributes, call: &MutationCall) -> Result<M> {
        self.execute(MutationRequest::update(id, attributes), call)
            .await?
            .into_entity()
    }

    pub async fn destroy(&self, id: i64, call: &MutationCall) -> Result<bool> {
        self.execute(MutationRequest::destroy(id), call)
            .await?
            .into_destroyed()
    }

    /// Run one request through the wrapper.
    pub async fn execute(
        &self,
        mut request: MutationRequest,
        call: &MutationCall,
    ) -> Result<MutationOutcome<M>> {
        let options = &self.inner.options;
        if !options.enabled.contains(&request.action) {
            return Err(ResolverError::InvalidArgument(format!(
                "{} is not enabled",
                options.resolver_name(request.action)
            )));
        }
        if let Some(attributes) = &call.attributes {
            request.attributes = attributes.clone();
        }

        let run = self.run(&request, call);
        self.inner.wrapper.around(&request, Box::pin(run)).await
    }

    async fn run(&self, request: &MutationRequest, call: &MutationCall) -> Result<MutationOutcome<M>> {
        match (request.action, request.id) {
            (MutationAction::Create, _) => self
                .run_create(&request.attributes, call)
                .await
                .map(MutationOutcome::Entity),
            (MutationAction::Update, Some(id)) => self
                .run_update(id, &request.attributes, call)
                .await
                .map(MutationOutcome::Entity),
            (MutationAction::Destroy, Some(id)) => self
                .run_destroy(id, call)
                .await
                .map(MutationOutcome::Destroyed),
            (action, None) => Err(ResolverError::InvalidArgument(format!(
                "{} requires an id",
                self.inner.options.resolver_name(action)
            ))),
        }
    }

    fn save_options(&self, call: &MutationCall) -> SaveOptions {
        match &call.save {
            Some(overrides) => self.inner.options.save.extend(overrides),
            None => self.inner.options.save.clone(),
        }
    }

    async fn run_create(&self, attributes: &Attributes, call: &MutationCall) -> Result<M> {
        let save = self.save_options(call);
        let mut merged = save.defaults;
        for (key, value) in attributes {
            merged.insert(key.clone(), value.clone());
        }

        let entity = persist::insert::<M>(self.inner.db.pool(), &merged).await?;
        tracing::info!(entity = M::ENTITY_NAME, id = entity.id(), "Created");
        Ok(entity)
    }

    /// Exactly one row matching `id_attribute = id` inside the call scope.
    async fn lookup(&self, id: i64, call: &MutationCall) -> Result<M> {
        let query = call
            .scope
            .apply(EntityQuery::<M>::new())
            .where_eq(self.inner.options.id_attribute, id);
        query
            .fetch_one(self.inner.db.pool(), true)
            .await?
            .ok_or_else(|| ResolverError::not_found(M::ENTITY_NAME, format!("id = {}", id)))
    }

    async fn run_update(&self, id: i64, attributes: &Attributes, call: &MutationCall) -> Result<M> {
        let item = self.lookup(id, call).await?;
        let save = self.save_options(call);
        let pool = self.inner.db.pool();

        let changed = persist::update::<M>(pool, item.id(), attributes).await?;
        if save.require && changed == 0 && !attributes.is_empty() {
            return Err(ResolverError::not_found(
                M::ENTITY_NAME,
                format!("no row updated for id = {}", id),
            ));
        }

        tracing::info!(entity = M::ENTITY_NAME, id = item.id(), changed, "Updated");
        persist::find_by_id::<M>(pool, item.id()).await
    }

    async fn run_destroy(&self, id: i64, call: &MutationCall) -> Result<bool> {
        let item = self.lookup(id, call).await?;
        let destroy = call.destroy.unwrap_or(self.inner.options.destroy);

        let deleted = EntityQuery::<M>::new()
            .where_eq(M::PRIMARY_KEY, item.id())
            .delete(self.inner.db.pool())
            .await?;
        if destroy.require && deleted == 0 {
            return Err(ResolverError::not_found(
                M::ENTITY_NAME,
                format!("no row deleted for id = {}", id),
            ));
        }

        tracing::info!(entity = M::ENTITY_NAME, id = item.id(), "Destroyed");
        Ok(true)
    }
}

/// One named resolver produced by [`MutationFactory::resolvers`].
pub struct MutationResolver<M: Model> {
    action: MutationAction,
    factory: MutationFactory<M>,
}

impl<M: Model> Clone for MutationResolver<M> {
    fn clone(&self) -> Self {
        Self {
            action: self.action,
            factory: self.factory.clone(),
        }
    }
}

impl<M: Model> MutationResolver<M> {
    pub fn action(&self) -> MutationAction {
        self.action
    }

    pub async fn call(
        &self,
        id: Option<i64>,
        attributes: Attributes,
        call: &MutationCall,
    ) -> Result<MutationOutcome<M>> {
        let request = MutationRequest {
            action: self.action,
            id,
            attributes,
        };
        self.factory.execute(request, call).await
    }
}
