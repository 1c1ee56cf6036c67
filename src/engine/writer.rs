//! Reconciled writes
//!
//! Every operation first resolves what the appliance currently holds, then
//! decides. Create adopts an existing match instead of duplicating it. Update
//! and delete act on the id the appliance reports, not the remembered one.
//! Mutating calls are issued once; their failures are returned as-is.

use super::api::{DesiredState, Detail, ResourceApi};
use super::equivalence::{drifted_fields, Equivalence};
use super::error::{ApiError, ReconcileError, Result};
use super::identity::{CompositeIdentity, IdentitySchema, Scope};
use super::pager::pages;
use super::resolver::{resolve, resolve_by_id, KeyMatch};
use super::selector::LookupStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::Instrument;
use uuid::Uuid;

/// Per-kind configuration of the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceKind {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identity: IdentitySchema,
    /// Rule used when matching the secondary key during a scan
    #[serde(default)]
    pub key_equivalence: Equivalence,
    /// Rules used when deciding drift, by dotted field path
    #[serde(default)]
    pub field_equivalence: BTreeMap<String, Equivalence>,
}

impl ResourceKind {
    fn drift_rules(&self) -> BTreeMap<String, Equivalence> {
        let mut rules = self.field_equivalence.clone();
        rules.insert(self.identity.id_field.clone(), Equivalence::Always);
        rules
            .entry(self.identity.key_field.clone())
            .or_insert(self.key_equivalence);
        rules
    }
}

/// A remote object together with the identity derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub identity: CompositeIdentity,
    pub detail: Detail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A matching object already existed; no create call was made
    Adopted(Resolved),
    Created(Resolved),
}

impl CreateOutcome {
    pub fn resolved(&self) -> &Resolved {
        match self {
            CreateOutcome::Adopted(r) | CreateOutcome::Created(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated {
        resolved: Resolved,
        drifted: Vec<String>,
    },
    /// Remote already matches the desired state
    Unchanged(Resolved),
}

impl UpdateOutcome {
    pub fn resolved(&self) -> &Resolved {
        match self {
            UpdateOutcome::Updated { resolved, .. } | UpdateOutcome::Unchanged(resolved) => resolved,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(CompositeIdentity),
    /// Nothing to delete; the desired state already holds
    AlreadyAbsent,
}

/// Create/read/update/delete for one resource kind through one `ResourceApi`
pub struct ReconciledWriter<'a, A: ResourceApi + ?Sized> {
    api: &'a A,
    kind: &'a ResourceKind,
}

impl<'a, A: ResourceApi + ?Sized> ReconciledWriter<'a, A> {
    pub fn new(api: &'a A, kind: &'a ResourceKind) -> Self {
        Self { api, kind }
    }

    fn schema(&self) -> &IdentitySchema {
        &self.kind.identity
    }

    fn span(&self, op: &'static str) -> tracing::Span {
        tracing::info_span!("reconcile", op, kind = %self.kind.name, op_id = %Uuid::new_v4())
    }

    /// Look the object up, most specific strategy first, degrading on "not found"
    async fn resolve_existing(&self, identity: &CompositeIdentity) -> Result<Option<Detail>> {
        let api = self.api;
        let supports_key_lookup = api.supports_key_lookup();
        let mut strategy =
            LookupStrategy::choose(identity.has_id(), identity.has_key(), supports_key_lookup);

        loop {
            tracing::debug!("Resolving {} via {:?}", identity, strategy);

            let found = match strategy {
                LookupStrategy::Nothing => return Ok(None),
                LookupStrategy::ById => {
                    resolve_by_id(&identity.id, move |id| async move { api.get_by_id(&id).await })
                        .await
                },
                LookupStrategy::ByKey => match api.get_by_key(&identity.key).await {
                    Err(ApiError::NotFound) => Ok(None),
                    other => other,
                },
                LookupStrategy::ScanByKey => {
                    let key = KeyMatch {
                        field: &self.schema().key_field,
                        want: &identity.key,
                        equivalence: self.kind.key_equivalence,
                    };
                    resolve(pages(api), "", Some(key), move |id| async move {
                        api.get_by_id(&id).await
                    })
                    .await
                },
            }
            .map_err(|e| {
                ReconcileError::api(format!("resolve {} {}", self.kind.name, identity), e)
            })?;

            if found.is_some() {
                return Ok(found);
            }
            strategy = strategy.degrade(identity.has_key(), supports_key_lookup);
        }
    }

    fn bind(&self, detail: Detail, local: &CompositeIdentity) -> Resolved {
        Resolved {
            identity: CompositeIdentity::from_detail(self.schema(), &detail, local),
            detail,
        }
    }

    /// Adopt a matching remote object, or create one
    pub async fn create(&self, desired: &DesiredState, scope: &Scope) -> Result<CreateOutcome> {
        if desired.is_empty() {
            return Err(ReconcileError::InvalidDesiredState(
                "desired state has no fields".to_string(),
            ));
        }

        let local = CompositeIdentity::from_desired(self.schema(), desired, scope);
        self.adopt_or_create(desired, &local)
            .instrument(self.span("create"))
            .await
    }

    async fn adopt_or_create(
        &self,
        desired: &DesiredState,
        local: &CompositeIdentity,
    ) -> Result<CreateOutcome> {
        if let Some(existing) = self.resolve_existing(local).await? {
            let resolved = self.bind(existing, local);
            tracing::info!("Adopting existing {} {}", self.kind.name, resolved.identity);
            return Ok(CreateOutcome::Adopted(resolved));
        }

        let created = self
            .api
            .create(desired)
            .await
            .map_err(|e| ReconcileError::api(format!("create {} {}", self.kind.name, local), e))?;

        let resolved = self.bind(created, local);
        tracing::info!("Created {} {}", self.kind.name, resolved.identity);
        Ok(CreateOutcome::Created(resolved))
    }

    /// Current remote state of an identity, `None` when it no longer exists
    pub async fn read(&self, identity: &CompositeIdentity) -> Result<Option<Resolved>> {
        let found = self
            .resolve_existing(identity)
            .instrument(self.span("read"))
            .await?;
        Ok(found.map(|detail| self.bind(detail, identity)))
    }

    /// Write the desired state when it drifted from the remote object
    pub async fn update(
        &self,
        identity: &CompositeIdentity,
        desired: &DesiredState,
    ) -> Result<UpdateOutcome> {
        self.update_if_drifted(identity, desired)
            .instrument(self.span("update"))
            .await
    }

    async fn update_if_drifted(
        &self,
        identity: &CompositeIdentity,
        desired: &DesiredState,
    ) -> Result<UpdateOutcome> {
        let Some(current) = self.resolve_existing(identity).await? else {
            return Err(ReconcileError::NotFound {
                kind: self.kind.name.clone(),
                identity: identity.to_string(),
            });
        };
        let current = self.bind(current, identity);

        let drifted = drifted_fields(desired, &current.detail, &self.kind.drift_rules());
        if drifted.is_empty() {
            tracing::info!("{} {} has no drift", self.kind.name, current.identity);
            return Ok(UpdateOutcome::Unchanged(current));
        }

        tracing::info!(
            "Updating {} {} (drifted: {})",
            self.kind.name,
            current.identity,
            drifted.join(", ")
        );

        let id = current.identity.id.clone();
        let echoed = self.api.update_by_id(&id, desired).await.map_err(|e| {
            ReconcileError::api(format!("update {} {}", self.kind.name, current.identity), e)
        })?;

        let detail = match echoed {
            Some(detail) => detail,
            None => match self.api.get_by_id(&id).await {
                Ok(Some(detail)) => detail,
                Ok(None) => current.detail.clone(),
                Err(e) => {
                    tracing::warn!("Re-reading {} after update failed: {}", id, e);
                    current.detail.clone()
                },
            },
        };

        Ok(UpdateOutcome::Updated {
            resolved: self.bind(detail, &current.identity),
            drifted,
        })
    }

    /// Delete the object; an object that is already gone is not an error
    pub async fn delete(&self, identity: &CompositeIdentity) -> Result<DeleteOutcome> {
        self.delete_if_present(identity)
            .instrument(self.span("delete"))
            .await
    }

    async fn delete_if_present(&self, identity: &CompositeIdentity) -> Result<DeleteOutcome> {
        let Some(current) = self.resolve_existing(identity).await? else {
            tracing::info!("{} {} already absent", self.kind.name, identity);
            return Ok(DeleteOutcome::AlreadyAbsent);
        };
        let current = self.bind(current, identity);

        match self.api.delete_by_id(&current.identity.id).await {
            Ok(()) => {
                tracing::info!("Deleted {} {}", self.kind.name, current.identity);
                Ok(DeleteOutcome::Deleted(current.identity))
            },
            Err(ApiError::NotFound) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(ReconcileError::api(
                format!("delete {} {}", self.kind.name, current.identity),
                e,
            )),
        }
    }
}
