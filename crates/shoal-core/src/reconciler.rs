// Lifecycle state machine for one remote resource instance.
//
// Planned → Created → Synced ⇄ Drifted → Deleted
//
// Each reconciler drives exactly one remote object through the four
// operations, synchronously per instance; callers that want parallelism
// run one reconciler per resource. Failures carry the profile name,
// operation, and natural key so the caller can tell which of many
// resources went wrong.

use std::sync::Arc;

use tracing::{debug, warn};

use shoal_api::{Query, RestClient};

use crate::capability;
use crate::diff;
use crate::error::CoreError;
use crate::factory::ClientFactory;
use crate::import::CompositeKey;
use crate::schema::ResourceSchema;
use crate::value::{AttributeBag, Value};

/// Lifecycle state of one remote resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Declared but not yet created remotely.
    Planned,
    /// Create accepted; observed state not yet read back.
    Created,
    /// Observed state matches desired state.
    Synced,
    /// Observed state differs from desired state.
    Drifted,
    /// Deleted remotely (or confirmed already absent).
    Deleted,
}

/// Drives one remote resource through its lifecycle.
#[derive(Debug)]
pub struct Reconciler {
    schema: &'static ResourceSchema,
    client: Arc<RestClient>,
    profile_name: String,
    state: ResourceState,
    remote_id: Option<String>,
    observed: AttributeBag,
}

impl Reconciler {
    /// Start reconciling a new (not yet created) resource via the named
    /// connection profile.
    pub async fn new(
        factory: &ClientFactory,
        schema: &'static ResourceSchema,
        profile_name: &str,
    ) -> Result<Self, CoreError> {
        let profile_name = factory.registry().lookup(profile_name)?.name.clone();
        let client = factory.get_client(&profile_name).await?;
        Ok(Self {
            schema,
            client,
            profile_name,
            state: ResourceState::Planned,
            remote_id: None,
            observed: AttributeBag::new(),
        })
    }

    /// Adopt an existing remote resource from a composite import
    /// identifier (natural key components plus profile name, comma
    /// separated).
    ///
    /// The remote object must exist; a missing object is an error here,
    /// unlike `locate` during refresh where the caller decides.
    pub async fn from_import(
        factory: &ClientFactory,
        schema: &'static ResourceSchema,
        raw: &str,
    ) -> Result<Self, CoreError> {
        let key = CompositeKey::decode(schema, raw)?;

        let mut reconciler = Self::new(factory, schema, key.profile_name()).await?;
        let mut desired = AttributeBag::new();
        for (field, component) in schema.natural_key_fields().zip(key.natural_key()) {
            desired.set(field.name, Value::present(component.as_str()));
        }

        reconciler
            .locate(&desired)
            .await
            .map_err(|e| reconciler.context("import", &desired, e))?;
        reconciler.state = ResourceState::Synced;
        Ok(reconciler)
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// The remote identity, once the object has been located or created.
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// The last observed remote state.
    pub fn observed(&self) -> &AttributeBag {
        &self.observed
    }

    // ── Locate ───────────────────────────────────────────────────────

    /// Fetch the observed state, by remote identity when one is known,
    /// otherwise by the natural key fields of `desired`.
    ///
    /// A missing remote object surfaces as a not-found error; whether
    /// that means "deleted out of band" is the caller's call.
    pub async fn locate(&mut self, desired: &AttributeBag) -> Result<(), CoreError> {
        let version = self.client.version().await?;
        let fields = self.schema.read_fields(version);

        let record = match &self.remote_id {
            Some(uuid) => {
                let path = format!("{}/{uuid}", self.schema.rest_path);
                let mut query = Query::new();
                query.fields(&fields);
                match self.client.get_object(&path, &query).await {
                    Ok(record) => record,
                    Err(e) if e.is_not_found() => {
                        return Err(CoreError::NotFound {
                            resource_type: self.schema.resource_type,
                            identifier: uuid.clone(),
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => {
                let mut query = self.natural_key_query(desired)?;
                query.fields(&fields);
                let found = match self.client.get_record(self.schema.rest_path, &query).await {
                    Ok(found) => found,
                    Err(shoal_api::Error::TooManyRecords { count }) => {
                        return Err(CoreError::Ambiguous {
                            resource_type: self.schema.resource_type,
                            count,
                        });
                    }
                    Err(e) => return Err(e.into()),
                };
                found.ok_or_else(|| CoreError::NotFound {
                    resource_type: self.schema.resource_type,
                    identifier: self.natural_key_string(desired),
                })?
            }
        };

        if self.remote_id.is_none() {
            self.remote_id = record
                .get("uuid")
                .or_else(|| record.get("id"))
                .and_then(|v| v.as_str())
                .map(str::to_owned);
        }
        self.observed = capability::observe(self.schema, version, &record);
        Ok(())
    }

    // ── Create ───────────────────────────────────────────────────────

    /// Create the remote object from the full desired bag, then read it
    /// back to pick up remote-computed defaults.
    pub async fn create(&mut self, desired: &AttributeBag) -> Result<(), CoreError> {
        if self.state != ResourceState::Planned {
            return Err(CoreError::InvalidTransition {
                operation: "create",
                state: self.state,
            });
        }

        let result = self.create_inner(desired).await;
        result.map_err(|e| self.context("create", desired, e))
    }

    async fn create_inner(&mut self, desired: &AttributeBag) -> Result<(), CoreError> {
        let version = self.client.version().await?;
        let body = capability::request_body(self.schema, version, desired)?;

        let created = self.client.create(self.schema.rest_path, &body).await?;
        self.remote_id = created
            .as_ref()
            .and_then(|r| r.get("uuid").or_else(|| r.get("id")))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        self.state = ResourceState::Created;
        debug!(
            resource = self.schema.resource_type,
            key = %self.natural_key_string(desired),
            "created"
        );

        // Job-backed creates return no record; re-locate by natural key
        // to learn the remote identity and the defaulted fields.
        self.locate(desired).await?;
        self.state = ResourceState::Synced;
        Ok(())
    }

    // ── Update ───────────────────────────────────────────────────────

    /// Apply the minimal patch taking observed to desired.
    ///
    /// An empty patch makes no network call at all.
    pub async fn update(&mut self, desired: &AttributeBag) -> Result<(), CoreError> {
        if !matches!(self.state, ResourceState::Synced | ResourceState::Drifted) {
            return Err(CoreError::InvalidTransition {
                operation: "update",
                state: self.state,
            });
        }

        let result = self.update_inner(desired).await;
        result.map_err(|e| self.context("update", desired, e))
    }

    async fn update_inner(&mut self, desired: &AttributeBag) -> Result<(), CoreError> {
        let version = self.client.version().await?;
        let patch = diff::diff(self.schema, desired, &self.observed)?;
        if patch.is_empty() {
            debug!(
                resource = self.schema.resource_type,
                key = %self.natural_key_string(desired),
                "no changes, skipping update"
            );
            self.state = ResourceState::Synced;
            return Ok(());
        }

        let uuid = self.require_remote_id("update")?;
        let body = capability::request_body(self.schema, version, &patch)?;
        let path = format!("{}/{uuid}", self.schema.rest_path);
        self.client.update(&path, &body).await?;
        debug!(
            resource = self.schema.resource_type,
            key = %self.natural_key_string(desired),
            fields = patch.len(),
            "patched"
        );

        self.locate(desired).await?;
        self.state = ResourceState::Synced;
        Ok(())
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Re-read remote state and report the pending patch, moving to
    /// Drifted when it is non-empty.
    pub async fn refresh(&mut self, desired: &AttributeBag) -> Result<AttributeBag, CoreError> {
        if !matches!(
            self.state,
            ResourceState::Created | ResourceState::Synced | ResourceState::Drifted
        ) {
            return Err(CoreError::InvalidTransition {
                operation: "refresh",
                state: self.state,
            });
        }

        let result = self.refresh_inner(desired).await;
        result.map_err(|e| self.context("refresh", desired, e))
    }

    async fn refresh_inner(&mut self, desired: &AttributeBag) -> Result<AttributeBag, CoreError> {
        self.locate(desired).await?;
        let patch = diff::diff(self.schema, desired, &self.observed)?;
        self.state = if patch.is_empty() {
            ResourceState::Synced
        } else {
            ResourceState::Drifted
        };
        Ok(patch)
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Delete the remote object; an already-absent object counts as
    /// success.
    pub async fn delete(&mut self) -> Result<(), CoreError> {
        if self.state == ResourceState::Deleted {
            return Err(CoreError::InvalidTransition {
                operation: "delete",
                state: self.state,
            });
        }

        let Some(uuid) = self.remote_id.clone() else {
            // Never created remotely; nothing to remove.
            self.state = ResourceState::Deleted;
            return Ok(());
        };

        let path = format!("{}/{uuid}", self.schema.rest_path);
        match self.client.delete(&path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(
                    resource = self.schema.resource_type,
                    uuid = %uuid,
                    "already absent on delete, treating as deleted"
                );
            }
            Err(e) => {
                return Err(CoreError::Operation {
                    operation: "delete",
                    resource_type: self.schema.resource_type,
                    key: uuid,
                    profile: self.profile_name.clone(),
                    source: Box::new(e.into()),
                });
            }
        }

        self.state = ResourceState::Deleted;
        self.remote_id = None;
        self.observed = AttributeBag::new();
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Build the collection query matching this resource's natural key.
    fn natural_key_query(&self, desired: &AttributeBag) -> Result<Query, CoreError> {
        let mut query = Query::new();
        for field in self.schema.natural_key_fields() {
            let value = match desired.get(field.name) {
                Value::Present(v) => v
                    .as_str()
                    .map(str::to_owned)
                    .unwrap_or_else(|| v.to_string()),
                _ => return Err(CoreError::MissingNaturalKey { field: field.name }),
            };
            query.set(field.name, value);
        }
        Ok(query)
    }

    /// Natural key rendered for logs and error context.
    fn natural_key_string(&self, desired: &AttributeBag) -> String {
        let components: Vec<&str> = self
            .schema
            .natural_key_fields()
            .map(|f| desired.get(f.name).as_str().unwrap_or("?"))
            .collect();
        components.join(",")
    }

    fn require_remote_id(&self, operation: &'static str) -> Result<String, CoreError> {
        self.remote_id
            .clone()
            .ok_or_else(|| CoreError::NotFound {
                resource_type: self.schema.resource_type,
                identifier: format!("no remote identity for {operation}"),
            })
    }

    /// Wrap a failure with the operation, natural key, and profile.
    fn context(&self, operation: &'static str, desired: &AttributeBag, source: CoreError) -> CoreError {
        // Already-contextualized errors pass through untouched.
        if matches!(source, CoreError::Operation { .. }) {
            return source;
        }
        CoreError::Operation {
            operation,
            resource_type: self.schema.resource_type,
            key: self.natural_key_string(desired),
            profile: self.profile_name.clone(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionProfile, ConnectionRegistry};
    use crate::schema::FieldSpec;
    use secrecy::SecretString;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("name").key(),
        FieldSpec::new("svm.name").key(),
        FieldSpec::new("comment"),
    ];

    const SCHEMA: ResourceSchema = ResourceSchema {
        resource_type: "storage volume",
        rest_path: "storage/volumes",
        fields: FIELDS,
    };

    async fn planned_reconciler() -> Reconciler {
        let mut registry = ConnectionRegistry::new();
        registry
            .register(ConnectionProfile::new(
                "cluster4",
                "cluster4.example.com",
                "admin",
                SecretString::from("pw"),
            ))
            .unwrap();
        let factory = ClientFactory::new(registry);
        Reconciler::new(&factory, &SCHEMA, "cluster4").await.unwrap()
    }

    #[tokio::test]
    async fn update_is_rejected_before_create() {
        let mut reconciler = planned_reconciler().await;
        let desired = AttributeBag::new();
        match reconciler.update(&desired).await.unwrap_err() {
            CoreError::InvalidTransition { operation, state } => {
                assert_eq!(operation, "update");
                assert_eq!(state, ResourceState::Planned);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_of_never_created_resource_is_local() {
        let mut reconciler = planned_reconciler().await;
        reconciler.delete().await.unwrap();
        assert_eq!(reconciler.state(), ResourceState::Deleted);
    }

    #[tokio::test]
    async fn double_delete_is_rejected() {
        let mut reconciler = planned_reconciler().await;
        reconciler.delete().await.unwrap();
        assert!(matches!(
            reconciler.delete().await.unwrap_err(),
            CoreError::InvalidTransition {
                operation: "delete",
                state: ResourceState::Deleted,
            }
        ));
    }

    #[tokio::test]
    async fn empty_name_resolves_to_sole_profile() {
        let mut registry = ConnectionRegistry::new();
        registry
            .register(ConnectionProfile::new(
                "only",
                "only.example.com",
                "admin",
                SecretString::from("pw"),
            ))
            .unwrap();
        let factory = ClientFactory::new(registry);
        let reconciler = Reconciler::new(&factory, &SCHEMA, "").await.unwrap();
        assert_eq!(reconciler.profile_name, "only");
    }
}
