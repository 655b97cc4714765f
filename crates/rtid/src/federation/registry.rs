use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rti_config::ResignPolicy;
use tracing::{info, warn};

use super::{FEDERATION_TARGET, Federation, FederationScope, handlers};
use crate::connection::Connection;
use crate::error::RtiError;
use crate::handles::{FederationHandle, HandleCounter};
use crate::messaging::{FederationSummary, HlaVersion, MessageSink, SchemaRef};

/// Authority-side map from federation name to [`Federation`].
///
/// Names are compared case-sensitively. Federation handles start at 1 and
/// are never reused for the lifetime of the registry.
pub struct FederationRegistry {
    federations: RwLock<HashMap<String, Arc<Federation>>>,
    handles: HandleCounter,
    connection: Arc<dyn Connection>,
    policy: ResignPolicy,
}

impl FederationRegistry {
    /// Creates an empty registry whose federations broadcast through
    /// `connection`.
    pub fn new(connection: Arc<dyn Connection>, policy: ResignPolicy) -> Self {
        Self {
            federations: RwLock::new(HashMap::new()),
            handles: HandleCounter::default(),
            connection,
            policy,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<Federation>>>, RtiError> {
        self.federations
            .read()
            .map_err(|_| RtiError::poisoned("federation registry"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<Federation>>>, RtiError> {
        self.federations
            .write()
            .map_err(|_| RtiError::poisoned("federation registry"))
    }

    /// Creates a federation and wires its incoming sink.
    ///
    /// # Errors
    ///
    /// [`RtiError::FederationAlreadyExists`] when the name is taken.
    pub fn create(
        &self,
        name: &str,
        schema: SchemaRef,
        version: HlaVersion,
    ) -> Result<Arc<Federation>, RtiError> {
        let mut federations = self.write()?;
        if federations.contains_key(name) {
            warn!(target: FEDERATION_TARGET, federation = name, "federation already exists");
            return Err(RtiError::FederationAlreadyExists {
                name: name.to_owned(),
            });
        }

        let handle = FederationHandle::new(self.handles.next());
        let federation = Arc::new(Federation::new(name, handle, schema, version, self.policy));
        let scope = FederationScope::new(&federation, Arc::clone(&self.connection));
        let sink = MessageSink::from_table(
            format!("federation-{handle}-incoming"),
            handlers::INCOMING,
            &scope,
        )?;
        federation.install_incoming(sink)?;
        federations.insert(name.to_owned(), Arc::clone(&federation));

        info!(
            target: FEDERATION_TARGET,
            federation = name,
            %handle,
            %version,
            "federation created"
        );
        Ok(federation)
    }

    /// Removes an empty federation.
    ///
    /// # Errors
    ///
    /// [`RtiError::FederationDoesNotExist`] when absent and
    /// [`RtiError::FederatesCurrentlyJoined`] while federates remain.
    pub fn destroy(&self, name: &str) -> Result<(), RtiError> {
        let mut federations = self.write()?;
        let federation = federations
            .get(name)
            .ok_or_else(|| RtiError::FederationDoesNotExist {
                name: name.to_owned(),
            })?;
        federation.retire()?;
        federations.remove(name);
        info!(target: FEDERATION_TARGET, federation = name, "federation destroyed");
        Ok(())
    }

    /// # Errors
    ///
    /// [`RtiError::FederationDoesNotExist`] when absent.
    pub fn lookup(&self, name: &str) -> Result<Arc<Federation>, RtiError> {
        self.read()?
            .get(name)
            .cloned()
            .ok_or_else(|| RtiError::FederationDoesNotExist {
                name: name.to_owned(),
            })
    }

    /// Handles only reach the authority from sessions that were told them,
    /// so an unknown handle is an internal error.
    ///
    /// # Errors
    ///
    /// [`RtiError::Internal`] when no federation has this handle.
    pub fn lookup_handle(&self, handle: FederationHandle) -> Result<Arc<Federation>, RtiError> {
        self.read()?
            .values()
            .find(|federation| federation.handle() == handle)
            .cloned()
            .ok_or_else(|| RtiError::internal(format!("no federation with handle {handle}")))
    }

    /// Point-in-time summaries of every federation.
    ///
    /// # Errors
    ///
    /// Fails only when a lock is poisoned.
    pub fn list(&self) -> Result<Vec<FederationSummary>, RtiError> {
        let federations: Vec<Arc<Federation>> = self.read()?.values().cloned().collect();
        federations.iter().map(|federation| federation.summary()).collect()
    }

    /// Number of registered federations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().map_or(0, |federations| federations.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FederationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationRegistry")
            .field("federations", &self.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::connection::MockConnection;
    use crate::error::ErrorKind;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> FederationRegistry {
        let mut connection = MockConnection::new();
        connection.expect_send_broadcast().returning(|_| Ok(()));
        FederationRegistry::new(Arc::new(connection), ResignPolicy::Prune)
    }

    fn create(registry: &FederationRegistry, name: &str) -> Result<Arc<Federation>, RtiError> {
        registry.create(name, SchemaRef::default(), HlaVersion::Ieee1516e)
    }

    #[rstest]
    fn first_federation_gets_handle_one(registry: FederationRegistry) {
        let federation = create(&registry, "F").expect("create");
        assert_eq!(federation.handle(), FederationHandle::new(1));
    }

    #[rstest]
    fn duplicate_name_leaves_original_untouched(registry: FederationRegistry) {
        let original = create(&registry, "F").expect("create");
        original.join("a", None).expect("join");

        let error = create(&registry, "F").expect_err("duplicate");

        assert_eq!(error.kind(), ErrorKind::AlreadyExists);
        let current = registry.lookup("F").expect("lookup");
        assert!(Arc::ptr_eq(&original, &current));
        assert_eq!(current.federates().expect("federates").len(), 1);
    }

    #[rstest]
    fn names_are_case_sensitive(registry: FederationRegistry) {
        create(&registry, "Fleet").expect("first");
        create(&registry, "fleet").expect("second");
        assert_eq!(registry.len(), 2);
    }

    #[rstest]
    fn destroy_requires_an_empty_federation(registry: FederationRegistry) {
        let federation = create(&registry, "F").expect("create");
        let (handle, _) = federation.join("a", None).expect("join");

        assert_eq!(
            registry.destroy("F").map_err(|e| e.kind()),
            Err(ErrorKind::PreconditionFailed)
        );

        federation.resign(handle).expect("resign");
        registry.destroy("F").expect("destroy");
        assert_eq!(
            registry.lookup("F").map(|_| ()).map_err(|e| e.kind()),
            Err(ErrorKind::DoesNotExist)
        );
    }

    #[rstest]
    fn destroying_unknown_federation_fails(registry: FederationRegistry) {
        assert_eq!(
            registry.destroy("ghost").map_err(|e| e.kind()),
            Err(ErrorKind::DoesNotExist)
        );
    }

    #[rstest]
    fn unknown_handle_is_internal(registry: FederationRegistry) {
        let error = registry
            .lookup_handle(FederationHandle::new(5))
            .expect_err("unknown handle");
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[rstest]
    fn handles_are_not_reused_after_destroy(registry: FederationRegistry) {
        create(&registry, "F").expect("create");
        registry.destroy("F").expect("destroy");
        let again = create(&registry, "F").expect("recreate");
        assert_eq!(again.handle(), FederationHandle::new(2));
    }

    #[rstest]
    fn list_reports_every_federation(registry: FederationRegistry) {
        create(&registry, "A").expect("a");
        create(&registry, "B").expect("b");

        let mut names: Vec<String> = registry
            .list()
            .expect("list")
            .into_iter()
            .map(|summary| summary.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["A".to_owned(), "B".to_owned()]);
    }

    #[rstest]
    fn concurrent_creates_get_distinct_handles(registry: FederationRegistry) {
        let registry = Arc::new(registry);
        let workers: Vec<_> = (0..16)
            .map(|index| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    create(&registry, &format!("F{index}"))
                        .expect("create")
                        .handle()
                })
            })
            .collect();

        let mut handles: Vec<FederationHandle> = workers
            .into_iter()
            .map(|worker| worker.join().expect("worker panicked"))
            .collect();
        handles.sort();
        handles.dedup();
        assert_eq!(handles.len(), 16);
    }
}
