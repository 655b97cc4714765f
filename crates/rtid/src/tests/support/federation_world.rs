//! Federation world: an exchange, its authority and named federate sessions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rti_config::{Config, ResignPolicy};

use crate::connection::Exchange;
use crate::error::{ErrorKind, RtiError};
use crate::handles::{FederateHandle, FederationHandle};
use crate::messaging::{HlaVersion, Notice, SchemaRef};
use crate::rti::Authority;
use crate::session::{CallbackListener, Session};
use crate::sync::SyncPoint;

/// How long a step waits for an asynchronous notice.
const NOTICE_WAIT: Duration = Duration::from_millis(500);

/// Listener forwarding pushed notices to the world.
struct ForwardingListener {
    notices: Sender<(String, Notice)>,
    session: String,
}

impl CallbackListener for ForwardingListener {
    fn on_notice(&self, notice: Notice) {
        let _ = self.notices.send((self.session.clone(), notice));
    }
}

/// Scenario world shared across federation and synchronization steps.
pub struct FederationWorld {
    exchange: Arc<Exchange>,
    authority: Option<Authority>,
    config: Config,
    sessions: BTreeMap<String, Session>,
    federates: BTreeMap<String, FederateHandle>,
    federations: BTreeMap<String, FederationHandle>,
    last: Option<Result<(), RtiError>>,
    pushed_tx: Sender<(String, Notice)>,
    pushed_rx: Receiver<(String, Notice)>,
}

impl FederationWorld {
    #[must_use]
    pub fn new() -> Self {
        let (pushed_tx, pushed_rx) = unbounded();
        Self {
            exchange: Arc::new(Exchange::new()),
            authority: None,
            config: Config {
                request_timeout_ms: 1_000,
                ..Config::default()
            },
            sessions: BTreeMap::new(),
            federates: BTreeMap::new(),
            federations: BTreeMap::new(),
            last: None,
            pushed_tx,
            pushed_rx,
        }
    }

    /// Attaches an authority applying `policy` to resignations.
    pub fn start_authority(&mut self, policy: ResignPolicy) -> Result<(), String> {
        self.config.resign_policy = policy;
        let authority = Authority::start(self.config.clone(), &self.exchange)
            .map_err(|error| format!("authority failed to start: {error}"))?;
        self.authority = Some(authority);
        Ok(())
    }

    /// Detaches the authority, notifying every attached session.
    pub fn stop_authority(&mut self) -> Result<(), String> {
        let authority = self.authority()?;
        authority
            .shutdown()
            .map_err(|error| format!("authority shutdown failed: {error}"))
    }

    pub fn open_session(&mut self, name: &str) -> Result<(), String> {
        let session = Session::connect(&self.config, &self.exchange)
            .map_err(|error| format!("session {name} failed to connect: {error}"))?;
        self.sessions.insert(name.to_owned(), session);
        Ok(())
    }

    pub fn session(&self, name: &str) -> Result<&Session, String> {
        self.sessions
            .get(name)
            .ok_or_else(|| format!("no session named {name}"))
    }

    pub fn authority(&self) -> Result<&Authority, String> {
        self.authority
            .as_ref()
            .ok_or_else(|| String::from("no authority running"))
    }

    pub fn create(&mut self, session: &str, federation: &str) -> Result<(), String> {
        let result = self.session(session)?.create_federation(
            federation,
            SchemaRef::new([format!("{federation}.xml")]),
            HlaVersion::Ieee1516e,
        );
        self.last = Some(result.map(|handle| {
            self.federations.insert(federation.to_owned(), handle);
        }));
        Ok(())
    }

    pub fn destroy(&mut self, session: &str, federation: &str) -> Result<(), String> {
        self.last = Some(self.session(session)?.destroy_federation(federation));
        Ok(())
    }

    pub fn join(&mut self, session: &str, federation: &str, federate: &str) -> Result<(), String> {
        let result = self.session(session)?.join_federation(federation, federate);
        self.last = Some(result.map(|(handle, _)| {
            self.federates.insert(federate.to_owned(), handle);
        }));
        Ok(())
    }

    pub fn resign(&mut self, session: &str) -> Result<(), String> {
        self.last = Some(self.session(session)?.resign_federation());
        Ok(())
    }

    /// Registers `label`, restricted to the named federates when any are
    /// given.
    pub fn register(&mut self, session: &str, label: &str, targets: &[&str]) -> Result<(), String> {
        let handles = targets
            .iter()
            .map(|name| self.federate(name))
            .collect::<Result<Vec<_>, _>>()?;
        let result = self
            .session(session)?
            .register_sync_point(label, label.as_bytes(), handles);
        self.last = Some(result);
        Ok(())
    }

    pub fn achieve(&mut self, session: &str, label: &str) -> Result<(), String> {
        self.last = Some(self.session(session)?.achieve_sync_point(label));
        Ok(())
    }

    pub fn broadcast(&mut self, session: &str, payload: &str) -> Result<(), String> {
        let result = self
            .session(session)?
            .send_broadcast(payload.as_bytes().to_vec());
        self.last = Some(result);
        Ok(())
    }

    /// Routes the session's notices to the world's push channel.
    pub fn enable_push(&mut self, session: &str) -> Result<(), String> {
        let listener = Arc::new(ForwardingListener {
            notices: self.pushed_tx.clone(),
            session: session.to_owned(),
        });
        self.session(session)?
            .enable_immediate_callbacks(listener)
            .map_err(|error| format!("enabling immediate callbacks failed: {error}"))
    }

    pub fn federate(&self, name: &str) -> Result<FederateHandle, String> {
        self.federates
            .get(name)
            .copied()
            .ok_or_else(|| format!("federate {name} has not joined"))
    }

    pub fn federation(&self, name: &str) -> Result<FederationHandle, String> {
        self.federations
            .get(name)
            .copied()
            .ok_or_else(|| format!("federation {name} was never created"))
    }

    /// Reads a synchronization point straight from the authority's registry.
    pub fn sync_point(&self, federation: &str, label: &str) -> Result<SyncPoint, String> {
        let federation = self
            .authority()?
            .registry()
            .lookup(federation)
            .map_err(|error| error.to_string())?;
        federation
            .sync_point(label)
            .map_err(|error| error.to_string())?
            .ok_or_else(|| format!("no synchronization point {label}"))
    }

    /// Result of the most recent operation.
    pub fn last(&self) -> Result<&Result<(), RtiError>, String> {
        self.last
            .as_ref()
            .ok_or_else(|| String::from("no operation has run"))
    }

    pub fn last_error_kind(&self) -> Result<ErrorKind, String> {
        match self.last()? {
            Ok(()) => Err(String::from("last operation succeeded")),
            Err(error) => Ok(error.kind()),
        }
    }

    /// Polls the session until a notice satisfying `matches` arrives.
    pub fn await_notice(
        &self,
        session: &str,
        matches: impl Fn(&Notice) -> bool,
    ) -> Result<Notice, String> {
        let session_ref = self.session(session)?;
        let mut seen = Vec::new();
        loop {
            let polled = session_ref
                .poll_callback(NOTICE_WAIT)
                .map_err(|error| format!("polling {session} failed: {error}"))?;
            match polled {
                Some(notice) if matches(&notice) => return Ok(notice),
                Some(notice) => seen.push(notice),
                None => return Err(format!("{session} never received the notice; saw {seen:?}")),
            }
        }
    }

    /// Waits for a pushed notice delivered to `session`.
    pub fn await_pushed(
        &self,
        session: &str,
        matches: impl Fn(&Notice) -> bool,
    ) -> Result<Notice, String> {
        let mut seen = Vec::new();
        loop {
            match self.pushed_rx.recv_timeout(NOTICE_WAIT) {
                Ok((owner, notice)) if owner == session && matches(&notice) => return Ok(notice),
                Ok(other) => seen.push(other),
                Err(_) => return Err(format!("{session} was never pushed the notice; saw {seen:?}")),
            }
        }
    }

    /// Drains whatever the session has queued without waiting.
    pub fn queued(&self, session: &str) -> Result<Vec<Notice>, String> {
        let session_ref = self.session(session)?;
        let mut drained = Vec::new();
        while let Some(notice) = session_ref
            .try_callback()
            .map_err(|error| format!("polling {session} failed: {error}"))?
        {
            drained.push(notice);
        }
        Ok(drained)
    }
}

impl Default for FederationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default federation world fixture.
#[must_use]
pub fn federation_world() -> RefCell<FederationWorld> {
    RefCell::new(FederationWorld::new())
}
