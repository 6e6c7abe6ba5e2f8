use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tower_cookies::Cookies;
use tower_sessions_core::{
    SessionStore,
    session::{Id, Record},
    session_store,
};

use crate::{
    codec::{Codec, DecodedSession, SessionValue},
    config::CookieSessionConfig,
};

/// Record lifetime when no expiration policy is configured.
const UNBOUNDED_RECORD_LIFETIME: Duration = Duration::weeks(2);

/// Request-scoped store: serves the value decoded from the request cookie and writes a new cookie
/// only when the lifecycle policy asks for one.
#[derive(Debug)]
pub(crate) struct CookieStore {
    cookies: Cookies,
    codec: Arc<Codec>,
    config: CookieSessionConfig,
    original: Option<DecodedSession>,
    decoded_record: Mutex<Option<Record>>,
    cookie_written: AtomicBool,
    cookie_removed: AtomicBool,
}

impl CookieStore {
    pub(crate) fn new(
        cookies: Cookies,
        codec: Arc<Codec>,
        config: CookieSessionConfig,
        session_id: Option<Id>,
        original: Option<DecodedSession>,
        initial_cookie_removed: bool,
    ) -> Self {
        let decoded_record = session_id
            .zip(original.as_ref())
            .map(|(id, decoded)| Record {
                id,
                data: decoded.value.clone(),
                expiry_date: OffsetDateTime::now_utc()
                    + config
                        .policy
                        .expire_after()
                        .unwrap_or(UNBOUNDED_RECORD_LIFETIME),
            });

        Self {
            cookies,
            codec,
            config,
            original,
            decoded_record: Mutex::new(decoded_record),
            cookie_written: AtomicBool::new(false),
            cookie_removed: AtomicBool::new(initial_cookie_removed),
        }
    }

    pub(crate) fn did_write_cookie(&self) -> bool {
        self.cookie_written.load(Ordering::Acquire)
    }

    pub(crate) fn did_remove_cookie(&self) -> bool {
        self.cookie_removed.load(Ordering::Acquire)
    }

    pub(crate) fn remove_cookie(&self) {
        remove_session_cookie(&self.cookies, &self.config);
        self.cookie_removed.store(true, Ordering::Release);
    }

    /// Whether the request's token is old enough to be renewed even if unchanged.
    pub(crate) fn refresh_due(&self, now: OffsetDateTime) -> bool {
        self.original
            .as_ref()
            .is_some_and(|original| self.config.policy.refresh_due(original.issued_at, now))
    }

    fn original_value(&self) -> Option<&SessionValue> {
        self.original.as_ref().map(|original| &original.value)
    }

    fn load_cached_record(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let guard = self
            .decoded_record
            .lock()
            .map_err(|_| session_store::Error::Backend("cookie store lock is poisoned".into()))?;

        Ok(guard
            .as_ref()
            .filter(|record| record.id == *session_id)
            .cloned())
    }

    fn persist_record(&self, record: &Record, force: bool) -> session_store::Result<()> {
        let now = OffsetDateTime::now_utc();
        let reissue = force
            || self.config.always_save
            || self.config.policy.should_reissue(
                self.original_value(),
                &record.data,
                self.original.as_ref().and_then(|original| original.issued_at),
                now,
            );

        if reissue {
            let value = self
                .codec
                .encode_at(&record.data, self.config.policy.expire_after(), now)
                .map_err(|err| session_store::Error::Encode(err.to_string()))?;
            let cookie = self.config.build_cookie(value);
            if cookie.value().len() > self.config.max_cookie_bytes {
                return Err(session_store::Error::Encode(format!(
                    "Cookie value exceeds max_cookie_bytes ({} > {})",
                    cookie.value().len(),
                    self.config.max_cookie_bytes
                )));
            }

            self.cookies.add(cookie);
            self.cookie_written.store(true, Ordering::Release);
        } else {
            tracing::trace!("session unchanged and fresh, keeping client token");
        }

        let mut guard = self
            .decoded_record
            .lock()
            .map_err(|_| session_store::Error::Backend("cookie store lock is poisoned".into()))?;
        *guard = Some(record.clone());

        Ok(())
    }
}

pub(crate) fn remove_session_cookie(cookies: &Cookies, config: &CookieSessionConfig) {
    cookies.remove(config.removal_cookie());
}

#[async_trait]
impl SessionStore for CookieStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // A created record never matches the client's token, even when the data does.
        self.persist_record(record, true)
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.persist_record(record, false)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        self.load_cached_record(session_id)
    }

    async fn delete(&self, _session_id: &Id) -> session_store::Result<()> {
        self.remove_cookie();

        let mut guard = self
            .decoded_record
            .lock()
            .map_err(|_| session_store::Error::Backend("cookie store lock is poisoned".into()))?;
        *guard = None;

        Ok(())
    }
}
