//! Terminal session lifecycle.
//!
//! A [`Session`] owns the terminal handle, created lazily from a connector
//! closure on first use. Lifecycle changes take `&mut self`; queries go
//! through [`Session::terminal`], which refuses to hand out the handle until
//! the session is initialized.

use once_cell::unsync::OnceCell;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::{error, info, warn};

use mt5_core::{ConnectionConfig, ErrorRecord, Mt5Error, Mt5Result, Terminal};
use mt5_telemetry::Metrics;

type Connector<T> = Box<dyn Fn() -> T + Send>;
type Sleeper = Box<dyn Fn(Duration) + Send>;

/// Connection to one terminal.
pub struct Session<T: Terminal> {
    connector: Connector<T>,
    handle: OnceCell<T>,
    config: ConnectionConfig,
    is_initialized: bool,
    sleep: Sleeper,
}

impl<T: Terminal> Session<T> {
    /// Create a session. `connector` builds the terminal handle on first use;
    /// `config` is what [`Connectable::connect`] opens with.
    pub fn new(connector: impl Fn() -> T + Send + 'static, config: ConnectionConfig) -> Self {
        Self {
            connector: Box::new(connector),
            handle: OnceCell::new(),
            config,
            is_initialized: false,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace the delay used between connection retries.
    #[must_use]
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn handle(&self) -> &T {
        self.handle.get_or_init(|| (self.connector)())
    }

    /// The terminal handle, once the session is initialized.
    pub fn terminal(&self) -> Mt5Result<&T> {
        if !self.is_initialized {
            return Err(Mt5Error::NotInitialized);
        }
        Ok(self.handle())
    }

    /// Build the error for a failed binding call from the terminal's last
    /// error pair, log it, and count it.
    pub fn fail(&self, operation: &str, context: Option<String>) -> Mt5Error {
        let record = ErrorRecord::new(operation, self.handle().last_error(), context);
        error!(operation, code = record.code, "{record}");
        Metrics::binding_failure(operation);
        Mt5Error::Binding(record)
    }

    /// Open the terminal connection. No-op if already initialized.
    ///
    /// Only the config fields that are set are passed on. The password is
    /// never included in error context.
    pub fn open(&mut self, config: &ConnectionConfig) -> Mt5Result<bool> {
        if self.is_initialized {
            return Ok(true);
        }

        let ok = self.handle().initialize(config);
        Metrics::connect_attempt(ok);
        if !ok {
            let context = config.describe();
            let context = (!context.is_empty()).then_some(context);
            return Err(self.fail("initialize", context));
        }

        self.is_initialized = true;
        Metrics::session_opened();
        info!("MetaTrader5 connection initialized successfully");
        Ok(true)
    }

    /// Open with up to `retry_count` retries.
    ///
    /// Before retry `i` (1-based) the session sleeps `i` seconds. Only
    /// binding failures are retried; other errors return immediately.
    pub fn open_with_retry(&mut self, config: &ConnectionConfig, retry_count: u32) -> Mt5Result<()> {
        for attempt in 0..=retry_count {
            if attempt > 0 {
                warn!(attempt, retry_count, "Retrying MetaTrader5 initialization");
                (self.sleep)(Duration::from_secs(u64::from(attempt)));
            }
            match self.open(config) {
                Ok(_) => {
                    info!(attempt, "MetaTrader5 initialization successful");
                    return Ok(());
                }
                Err(Mt5Error::Binding(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(self.fail("initialize", Some(format!("after {retry_count} retries"))))
    }

    /// Shut the terminal down and drop the handle. No-op if not initialized.
    pub fn close(&mut self) {
        if !self.is_initialized {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
        }
        self.is_initialized = false;
        Metrics::session_closed();
        info!("MetaTrader5 connection shutdown");
    }

    /// Log in to a trading account on the connected terminal.
    pub fn login(
        &self,
        login: i64,
        password: &str,
        server: &str,
        timeout: Option<u64>,
    ) -> Mt5Result<bool> {
        let terminal = self.terminal()?;
        if terminal.login(login, password, server, timeout) {
            info!(login, server, "Logged in to trading account");
            return Ok(true);
        }
        let timeout = timeout.map_or_else(|| "None".to_string(), |t| t.to_string());
        Err(self.fail(
            "login",
            Some(format!("login={login}, server={server}, timeout={timeout}")),
        ))
    }

    /// The terminal's last `(code, description)` pair.
    pub fn last_error(&self) -> (i32, String) {
        self.handle().last_error()
    }
}

impl<T: Terminal> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Anything that can open and close a terminal connection.
pub trait Connectable {
    fn connect(&mut self) -> Mt5Result<()>;

    fn disconnect(&mut self);
}

impl<T: Terminal> Connectable for Session<T> {
    fn connect(&mut self) -> Mt5Result<()> {
        let config = self.config.clone();
        self.open(&config).map(|_| ())
    }

    fn disconnect(&mut self) {
        self.close();
    }
}

/// Scoped connection: connected on acquire, disconnected on drop.
pub struct Connected<'a, C: Connectable> {
    inner: &'a mut C,
}

impl<'a, C: Connectable> Connected<'a, C> {
    pub fn acquire(inner: &'a mut C) -> Mt5Result<Self> {
        inner.connect()?;
        Ok(Self { inner })
    }
}

impl<C: Connectable> Deref for Connected<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.inner
    }
}

impl<C: Connectable> DerefMut for Connected<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.inner
    }
}

impl<C: Connectable> Drop for Connected<'_, C> {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt5_core::testing::FakeTerminal;
    use std::sync::{Arc, Mutex};

    fn session(fake: &FakeTerminal) -> Session<FakeTerminal> {
        let fake = fake.clone();
        Session::new(move || fake.clone(), ConnectionConfig::default()).with_sleep(|_| {})
    }

    fn recording_session(fake: &FakeTerminal) -> (Session<FakeTerminal>, Arc<Mutex<Vec<u64>>>) {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let recorded = sleeps.clone();
        let session = session(fake).with_sleep(move |d| recorded.lock().unwrap().push(d.as_secs()));
        (session, sleeps)
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    #[test]
    fn test_queries_require_initialization() {
        let fake = FakeTerminal::new();
        let session = session(&fake);
        assert!(matches!(session.terminal(), Err(Mt5Error::NotInitialized)));
        assert!(matches!(
            session.login(1, "pw", "srv", None),
            Err(Mt5Error::NotInitialized)
        ));
    }

    #[test]
    fn test_open_is_noop_when_initialized() {
        let fake = FakeTerminal::new();
        let mut session = session(&fake);
        assert!(session.open(&ConnectionConfig::default()).unwrap());
        assert!(session.open(&ConnectionConfig::default()).unwrap());
        assert_eq!(fake.call_count("initialize"), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let fake = FakeTerminal::new();
        let mut session = session(&fake);
        session.open(&ConnectionConfig::default()).unwrap();

        session.close();
        session.close();

        assert_eq!(fake.call_count("shutdown"), 1);
        assert!(!session.is_initialized());
    }

    #[test]
    fn test_close_without_open_does_nothing() {
        let fake = FakeTerminal::new();
        let mut session = session(&fake);
        session.close();
        assert_eq!(fake.call_count("shutdown"), 0);
    }

    #[test]
    fn test_drop_shuts_down() {
        let fake = FakeTerminal::new();
        {
            let mut session = session(&fake);
            session.open(&ConnectionConfig::default()).unwrap();
        }
        assert_eq!(fake.call_count("shutdown"), 1);
    }

    #[test]
    fn test_open_failure_redacts_password() {
        let fake = FakeTerminal::new();
        fake.fail("initialize");
        let mut session = session(&fake);
        let config = ConnectionConfig {
            login: Some(42),
            password: Some("secret".to_string()),
            ..ConnectionConfig::default()
        };

        let err = session.open(&config).unwrap_err();
        let message = err.to_string();

        assert!(message.starts_with("initialize failed: -1 - Terminal call failed"));
        assert!(message.contains("login=42"));
        assert!(!message.contains("secret"));
        assert!(!session.is_initialized());
    }

    // ====================================================================
    // Retry
    // ====================================================================

    #[test]
    fn test_retry_exhaustion() {
        let fake = FakeTerminal::new();
        fake.fail("initialize");
        let (mut session, sleeps) = recording_session(&fake);

        let err = session
            .open_with_retry(&ConnectionConfig::default(), 3)
            .unwrap_err();

        assert_eq!(fake.call_count("initialize"), 4);
        assert_eq!(*sleeps.lock().unwrap(), vec![1, 2, 3]);
        let record = err.record().unwrap();
        assert_eq!(record.operation, "initialize");
        assert_eq!(record.context.as_deref(), Some("after 3 retries"));
    }

    #[test]
    fn test_retry_succeeds_after_failures() {
        let fake = FakeTerminal::new();
        fake.script_initialize([false, false, true]);
        let (mut session, sleeps) = recording_session(&fake);

        session
            .open_with_retry(&ConnectionConfig::default(), 3)
            .unwrap();

        assert!(session.is_initialized());
        assert_eq!(fake.call_count("initialize"), 3);
        assert_eq!(*sleeps.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let fake = FakeTerminal::new();
        fake.fail("initialize");
        let (mut session, sleeps) = recording_session(&fake);

        assert!(session.open_with_retry(&ConnectionConfig::default(), 0).is_err());
        assert_eq!(fake.call_count("initialize"), 1);
        assert!(sleeps.lock().unwrap().is_empty());
    }

    // ====================================================================
    // Login / guard
    // ====================================================================

    #[test]
    fn test_login_failure_context_omits_password() {
        let fake = FakeTerminal::new();
        fake.fail("login");
        let mut session = session(&fake);
        session.open(&ConnectionConfig::default()).unwrap();

        let err = session.login(7, "hunter2", "Demo", Some(1000)).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("login=7, server=Demo, timeout=1000"));
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn test_connected_guard_closes_on_drop() {
        let fake = FakeTerminal::new();
        let mut session = session(&fake);
        {
            let guard = Connected::acquire(&mut session).unwrap();
            assert!(guard.is_initialized());
        }
        assert!(!session.is_initialized());
        assert_eq!(fake.call_count("shutdown"), 1);
    }

    #[test]
    fn test_connected_guard_propagates_open_error() {
        let fake = FakeTerminal::new();
        fake.fail("initialize");
        let mut session = session(&fake);
        assert!(Connected::acquire(&mut session).is_err());
        assert_eq!(fake.call_count("shutdown"), 0);
    }

    #[test]
    fn test_handle_created_once() {
        let fake = FakeTerminal::new();
        let created = Arc::new(Mutex::new(0));
        let counter = created.clone();
        let inner = fake.clone();
        let mut session = Session::new(
            move || {
                *counter.lock().unwrap() += 1;
                inner.clone()
            },
            ConnectionConfig::default(),
        );
        session.open(&ConnectionConfig::default()).unwrap();
        session.terminal().unwrap();
        session.last_error();
        assert_eq!(*created.lock().unwrap(), 1);
    }
}
