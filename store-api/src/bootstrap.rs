//! Startup sequence: connect the store, then the channel, then serve.
//!
//! Both dependencies go through the same [`RetryPolicy`]; whether running out
//! of attempts stops the process is decided per dependency by
//! [`OnExhausted`]. The store is always fatal.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::error::StartupError;
use crate::notifier::{DisabledPublisher, Publisher, RedisPublisher};

/// Bounded retry loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub interval: Duration,
    /// Upper bound of the random delay added to each wait
    pub jitter: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            jitter: Duration::ZERO,
        }
    }

    /// Single attempt, no waiting
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait before the next attempt: `interval + rand(0..=jitter)`
    pub fn delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.interval;
        }
        self.interval + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// What to do when a dependency is still unreachable after its last attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnExhausted {
    /// Abort startup
    #[default]
    Fatal,
    /// Start anyway with the dependency disabled
    Degrade,
}

/// Per-dependency startup policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyPolicy {
    pub retry: RetryPolicy,
    pub on_exhausted: OnExhausted,
}

impl DependencyPolicy {
    pub const fn fatal(retry: RetryPolicy) -> Self {
        Self {
            retry,
            on_exhausted: OnExhausted::Fatal,
        }
    }
}

/// Returned by [`retry`] once every attempt has failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or `policy` runs out of attempts.
///
/// `op` receives the 1-based attempt number. There is no wait after the
/// final attempt.
pub async fn retry<T, E, F, Fut>(
    dependency: &'static str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    dependency,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Connection attempt failed, giving up"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay();
                warn!(
                    dependency,
                    attempt,
                    max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Connection attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Process startup phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Uninitialized,
    StoreConnecting,
    StoreReady,
    ChannelConnecting,
    ChannelReady,
    Serving,
}

impl StartupPhase {
    pub fn next(self) -> Option<StartupPhase> {
        use StartupPhase::*;
        match self {
            Uninitialized => Some(StoreConnecting),
            StoreConnecting => Some(StoreReady),
            StoreReady => Some(ChannelConnecting),
            ChannelConnecting => Some(ChannelReady),
            ChannelReady => Some(Serving),
            Serving => None,
        }
    }
}

/// Startup state machine. Only forward, one step at a time.
#[derive(Debug)]
pub struct Startup {
    phase: StartupPhase,
}

impl Default for Startup {
    fn default() -> Self {
        Self::new()
    }
}

impl Startup {
    pub fn new() -> Self {
        Self {
            phase: StartupPhase::Uninitialized,
        }
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    pub fn is_serving(&self) -> bool {
        self.phase == StartupPhase::Serving
    }

    pub fn advance(&mut self, to: StartupPhase) -> Result<(), StartupError> {
        if self.phase.next() != Some(to) {
            return Err(StartupError::Transition {
                from: self.phase,
                to,
            });
        }
        info!(phase = ?to, "Startup phase");
        self.phase = to;
        Ok(())
    }

    /// Connect the store: `StoreConnecting` → retry `connect` → `StoreReady`.
    ///
    /// Exhaustion is always fatal; the phase stays at `StoreConnecting`.
    pub async fn connect_store<T, E, F, Fut>(
        &mut self,
        policy: &RetryPolicy,
        connect: F,
    ) -> Result<T, StartupError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.advance(StartupPhase::StoreConnecting)?;
        let value = retry("postgres", policy, connect)
            .await
            .map_err(|e| unreachable_error("postgres", e))?;
        self.advance(StartupPhase::StoreReady)?;
        Ok(value)
    }

    /// Connect the channel: `ChannelConnecting` → retry `connect` → `ChannelReady`.
    ///
    /// With [`OnExhausted::Degrade`] the phase still reaches `ChannelReady`
    /// and `Ok(None)` is returned.
    pub async fn connect_channel<T, E, F, Fut>(
        &mut self,
        policy: &DependencyPolicy,
        connect: F,
    ) -> Result<Option<T>, StartupError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.advance(StartupPhase::ChannelConnecting)?;
        let value = match retry("redis", &policy.retry, connect).await {
            Ok(value) => Some(value),
            Err(e) if policy.on_exhausted == OnExhausted::Degrade => {
                warn!(
                    attempts = e.attempts,
                    error = %e.last_error,
                    "Notification channel unreachable, starting without announcements"
                );
                None
            }
            Err(e) => return Err(unreachable_error("redis", e)),
        };
        self.advance(StartupPhase::ChannelReady)?;
        Ok(value)
    }
}

fn unreachable_error<E: Display>(dependency: &'static str, e: RetryExhausted<E>) -> StartupError {
    StartupError::Unreachable {
        dependency,
        attempts: e.attempts,
        reason: e.last_error.to_string(),
    }
}

/// Live handles, acquired once and held for the process lifetime
pub struct Dependencies {
    pub pool: PgPool,
    pub publisher: Arc<dyn Publisher>,
}

/// Bring up the store (with schema) and the channel.
///
/// Leaves `startup` at `ChannelReady`; the caller moves it to `Serving`
/// once the listener is bound.
pub async fn bootstrap(
    config: &Config,
    startup: &mut Startup,
) -> Result<Dependencies, StartupError> {
    let pool = startup
        .connect_store(&config.database.connect, |_| db::connect(&config.database))
        .await?;
    info!("Connected to Database");

    // still StoreReady only after the schema exists
    db::migrate(&pool).await?;
    info!("Database schema ready");

    let publisher: Arc<dyn Publisher> = match startup
        .connect_channel(&config.redis.connect, |_| RedisPublisher::connect(&config.redis))
        .await?
    {
        Some(publisher) => {
            info!("Connected to Redis");
            Arc::new(publisher)
        }
        None => Arc::new(DisabledPublisher::new("redis unreachable at startup")),
    };

    Ok(Dependencies { pool, publisher })
}
