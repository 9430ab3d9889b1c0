use futures::future::{BoxFuture, Shared};
use futures::lock::Mutex;
use futures::FutureExt;
use jatsl::TaskResourceHandle;
use lazy_static::lazy_static;
use redis::aio::{Connection, ConnectionLike, MultiplexedConnection};
use redis::{Client, Cmd, Pipeline, RedisError, RedisFuture, RedisResult, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tokio::task;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, trace, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);
const MIN_RETRY_INTERVAL: Duration = Duration::from_secs(2);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(30);

type SharedConnectionFuture = Shared<BoxFuture<'static, MultiplexedConnection>>;

/// Multiplexed connection to one server and the task handles depending on it
#[derive(Default)]
struct SharedSlot {
    connection: Option<SharedConnectionFuture>,
    dependents: HashSet<TaskResourceHandle>,
}

lazy_static! {
    static ref SHARED_SLOTS: Mutex<HashMap<String, SharedSlot>> = Mutex::new(HashMap::new());
}

/// Whether an error means that the connection is no longer usable
fn is_disconnect(error: &RedisError) -> bool {
    error.is_connection_dropped()
        || error.is_io_error()
        || error.is_connection_refusal()
        || error.is_timeout()
}

fn retry_interval(attempt: u32) -> Duration {
    MIN_RETRY_INTERVAL
        .checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_RETRY_INTERVAL)
        .min(MAX_RETRY_INTERVAL)
}

/// Keeps trying to connect, backing off between attempts
async fn connect_with_retry<C, F, Fut>(client: Client, connect: F) -> C
where
    F: Fn(Client) -> Fut,
    Fut: Future<Output = RedisResult<C>>,
{
    let mut attempt = 0;

    loop {
        trace!(attempt, "Connecting to redis");

        match timeout(CONNECT_TIMEOUT, connect(client.clone())).await {
            Ok(Ok(connection)) => return connection,
            Ok(Err(error)) => warn!(?error, attempt, "Failed to connect to redis"),
            Err(_) => warn!(attempt, "Timed out connecting to redis"),
        }

        sleep(retry_interval(attempt)).await;
        attempt += 1;
    }
}

enum Ownership {
    Owned,
    Shared { url: String },
}

/// Redis connection which reports its loss to the task resource handle it was created for
///
/// Shared connections are multiplexed across every task of the process that talks to the same
/// server. When one of them observes the connection dropping, the connection is discarded and
/// every dependent task is notified so that the scheduler can restart them.
pub struct MonitoredConnection<C> {
    con: C,
    handle: TaskResourceHandle,
    ownership: Ownership,
}

impl MonitoredConnection<Connection> {
    /// Opens a dedicated connection, required for blocking commands
    #[instrument(skip(handle))]
    pub async fn owned(handle: TaskResourceHandle, url: &str) -> RedisResult<Self> {
        debug!("Opening dedicated redis connection");

        let client = Client::open(url)?;
        let con = connect_with_retry(client, |client| async move {
            client.get_async_connection().await
        })
        .await;

        Ok(Self {
            con,
            handle,
            ownership: Ownership::Owned,
        })
    }
}

impl MonitoredConnection<MultiplexedConnection> {
    /// Joins the multiplexed connection to the server, establishing it if necessary
    #[instrument(skip(handle))]
    pub async fn shared(handle: TaskResourceHandle, url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;

        let future = {
            let mut slots = SHARED_SLOTS.lock().await;
            let slot = slots.entry(url.to_owned()).or_default();
            slot.dependents.insert(handle.clone());

            match &slot.connection {
                Some(future) => {
                    trace!("Reusing shared redis connection");
                    future.clone()
                }
                None => {
                    debug!("Establishing shared redis connection");
                    let future = connect_with_retry(client, |client| async move {
                        client.get_multiplexed_tokio_connection().await
                    })
                    .boxed()
                    .shared();

                    slot.connection = Some(future.clone());
                    future
                }
            }
        };

        Ok(Self {
            con: future.await,
            handle,
            ownership: Ownership::Shared {
                url: url.to_owned(),
            },
        })
    }
}

impl<C> MonitoredConnection<C> {
    async fn report_disconnect(&mut self, error: &RedisError) {
        error!(?error, "Redis connection lost");
        self.handle.resource_died().await;

        if let Ownership::Shared { url } = &self.ownership {
            let dependents: Vec<TaskResourceHandle> = {
                let mut slots = SHARED_SLOTS.lock().await;
                match slots.get_mut(url) {
                    Some(slot) => {
                        slot.connection = None;
                        slot.dependents.iter().cloned().collect()
                    }
                    None => Vec::new(),
                }
            };

            trace!(count = dependents.len(), "Notifying tasks sharing the connection");
            for mut dependent in dependents.into_iter().filter(|h| *h != self.handle) {
                dependent.resource_died().await;
            }
        }

        task::yield_now().await;
    }
}

impl<C> Drop for MonitoredConnection<C> {
    fn drop(&mut self) {
        if let Ownership::Shared { url } = &self.ownership {
            let url = url.clone();
            let handle = self.handle.clone();

            // The registry lock is async, deregister in the background
            task::spawn(async move {
                if let Some(slot) = SHARED_SLOTS.lock().await.get_mut(&url) {
                    slot.dependents.remove(&handle);
                }
            });
        }
    }
}

impl<C: ConnectionLike + Send> ConnectionLike for MonitoredConnection<C> {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        async move {
            let result = self.con.req_packed_command(cmd).await;

            if let Err(error) = &result {
                if is_disconnect(error) {
                    self.report_disconnect(error).await;
                }
            }

            result
        }
        .boxed()
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        async move {
            let result = self.con.req_packed_commands(cmd, offset, count).await;

            if let Err(error) = &result {
                if is_disconnect(error) {
                    self.report_disconnect(error).await;
                }
            }

            result
        }
        .boxed()
    }

    fn get_db(&self) -> i64 {
        self.con.get_db()
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn back_off_up_to_a_limit() {
        assert_eq!(retry_interval(0), Duration::from_secs(2));
        assert_eq!(retry_interval(1), Duration::from_secs(4));
        assert_eq!(retry_interval(3), Duration::from_secs(16));
        assert_eq!(retry_interval(4), MAX_RETRY_INTERVAL);
        assert_eq!(retry_interval(40), MAX_RETRY_INTERVAL);
    }
}
