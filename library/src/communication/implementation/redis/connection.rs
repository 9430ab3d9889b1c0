use redis::aio::ConnectionLike;
use redis::{Cmd, Pipeline, RedisFuture, Value};

/// Type erased redis connection as handed out by a [`RedisFactory`](super::RedisFactory)
pub struct BoxedConnection(Box<dyn ConnectionLike + Send + Sync>);

impl BoxedConnection {
    /// Erases the type of a concrete connection
    pub fn new<C: ConnectionLike + Send + Sync + 'static>(con: C) -> Self {
        Self(Box::new(con))
    }
}

impl ConnectionLike for BoxedConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        self.0.req_packed_command(cmd)
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        self.0.req_packed_commands(cmd, offset, count)
    }

    fn get_db(&self) -> i64 {
        self.0.get_db()
    }
}
