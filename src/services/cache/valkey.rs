use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

// KEYS[1] = key, ARGV[1] = expected, ARGV[2] = new value, ARGV[3] = ttl (ms)
const COMPARE_AND_SET: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
    return 1
end
return 0
"#;

/// Valkey/Redis-backend cache client.
///
/// Intentionally small: only the operations the shared rate-limit store needs.
#[derive(Clone, Debug)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

// PX expects integer milliseconds. We clamp to at least 1 ms.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

// `SET key value NX PX <millis>`
fn set_if_absent_cmd(key: &str, value: &str, ttl: Duration) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value).arg("NX").arg("PX").arg(ttl_millis(ttl));
    cmd
}

// EVAL runs the GET + SET atomically on the server.
// Argument order must match the KEYS/ARGV layout of COMPARE_AND_SET.
fn compare_and_set_cmd(key: &str, expected: &str, value: &str, ttl: Duration) -> redis::Cmd {
    let mut cmd = redis::cmd("EVAL");
    cmd.arg(COMPARE_AND_SET)
        .arg(1)
        .arg(key)
        .arg(expected)
        .arg(value)
        .arg(ttl_millis(ttl));
    cmd
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        // Use a clone of the connection manager
        let mut conn = self.manager.clone();

        let resp: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(resp)
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        // returns:
        // - `OK` if set
        // - Nil if not set
        let mut conn = self.manager.clone();

        let resp: Option<String> = set_if_absent_cmd(key, value, ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(resp.is_some())
    }

    async fn compare_and_set_with_ttl(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let mut conn = self.manager.clone();

        let replaced: i64 = compare_and_set_cmd(key, expected, value, ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(replaced == 1)
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();

        // DEL returns number of keys removed (0 or 1 for a single key).
        let n: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(n)
    }
}
