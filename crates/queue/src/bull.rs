//! Redis-backed [`JobQueue`] using the Bull key layout.
//!
//! The external worker consumes jobs with a Bull-compatible client, so jobs
//! are written the way Bull's own `addJob` does it:
//!
//! ```text
//! {prefix}:{queue}:{job_id}     hash  name, data, opts, timestamp, delay, priority
//! {prefix}:{queue}:wait         list  runnable job ids (LPUSH = FIFO)
//! {prefix}:{queue}:paused       list  used instead of `wait` while paused
//! {prefix}:{queue}:meta-paused  key   present while the queue is paused
//! ```
//!
//! Insertion runs as one Lua script so the existence check (dedupe on the
//! job id) and the push are atomic.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use serde::Serialize;

use imgflow_core::Job;

use crate::queue::{EnqueueReceipt, JobQueue, QueueError};

/// KEYS: job hash, wait, paused, meta-paused.
/// ARGV: job id, name, data, opts, timestamp, push command.
/// Returns `{job_id, created}` where `created` is 1 for a new job.
const ADD_JOB_SCRIPT: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 1 then
  return {ARGV[1], 0}
end
redis.call("HSET", KEYS[1],
  "name", ARGV[2],
  "data", ARGV[3],
  "opts", ARGV[4],
  "timestamp", ARGV[5],
  "delay", "0",
  "priority", "0")
local target = KEYS[2]
if redis.call("EXISTS", KEYS[4]) == 1 then
  target = KEYS[3]
end
redis.call(ARGV[6], target, ARGV[1])
redis.call("PUBLISH", KEYS[2], ARGV[1])
return {ARGV[1], 1}
"#;

/// Queue metadata stored in the job hash's `opts` field.
///
/// Single attempt, no backoff: retries would change the dedupe assumptions
/// the upload flow relies on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub job_id: String,
    pub attempts: u32,
    pub backoff: u64,
    pub delay: u64,
    pub lifo: bool,
    pub priority: u32,
    pub remove_on_complete: u32,
    pub remove_on_fail: u32,
    pub timeout: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl JobOptions {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            attempts: 1,
            backoff: 0,
            delay: 0,
            lifo: false,
            priority: 0,
            remove_on_complete: 10,
            remove_on_fail: 1,
            timeout: 0,
            timestamp: job.enqueued_at.timestamp_millis(),
        }
    }

    fn push_command(&self) -> &'static str {
        if self.lifo {
            "RPUSH"
        } else {
            "LPUSH"
        }
    }
}

/// Key names for one Bull queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    base: String,
}

impl QueueKeys {
    pub fn new(prefix: &str, queue_name: &str) -> Self {
        Self {
            base: format!("{prefix}:{queue_name}"),
        }
    }

    pub fn job(&self, job_id: &str) -> String {
        format!("{}:{job_id}", self.base)
    }

    pub fn wait(&self) -> String {
        format!("{}:wait", self.base)
    }

    pub fn paused(&self) -> String {
        format!("{}:paused", self.base)
    }

    pub fn meta_paused(&self) -> String {
        format!("{}:meta-paused", self.base)
    }
}

/// Production [`JobQueue`] backed by Redis.
///
/// Cheap to clone; the underlying [`ConnectionManager`] multiplexes one
/// connection and reconnects on its own after transport errors.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    keys: QueueKeys,
    script: Script,
}

impl RedisJobQueue {
    /// Connect to Redis at `redis_url` and target the queue
    /// `{prefix}:{queue_name}`.
    pub async fn connect(
        redis_url: &str,
        queue_name: &str,
        prefix: &str,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!(queue = queue_name, prefix, "Job queue connected");

        Ok(Self {
            conn,
            keys: QueueKeys::new(prefix, queue_name),
            script: Script::new(ADD_JOB_SCRIPT),
        })
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<EnqueueReceipt, QueueError> {
        job.validate()?;

        let data = serde_json::to_string(&job.payload())?;
        let opts = JobOptions::for_job(job);
        let push_command = opts.push_command();
        let opts = serde_json::to_string(&opts)?;

        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(self.keys.job(&job.job_id))
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta_paused())
            .arg(&job.job_id)
            .arg(&job.pattern)
            .arg(data)
            .arg(opts)
            .arg(job.enqueued_at.timestamp_millis())
            .arg(push_command);

        let mut conn = self.conn.clone();
        let (job_id, created): (String, i64) = invocation.invoke_async(&mut conn).await?;

        if job_id != job.job_id {
            return Err(QueueError::UnexpectedReply(format!(
                "script returned job id {job_id}, expected {}",
                job.job_id
            )));
        }

        Ok(if created == 1 {
            EnqueueReceipt::Created
        } else {
            EnqueueReceipt::Duplicate
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(QueueError::UnexpectedReply(pong))
        }
    }
}
