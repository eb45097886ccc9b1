use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use redis::AsyncCommands;
use redis_instrument::{KeyCodec, RedisClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ─── Constants ───────────────────────────────────────────────────

const NUM_USERS: u64 = 1_000;
/// Pipeline batch size for seeding and batched writes.
const BATCH: u64 = 100;

const PROFILE_KEY: &str = "user:?:profile";
const SESSION_KEY: &str = "session:?";
const VISITS_KEY: &str = "user:?:visits";

/// Every key template the generator issues commands against.
pub const TEMPLATES: [&str; 3] = [PROFILE_KEY, SESSION_KEY, VISITS_KEY];

// ─── Seeding ─────────────────────────────────────────────────────

/// Writes `NUM_USERS` profiles in pipelined batches.
pub async fn seed(keys: &KeyCodec, redis: &RedisClient) -> redis_instrument::Result<()> {
    let start = Instant::now();
    let mut conn = redis.clone();

    for batch_start in (0..NUM_USERS).step_by(BATCH as usize) {
        let mut pipe = redis::pipe();
        for i in batch_start..(batch_start + BATCH).min(NUM_USERS) {
            let key = keys.build(PROFILE_KEY, &[object_id(i)])?;
            pipe.set(key, format!("user #{i}")).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
    }

    info!(
        users = NUM_USERS,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "seed complete"
    );
    Ok(())
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that issue commands until the
/// deadline or the `running` flag is set to false.
pub async fn run(
    running: Arc<AtomicBool>,
    keys: KeyCodec,
    redis: RedisClient,
    concurrency: u32,
    duration_secs: u64,
    read_pct: u8,
) {
    let deadline = Instant::now() + Duration::from_secs(duration_secs);
    let keys = Arc::new(keys);

    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let running = running.clone();
        let keys = keys.clone();
        let conn = redis.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, keys, conn, deadline, read_pct).await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    keys: Arc<KeyCodec>,
    mut conn: RedisClient,
    deadline: Instant,
    read_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let is_read = rng.gen_range(0u8..100) < read_pct;

        let result = if is_read {
            do_read(&mut rng, &keys, &mut conn).await
        } else {
            do_write(&mut rng, &keys, &mut conn).await
        };

        if let Err(e) = result {
            debug!(worker = id, error = %e, "command failed");
        }
    }
}

// ─── Read operation ──────────────────────────────────────────────

async fn do_read(
    rng: &mut StdRng,
    keys: &KeyCodec,
    conn: &mut RedisClient,
) -> redis_instrument::Result<()> {
    // ~10 % of lookups miss on purpose
    let user = rng.gen_range(0..NUM_USERS + NUM_USERS / 10);
    let key = keys.build(PROFILE_KEY, &[object_id(user)])?;

    let _: Option<String> = conn.get(key).await?;
    Ok(())
}

// ─── Write operation ─────────────────────────────────────────────

async fn do_write(
    rng: &mut StdRng,
    keys: &KeyCodec,
    conn: &mut RedisClient,
) -> redis_instrument::Result<()> {
    if rng.gen_bool(0.8) {
        // ── Session with TTL ────────────────────────────────────
        let key = keys.build(SESSION_KEY, &[random_object_id(rng)])?;
        let token = format!("tok_{:016x}", rng.gen::<u64>());
        let _: () = conn.set_ex(key, token, 300).await?;
    } else {
        // ── Batched visit counters ──────────────────────────────
        let mut pipe = redis::pipe();
        for _ in 0..rng.gen_range(2..10) {
            let user = rng.gen_range(0..NUM_USERS);
            pipe.incr(keys.build(VISITS_KEY, &[object_id(user)])?, 1)
                .ignore();
        }
        let _: () = pipe.query_async(conn).await?;
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Id of the first seeded user.
pub fn sample_id() -> String {
    object_id(0)
}

/// Deterministic 24-hex id for user `n`.
fn object_id(n: u64) -> String {
    format!("65f0c0de{n:016x}")
}

fn random_object_id(rng: &mut StdRng) -> String {
    format!("{:08x}{:016x}", rng.gen::<u32>(), rng.gen::<u64>())
}
