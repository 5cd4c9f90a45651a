use diesel::RunQueryDsl;
use flowvars_persistence::config::DbConfig;
use flowvars_persistence::pg::build_pool;

// Crea y descarta un pool (1x1) varias veces; migraciones idempotentes.
#[test]
fn minimal_pool_create_drop_loop() {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skip (no DATABASE_URL)");
        return;
    }
    let cfg = DbConfig::from_env().expect("config");
    let loops: usize = std::env::var("POOL_LOOPS").ok().and_then(|v| v.parse().ok()).unwrap_or(10);
    for _ in 0..loops {
        let pool = build_pool(&cfg.url, 1, 1).expect("pool");
        let mut conn = pool.get().expect("conn");
        diesel::sql_query("SELECT 1").execute(&mut conn).expect("ping");
    }
}
