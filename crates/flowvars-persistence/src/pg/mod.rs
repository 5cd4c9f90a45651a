//! Implementación Postgres (Diesel) de `VariableRecordStore`.
//!
//! - `runtime_variables`: una fila por slot durable, upsert por
//!   (instancia, scope, nombre).
//! - `historic_variables`: append-only con orden total por `seq`
//!   (BIGSERIAL); nunca se actualiza ni se borra.
//! - `commit` aplica el batch completo en UNA transacción read-write; si
//!   cualquier operación falla se revierte todo.
//! - Errores transitorios (conflicto de serialización, pool, desconexión) se
//!   reintentan con backoff corto.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, error, warn};
use uuid::Uuid;

use flowvars_core::{HistoricVariableRecord, RecordBatch, RecordOp, RuntimeVariableRecord, ScopeId, SerializedValue,
                    ValueType, VariableError, VariableRecordStore};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{historic_variables, runtime_variables};

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Fila para upsert en `runtime_variables`. Las columnas de valor se
/// escriben siempre (incluido NULL) para que un cambio de tipo no deje
/// restos del valor anterior.
#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = runtime_variables, treat_none_as_null = true)]
pub struct NewRuntimeRow<'a> {
    pub instance_id: Uuid,
    pub scope_id: i32,
    pub name: &'a str,
    pub value_type: &'static str,
    pub text_value: Option<&'a str>,
    pub text2_value: Option<&'a str>,
    pub long_value: Option<i64>,
    pub double_value: Option<f64>,
    pub bytes_value: Option<&'a [u8]>,
    pub serialization_format: Option<&'a str>,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

/// Fila para insertar en `historic_variables`; `seq` lo asigna la base.
#[derive(Insertable, Debug)]
#[diesel(table_name = historic_variables)]
pub struct NewHistoricRow<'a> {
    pub instance_id: Uuid,
    pub scope_id: i32,
    pub name: &'a str,
    pub value_type: &'static str,
    pub text_value: Option<&'a str>,
    pub text2_value: Option<&'a str>,
    pub long_value: Option<i64>,
    pub double_value: Option<f64>,
    pub bytes_value: Option<&'a [u8]>,
    pub serialization_format: Option<&'a str>,
    pub revision: i64,
    pub created: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Fila mapeada de `runtime_variables` (orden de columnas del schema).
#[derive(Queryable, Debug)]
pub struct RuntimeRow {
    pub instance_id: Uuid,
    pub scope_id: i32,
    pub name: String,
    pub value_type: String,
    pub text_value: Option<String>,
    pub text2_value: Option<String>,
    pub long_value: Option<i64>,
    pub double_value: Option<f64>,
    pub bytes_value: Option<Vec<u8>>,
    pub serialization_format: Option<String>,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

/// Fila mapeada de `historic_variables` (orden de columnas del schema).
#[derive(Queryable, Debug)]
pub struct HistoricRow {
    pub seq: i64,
    pub instance_id: Uuid,
    pub scope_id: i32,
    pub name: String,
    pub value_type: String,
    pub text_value: Option<String>,
    pub text2_value: Option<String>,
    pub long_value: Option<i64>,
    pub double_value: Option<f64>,
    pub bytes_value: Option<Vec<u8>>,
    pub serialization_format: Option<String>,
    pub revision: i64,
    pub created: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Operación del batch ya traducida a filas/columnas.
#[derive(Debug)]
enum PgOp<'a> {
    Upsert(NewRuntimeRow<'a>),
    Delete { scope_id: i32, name: &'a str },
    DeleteScope(i32),
    DeleteInstance,
    Append(NewHistoricRow<'a>),
}

fn scope_column(scope: ScopeId) -> Result<i32, PersistenceError> {
    i32::try_from(scope.0).map_err(|_| PersistenceError::CheckViolation(format!("{scope} out of range")))
}

fn revision_column(revision: u64) -> Result<i64, PersistenceError> {
    i64::try_from(revision).map_err(|_| PersistenceError::CheckViolation(format!("revision {revision} out of range")))
}

fn translate_op<'a>(instance_id: Uuid, op: &'a RecordOp) -> Result<PgOp<'a>, PersistenceError> {
    let op = match op {
        RecordOp::UpsertRuntime(rec) => {
            let v = &rec.value;
            PgOp::Upsert(NewRuntimeRow { instance_id,
                                         scope_id: scope_column(rec.scope_id)?,
                                         name: &rec.name,
                                         value_type: v.value_type.as_str(),
                                         text_value: v.text.as_deref(),
                                         text2_value: v.text2.as_deref(),
                                         long_value: v.long,
                                         double_value: v.double,
                                         bytes_value: v.bytes.as_deref(),
                                         serialization_format: v.serialization_format.as_deref(),
                                         revision: revision_column(rec.revision)?,
                                         updated_at: rec.updated_at })
        }
        RecordOp::DeleteRuntime { scope_id, name } => PgOp::Delete { scope_id: scope_column(*scope_id)?,
                                                                     name },
        RecordOp::DeleteRuntimeScope(scope_id) => PgOp::DeleteScope(scope_column(*scope_id)?),
        RecordOp::DeleteRuntimeInstance => PgOp::DeleteInstance,
        RecordOp::AppendHistoric(rec) => {
            let v = &rec.value;
            PgOp::Append(NewHistoricRow { instance_id,
                                          scope_id: scope_column(rec.scope_id)?,
                                          name: &rec.name,
                                          value_type: v.value_type.as_str(),
                                          text_value: v.text.as_deref(),
                                          text2_value: v.text2.as_deref(),
                                          long_value: v.long,
                                          double_value: v.double,
                                          bytes_value: v.bytes.as_deref(),
                                          serialization_format: v.serialization_format.as_deref(),
                                          revision: revision_column(rec.revision)?,
                                          created: rec.created,
                                          recorded_at: rec.recorded_at })
        }
    };
    Ok(op)
}

#[allow(clippy::too_many_arguments)]
fn serialized_from_columns(value_type: &str,
                           text: Option<String>,
                           text2: Option<String>,
                           long: Option<i64>,
                           double: Option<f64>,
                           bytes: Option<Vec<u8>>,
                           serialization_format: Option<String>)
                           -> Result<SerializedValue, PersistenceError> {
    let value_type = ValueType::parse(value_type).ok_or_else(|| {
                                                     PersistenceError::CorruptRow(format!("unknown value_type '{value_type}'"))
                                                 })?;
    Ok(SerializedValue { value_type,
                         text,
                         text2,
                         long,
                         double,
                         bytes,
                         serialization_format })
}

fn scope_from_column(scope_id: i32) -> Result<ScopeId, PersistenceError> {
    u32::try_from(scope_id).map(ScopeId)
                           .map_err(|_| PersistenceError::CorruptRow(format!("negative scope_id {scope_id}")))
}

fn revision_from_column(revision: i64) -> Result<u64, PersistenceError> {
    u64::try_from(revision).map_err(|_| PersistenceError::CorruptRow(format!("negative revision {revision}")))
}

impl TryFrom<RuntimeRow> for RuntimeVariableRecord {
    type Error = PersistenceError;

    fn try_from(row: RuntimeRow) -> Result<Self, Self::Error> {
        let value = serialized_from_columns(&row.value_type,
                                            row.text_value,
                                            row.text2_value,
                                            row.long_value,
                                            row.double_value,
                                            row.bytes_value,
                                            row.serialization_format)?;
        Ok(RuntimeVariableRecord { instance_id: row.instance_id,
                                   scope_id: scope_from_column(row.scope_id)?,
                                   name: row.name,
                                   value,
                                   revision: revision_from_column(row.revision)?,
                                   updated_at: row.updated_at })
    }
}

impl TryFrom<HistoricRow> for HistoricVariableRecord {
    type Error = PersistenceError;

    fn try_from(row: HistoricRow) -> Result<Self, Self::Error> {
        let value = serialized_from_columns(&row.value_type,
                                            row.text_value,
                                            row.text2_value,
                                            row.long_value,
                                            row.double_value,
                                            row.bytes_value,
                                            row.serialization_format)?;
        let seq = u64::try_from(row.seq).map_err(|_| PersistenceError::CorruptRow(format!("negative seq {}", row.seq)))?;
        Ok(HistoricVariableRecord { seq,
                                    instance_id: row.instance_id,
                                    scope_id: scope_from_column(row.scope_id)?,
                                    name: row.name,
                                    value,
                                    revision: revision_from_column(row.revision)?,
                                    created: row.created,
                                    recorded_at: row.recorded_at })
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
///
/// Además de las variantes tipadas, hace best-effort sobre mensajes comunes
/// de desconexión/timeout que el driver reporta como `Unknown`.
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal corto (hasta 3 reintentos: 15ms, 30ms,
/// 45ms). Emite `warn!` por intento y sólo repite la unidad provista por `f`.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

fn apply_op(tx: &mut PgConnection, instance_id: Uuid, op: &PgOp<'_>) -> Result<(), PersistenceError> {
    match op {
        PgOp::Upsert(row) => {
            diesel::insert_into(runtime_variables::table).values(row)
                                                         .on_conflict((runtime_variables::instance_id,
                                                                       runtime_variables::scope_id,
                                                                       runtime_variables::name))
                                                         .do_update()
                                                         .set(row)
                                                         .execute(tx)?;
        }
        PgOp::Delete { scope_id, name } => {
            diesel::delete(runtime_variables::table.filter(runtime_variables::instance_id.eq(instance_id))
                                                   .filter(runtime_variables::scope_id.eq(*scope_id))
                                                   .filter(runtime_variables::name.eq(*name))).execute(tx)?;
        }
        PgOp::DeleteScope(scope_id) => {
            diesel::delete(runtime_variables::table.filter(runtime_variables::instance_id.eq(instance_id))
                                                   .filter(runtime_variables::scope_id.eq(*scope_id))).execute(tx)?;
        }
        PgOp::DeleteInstance => {
            diesel::delete(runtime_variables::table.filter(runtime_variables::instance_id.eq(instance_id))).execute(tx)?;
        }
        PgOp::Append(row) => {
            diesel::insert_into(historic_variables::table).values(row).execute(tx)?;
        }
    }
    Ok(())
}

/// Implementación Postgres de `VariableRecordStore`.
pub struct PgVariableStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgVariableStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn commit_batch(&self, batch: &RecordBatch) -> Result<(), PersistenceError> {
        let instance_id = batch.instance_id;
        let ops = batch.ops()
                       .iter()
                       .map(|op| translate_op(instance_id, op))
                       .collect::<Result<Vec<_>, _>>()?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run::<_, PersistenceError, _>(|tx| {
                    for op in &ops {
                        apply_op(tx, instance_id, op)?;
                    }
                    Ok(())
                })
        })
    }

    fn load_runtime(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, PersistenceError> {
        let rows: Vec<RuntimeRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            runtime_variables::table.filter(runtime_variables::instance_id.eq(instance_id))
                                    .order((runtime_variables::scope_id.asc(), runtime_variables::name.asc()))
                                    .load(&mut conn)
                                    .map_err(PersistenceError::from)
        })?;
        rows.into_iter().map(RuntimeVariableRecord::try_from).collect()
    }

    fn load_historic(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, PersistenceError> {
        let rows: Vec<HistoricRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            historic_variables::table.filter(historic_variables::instance_id.eq(instance_id))
                                     .order(historic_variables::seq.asc())
                                     .load(&mut conn)
                                     .map_err(PersistenceError::from)
        })?;
        rows.into_iter().map(HistoricVariableRecord::try_from).collect()
    }
}

impl<P: ConnectionProvider> VariableRecordStore for PgVariableStore<P> {
    fn commit(&self, batch: RecordBatch) -> Result<(), VariableError> {
        if batch.is_empty() {
            return Ok(());
        }
        let instance_id = batch.instance_id;
        debug!("commit:start instance_id={instance_id} ops={} historic={}",
               batch.len(),
               batch.historic_count());
        self.commit_batch(&batch).map_err(|e| {
                                     error!("commit:failed instance_id={instance_id} err={e:?}");
                                     VariableError::from(e)
                                 })?;
        debug!("commit:done instance_id={instance_id}");
        Ok(())
    }

    fn runtime_variables(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, VariableError> {
        let records = self.load_runtime(instance_id)?;
        debug!("runtime_variables:done instance_id={instance_id} count={}", records.len());
        Ok(records)
    }

    fn historic_variables(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, VariableError> {
        let records = self.load_historic(instance_id)?;
        debug!("historic_variables:done instance_id={instance_id} count={}", records.len());
        Ok(records)
    }
}

/// Construye un pool Postgres r2d2 a partir de URL y corre las migraciones
/// pendientes sobre la primera conexión.
///
/// Tamaños 0 se ajustan a 1; si `min_size > max_size` se usa `min = max`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max",
              validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee `DbConfig` y construye un pool ya
/// migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
