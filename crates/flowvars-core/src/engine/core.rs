//! `VariableEngine`: registro de instancias y unidades de trabajo.
//!
//! Cada comando se ejecuta contra exactamente una instancia:
//! - se toma el lock de la instancia (comandos sobre la misma instancia se
//!   serializan; instancias distintas avanzan en paralelo),
//! - se trabaja sobre una copia del estado y un `RecordBatch` nuevo,
//! - si el comando y el commit del batch tienen éxito la copia reemplaza al
//!   estado; si no, copia y batch se descartan.
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{error, info, warn};
use uuid::Uuid;

use super::{EngineBuilder, ExecutionContext, InstanceKind, InstanceState, Orchestrator, ProcessInstance};
use crate::conditional::{ConditionalEventSubscription, ConditionalSubscriptionSpec, SubscribeOutcome};
use crate::config::EngineConfig;
use crate::errors::VariableError;
use crate::persistence::{HistoryLevel, PersistenceSelector};
use crate::record::{HistoricVariableRecord, RecordBatch, RuntimeVariableRecord, VariableRecordStore};
use crate::scope::ScopeId;
use crate::value::{TypedValue, VariableMap};

pub struct VariableEngine<S, O>
    where S: VariableRecordStore,
          O: Orchestrator
{
    pub(crate) store: S,
    pub(crate) orchestrator: O,
    pub(crate) selector: PersistenceSelector,
    pub(crate) config: EngineConfig,
    pub(crate) instances: DashMap<Uuid, Arc<Mutex<InstanceState>>>,
}

impl<S, O> VariableEngine<S, O>
    where S: VariableRecordStore,
          O: Orchestrator
{
    #[inline]
    pub fn builder(store: S, orchestrator: O) -> EngineBuilder<S, O> {
        EngineBuilder::new(store, orchestrator)
    }

    /// Engine con la configuración por defecto.
    pub fn new(store: S, orchestrator: O) -> Self {
        Self::builder(store, orchestrator).build()
    }

    /// Almacén de registros durables.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lógica de orquestación que recibe las ramas disparadas.
    pub fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    /// Configuración con la que se construyó el motor.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history_level(&self) -> HistoryLevel {
        self.selector.history_level()
    }

    // ---- ciclo de vida ----

    pub fn start_process_instance(&self,
                                  definition_key: &str,
                                  variables: VariableMap)
                                  -> Result<ProcessInstance, VariableError> {
        self.start_instance(InstanceKind::Process, definition_key, variables)
    }

    pub fn start_case_instance(&self,
                               definition_key: &str,
                               variables: VariableMap)
                               -> Result<ProcessInstance, VariableError> {
        self.start_instance(InstanceKind::Case, definition_key, variables)
    }

    /// Arranca una instancia: escribe las variables iniciales en la raíz y
    /// ejecuta los pasos iniciales del orquestador, todo en una unidad de
    /// trabajo. Si falla, la instancia nunca llega a existir.
    fn start_instance(&self,
                      kind: InstanceKind,
                      definition_key: &str,
                      variables: VariableMap)
                      -> Result<ProcessInstance, VariableError> {
        let mut state = InstanceState::new(Uuid::new_v4(), kind, definition_key);
        self.run_unit(&mut state, |ctx| {
                ctx.set_variables(variables)?;
                if ctx.is_ended() {
                    return Ok(());
                }
                self.orchestrator.on_instance_started(ctx)
            })?;
        let instance = ProcessInstance::from(&state);
        info!("instance:started instance_id={} kind={kind} definition={definition_key} ended={}",
              instance.id,
              instance.ended);
        if !state.ended {
            self.instances.insert(state.id, Arc::new(Mutex::new(state)));
        }
        Ok(instance)
    }

    /// Ejecuta un comando arbitrario como unidad de trabajo atómica.
    pub fn execute<R>(&self,
                      instance_id: Uuid,
                      command: impl FnOnce(&mut ExecutionContext<'_>) -> Result<R, VariableError>)
                      -> Result<R, VariableError> {
        let handle = self.handle(instance_id)?;
        // el estado protegido sólo se sustituye tras un commit, un pánico a mitad
        // de comando lo deja intacto
        let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.ended {
            return Err(VariableError::InstanceEnded(instance_id));
        }
        let mut working = guard.clone();
        let result = self.run_unit(&mut working, command)?;
        let ended = working.ended;
        *guard = working;
        drop(guard);
        if ended {
            self.instances.remove(&instance_id);
        }
        Ok(result)
    }

    fn handle(&self, instance_id: Uuid) -> Result<Arc<Mutex<InstanceState>>, VariableError> {
        self.instances
            .get(&instance_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(VariableError::UnknownInstance(instance_id))
    }

    fn run_unit<R>(&self,
                   state: &mut InstanceState,
                   command: impl FnOnce(&mut ExecutionContext<'_>) -> Result<R, VariableError>)
                   -> Result<R, VariableError> {
        let instance_id = state.id;
        let mut batch = RecordBatch::new(instance_id);
        let result = {
            let mut ctx = ExecutionContext::new(state, &mut batch, self.selector, &self.config, &self.orchestrator);
            command(&mut ctx)
        };
        match result {
            Ok(value) => {
                if let Err(e) = self.store.commit(batch) {
                    error!("unit_of_work:commit_failed instance_id={instance_id} error={e}");
                    return Err(e);
                }
                Ok(value)
            }
            Err(e) => {
                warn!("unit_of_work:rolled_back instance_id={instance_id} error={e}");
                Err(e)
            }
        }
    }

    fn read<R>(&self,
               instance_id: Uuid,
               f: impl FnOnce(&InstanceState) -> Result<R, VariableError>)
               -> Result<R, VariableError> {
        let handle = self.handle(instance_id)?;
        let guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Termina la instancia sin disparar sus suscripciones pendientes.
    pub fn terminate_instance(&self, instance_id: Uuid) -> Result<(), VariableError> {
        self.execute(instance_id, |ctx| ctx.complete_instance())
    }

    /// `true` mientras la instancia exista y no haya terminado.
    pub fn is_active(&self, instance_id: Uuid) -> bool {
        self.read(instance_id, |state| Ok(!state.ended)).unwrap_or(false)
    }

    pub fn instance_ids(&self) -> Vec<Uuid> {
        self.instances.iter().map(|e| *e.key()).collect()
    }

    // ---- variables ----

    /// Escribe `name` desde `scope` como unidad de trabajo propia.
    pub fn set_variable(&self,
                        instance_id: Uuid,
                        scope: ScopeId,
                        name: &str,
                        value: impl Into<TypedValue>)
                        -> Result<(), VariableError> {
        let value = value.into();
        self.execute(instance_id, |ctx| ctx.within(scope, |ctx| ctx.set_variable(name, value)))
    }

    pub fn set_variable_local(&self,
                              instance_id: Uuid,
                              scope: ScopeId,
                              name: &str,
                              value: impl Into<TypedValue>)
                              -> Result<(), VariableError> {
        let value = value.into();
        self.execute(instance_id, |ctx| ctx.within(scope, |ctx| ctx.set_variable_local(name, value)))
    }

    /// Escritura masiva atómica: si una entrada falla no se aplica ninguna.
    pub fn set_variables(&self, instance_id: Uuid, scope: ScopeId, variables: VariableMap) -> Result<(), VariableError> {
        self.execute(instance_id, |ctx| ctx.within(scope, |ctx| ctx.set_variables(variables)))
    }

    /// Elimina el binding visible desde `scope`.
    pub fn remove_variable(&self, instance_id: Uuid, scope: ScopeId, name: &str) -> Result<(), VariableError> {
        self.execute(instance_id, |ctx| ctx.within(scope, |ctx| ctx.remove_variable(name)))
    }

    pub fn get_variable(&self, instance_id: Uuid, scope: ScopeId, name: &str) -> Result<TypedValue, VariableError> {
        self.read(instance_id, |state| state.tree.get_variable(scope, name).cloned())
    }

    pub fn get_variable_local(&self,
                              instance_id: Uuid,
                              scope: ScopeId,
                              name: &str)
                              -> Result<TypedValue, VariableError> {
        self.read(instance_id, |state| state.tree.get_variable_local(scope, name).cloned())
    }

    /// Snapshot de las variables visibles desde `scope`.
    pub fn get_variables(&self, instance_id: Uuid, scope: ScopeId) -> Result<VariableMap, VariableError> {
        self.read(instance_id, |state| Ok(state.tree.variables(scope)?.into_iter().collect()))
    }

    // ---- scopes y suscripciones ----

    pub fn create_child_scope(&self, instance_id: Uuid, parent: ScopeId) -> Result<ScopeId, VariableError> {
        self.execute(instance_id, |ctx| ctx.within(parent, |ctx| ctx.create_child_scope()))
    }

    pub fn destroy_scope(&self, instance_id: Uuid, scope: ScopeId) -> Result<(), VariableError> {
        self.execute(instance_id, |ctx| ctx.destroy_scope(scope))
    }

    pub fn subscribe_conditional(&self,
                                 instance_id: Uuid,
                                 scope: ScopeId,
                                 spec: ConditionalSubscriptionSpec)
                                 -> Result<SubscribeOutcome, VariableError> {
        self.execute(instance_id, |ctx| ctx.within(scope, |ctx| ctx.subscribe_conditional(spec)))
    }

    /// Suscripciones activas de la instancia en orden de creación.
    pub fn active_subscriptions(&self, instance_id: Uuid) -> Result<Vec<ConditionalEventSubscription>, VariableError> {
        self.read(instance_id, |state| Ok(state.subscriptions.active().cloned().collect()))
    }

    // ---- consultas de registros ----

    /// Proyección runtime: (nombre, valor) de cada slot durable vivo.
    pub fn query_runtime_variables(&self, instance_id: Uuid) -> Result<Vec<(String, TypedValue)>, VariableError> {
        self.store
            .runtime_variables(instance_id)?
            .into_iter()
            .map(|r| Ok((r.name.clone(), r.typed_value()?)))
            .collect()
    }

    /// Historial: (nombre, valor, instante) por escritura durable, en orden
    /// de registro.
    pub fn query_historic_variables(&self,
                                    instance_id: Uuid)
                                    -> Result<Vec<(String, TypedValue, DateTime<Utc>)>, VariableError> {
        self.store
            .historic_variables(instance_id)?
            .into_iter()
            .map(|r| Ok((r.name.clone(), r.typed_value()?, r.recorded_at)))
            .collect()
    }

    pub fn runtime_records(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, VariableError> {
        self.store.runtime_variables(instance_id)
    }

    pub fn historic_records(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, VariableError> {
        self.store.historic_variables(instance_id)
    }
}
