//! Contexto de ejecución: la fachada que ven la lógica de los pasos y la
//! orquestación.
//!
//! Cada escritura pasa, en este orden, por:
//! 1. el árbol de scopes (resolución del slot dueño),
//! 2. el selector de persistencia (qué registros se preparan en el batch),
//! 3. el evaluador condicional (qué ramas en espera avanzan).
//!
//! Nada de lo que ocurre aquí es visible fuera de la unidad de trabajo hasta
//! que el engine hace commit del batch.
use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use super::{InstanceKind, InstanceState, Orchestrator};
use crate::conditional::{ConditionalSubscriptionSpec, SubscribeOutcome, TriggeredSubscription, VariableEvent,
                         VariableMutation};
use crate::config::EngineConfig;
use crate::errors::VariableError;
use crate::expression::parse_condition;
use crate::persistence::{HistoryLevel, PersistenceSelector};
use crate::record::{HistoricVariableRecord, RecordBatch, RecordOp, RuntimeVariableRecord};
use crate::scope::{ScopeId, SlotWrite};
use crate::value::{TypedValue, VariableMap};

pub struct ExecutionContext<'a> {
    state: &'a mut InstanceState,
    batch: &'a mut RecordBatch,
    selector: PersistenceSelector,
    config: &'a EngineConfig,
    orchestrator: &'a dyn Orchestrator,
    scope: ScopeId,
    depth: usize,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(state: &'a mut InstanceState,
                      batch: &'a mut RecordBatch,
                      selector: PersistenceSelector,
                      config: &'a EngineConfig,
                      orchestrator: &'a dyn Orchestrator)
                      -> Self {
        Self { state,
               batch,
               selector,
               config,
               orchestrator,
               scope: ScopeId::ROOT,
               depth: 0 }
    }

    pub fn instance_id(&self) -> Uuid {
        self.state.id
    }

    pub fn instance_kind(&self) -> InstanceKind {
        self.state.kind
    }

    pub fn definition_key(&self) -> &str {
        &self.state.definition_key
    }

    /// Scope sobre el que operan lecturas y escrituras.
    pub fn current_scope(&self) -> ScopeId {
        self.scope
    }

    /// Número de disparos condicionales anidados en curso.
    pub fn trigger_depth(&self) -> usize {
        self.depth
    }

    pub fn history_level(&self) -> HistoryLevel {
        self.selector.history_level()
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended
    }

    /// Ejecuta `f` con `scope` como scope actual y restaura el anterior.
    pub fn within<R>(&mut self,
                     scope: ScopeId,
                     f: impl FnOnce(&mut ExecutionContext<'a>) -> Result<R, VariableError>)
                     -> Result<R, VariableError> {
        self.state.tree.node(scope)?;
        let previous = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = previous;
        result
    }

    fn ensure_running(&self) -> Result<(), VariableError> {
        if self.state.ended {
            return Err(VariableError::InstanceEnded(self.state.id));
        }
        Ok(())
    }

    // ---- lecturas ----

    pub fn get_variable(&self, name: &str) -> Result<TypedValue, VariableError> {
        self.state.tree.get_variable(self.scope, name).cloned()
    }

    /// Como `get_variable`, pero una variable sin binding es `None`.
    pub fn get_variable_opt(&self, name: &str) -> Result<Option<TypedValue>, VariableError> {
        match self.get_variable(name) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_variable_local(&self, name: &str) -> Result<TypedValue, VariableError> {
        self.state.tree.get_variable_local(self.scope, name).cloned()
    }

    pub fn variables(&self) -> Result<BTreeMap<String, TypedValue>, VariableError> {
        self.state.tree.variables(self.scope)
    }

    pub fn variables_local(&self) -> Result<BTreeMap<String, TypedValue>, VariableError> {
        self.state.tree.variables_local(self.scope)
    }

    // ---- escrituras ----

    pub fn set_variable(&mut self, name: &str, value: impl Into<TypedValue>) -> Result<(), VariableError> {
        self.write(name, value.into(), false)
    }

    /// Escribe en el scope actual aunque un ancestro ya defina el nombre.
    pub fn set_variable_local(&mut self, name: &str, value: impl Into<TypedValue>) -> Result<(), VariableError> {
        self.write(name, value.into(), true)
    }

    /// Escritura masiva; cada entrada es una escritura individual, en el
    /// orden del mapa.
    pub fn set_variables(&mut self, variables: VariableMap) -> Result<(), VariableError> {
        for (name, value) in variables {
            self.write(&name, value, false)?;
        }
        Ok(())
    }

    pub fn set_variables_local(&mut self, variables: VariableMap) -> Result<(), VariableError> {
        for (name, value) in variables {
            self.write(&name, value, true)?;
        }
        Ok(())
    }

    fn write(&mut self, name: &str, value: TypedValue, local: bool) -> Result<(), VariableError> {
        self.ensure_running()?;
        let value = value.with_default_format(self.config.default_serialization_format.as_ref());
        // se valida antes de tocar el árbol
        value.ensure_serializable(name)?;

        let scope = self.scope;
        let write = if local {
            self.state.tree.set_variable_local(scope, name, value)?
        } else {
            self.state.tree.set_variable(scope, name, value)?
        };
        self.stage_write(name, &write)?;

        let event = if write.is_new_slot { VariableEvent::Create } else { VariableEvent::Update };
        self.fire_conditionals(VariableMutation { scope,
                                                  owner: write.owner,
                                                  name: name.to_string(),
                                                  event })
    }

    fn stage_write(&mut self, name: &str, write: &SlotWrite) -> Result<(), VariableError> {
        let instance_id = self.state.id;
        let slot = self.state
                       .tree
                       .node(write.owner)?
                       .variables
                       .get(name)
                       .ok_or_else(|| VariableError::Internal(format!("slot '{name}' missing after write")))?;
        let decision = self.selector.on_variable_written(slot, write.is_new_slot);
        debug!("variable:set instance_id={instance_id} scope={} name={name} type={} transient={} revision={} \
                runtime={} historic={}",
               write.owner,
               slot.value.value_type(),
               slot.value.is_transient(),
               slot.revision,
               decision.write_runtime,
               decision.write_historic);

        if !decision.write_runtime {
            // un valor durable reemplazado por uno transitorio deja de
            // tener proyección runtime
            if write.previous.as_ref().is_some_and(|p| !p.is_transient()) {
                self.batch.push(RecordOp::DeleteRuntime { scope_id: write.owner,
                                                          name: name.to_string() });
            }
            return Ok(());
        }

        let value = slot.value.serialize(name)?;
        let revision = slot.revision;
        let now = Utc::now();
        if decision.write_historic {
            self.batch.push(RecordOp::AppendHistoric(HistoricVariableRecord { seq: 0,
                                                                              instance_id,
                                                                              scope_id: write.owner,
                                                                              name: name.to_string(),
                                                                              value: value.clone(),
                                                                              revision,
                                                                              created: write.is_new_slot,
                                                                              recorded_at: now }));
        }
        self.batch.push(RecordOp::UpsertRuntime(RuntimeVariableRecord { instance_id,
                                                                        scope_id: write.owner,
                                                                        name: name.to_string(),
                                                                        value,
                                                                        revision,
                                                                        updated_at: now }));
        Ok(())
    }

    /// Elimina el binding visible desde el scope actual. El registro runtime
    /// se borra; los históricos se conservan.
    pub fn remove_variable(&mut self, name: &str) -> Result<(), VariableError> {
        self.ensure_running()?;
        let scope = self.scope;
        let slot = self.state.tree.remove_variable(scope, name)?;
        if !slot.value.is_transient() {
            self.batch.push(RecordOp::DeleteRuntime { scope_id: slot.owner,
                                                      name: name.to_string() });
        }
        debug!("variable:removed instance_id={} scope={} name={name}", self.state.id, slot.owner);
        self.fire_conditionals(VariableMutation { scope,
                                                  owner: slot.owner,
                                                  name: name.to_string(),
                                                  event: VariableEvent::Delete })
    }

    // ---- scopes ----

    /// Crea una rama hija del scope actual.
    pub fn create_child_scope(&mut self) -> Result<ScopeId, VariableError> {
        self.ensure_running()?;
        let child = self.state.tree.create_child(self.scope)?;
        debug!("scope:created instance_id={} scope={child} parent={}", self.state.id, self.scope);
        Ok(child)
    }

    /// Destruye `scope` y su subárbol: sus registros runtime se borran y sus
    /// suscripciones se eliminan sin dispararse. Destruir la raíz completa
    /// la instancia.
    pub fn destroy_scope(&mut self, scope: ScopeId) -> Result<(), VariableError> {
        self.ensure_running()?;
        if scope == ScopeId::ROOT {
            return self.complete_instance();
        }
        let destroyed = self.state.tree.destroy(scope)?;
        let durable: BTreeSet<ScopeId> = destroyed.slots
                                                  .iter()
                                                  .filter(|s| !s.value.is_transient())
                                                  .map(|s| s.owner)
                                                  .collect();
        for s in durable {
            self.batch.push(RecordOp::DeleteRuntimeScope(s));
        }
        let removed = self.state.subscriptions.remove_for_scopes(&destroyed.scopes);
        debug!("scope:destroyed instance_id={} scopes={:?} subscriptions_removed={}",
               self.state.id,
               destroyed.scopes,
               removed.len());
        Ok(())
    }

    /// Termina la instancia: borra sus registros runtime y descarta las
    /// suscripciones pendientes.
    pub fn complete_instance(&mut self) -> Result<(), VariableError> {
        self.ensure_running()?;
        let removed = self.state.subscriptions.clear();
        self.state.ended = true;
        self.batch.push(RecordOp::DeleteRuntimeInstance);
        info!("instance:ended instance_id={} kind={} subscriptions_removed={}",
              self.state.id,
              self.state.kind,
              removed.len());
        Ok(())
    }

    // ---- eventos condicionales ----

    /// Registra un evento condicional en el scope actual. La condición se
    /// evalúa de inmediato: si ya es verdadera la rama avanza sin esperar.
    pub fn subscribe_conditional(&mut self, spec: ConditionalSubscriptionSpec) -> Result<SubscribeOutcome, VariableError> {
        self.ensure_running()?;
        let scope = self.scope;
        let condition = parse_condition(&spec.condition)?;
        let snapshot = self.state.tree.variables(scope)?;
        let satisfied = condition.evaluate(&snapshot).map_err(|e| condition.invalid(e))?;

        let id = self.state.subscriptions.allocate_id();
        if satisfied {
            debug!("conditional:satisfied_on_subscribe id={id} scope={scope} activity={}", spec.activity_id);
            self.advance(TriggeredSubscription { subscription_id: id,
                                                 scope,
                                                 activity_id: spec.activity_id,
                                                 condition: condition.source().to_string(),
                                                 cause: None })?;
            return Ok(SubscribeOutcome::Triggered(id));
        }
        self.state.subscriptions.register(id, scope, condition, spec);
        Ok(SubscribeOutcome::Waiting(id))
    }

    fn fire_conditionals(&mut self, mutation: VariableMutation) -> Result<(), VariableError> {
        let candidates = self.state.subscriptions.candidates(&self.state.tree, &mutation)?;
        for id in candidates {
            if self.state.ended {
                break;
            }
            // una rama disparada antes pudo haber eliminado esta suscripción
            let (owner, condition) = match self.state.subscriptions.get(id) {
                Some(sub) if sub.is_active() => (sub.owner, sub.condition.clone()),
                _ => continue,
            };
            let snapshot = self.state.tree.variables(owner)?;
            let satisfied = condition.evaluate(&snapshot).map_err(|e| condition.invalid(e))?;
            debug!("conditional:evaluated id={id} condition={} result={satisfied} cause={}",
                   condition.source(),
                   mutation.name);
            if !satisfied {
                continue;
            }
            if let Some(sub) = self.state.subscriptions.trigger(id) {
                self.advance(TriggeredSubscription::new(sub, Some(mutation.clone())))?;
            }
        }
        Ok(())
    }

    /// Entrega el control a la orquestación con el scope de la rama en
    /// espera como scope actual.
    fn advance(&mut self, trigger: TriggeredSubscription) -> Result<(), VariableError> {
        if self.depth >= self.config.max_trigger_depth {
            warn!("conditional:depth_exceeded instance_id={} max_depth={} subscription={}",
                  self.state.id,
                  self.config.max_trigger_depth,
                  trigger.subscription_id);
            return Err(VariableError::TriggerDepthExceeded { max_depth: self.config.max_trigger_depth });
        }
        let orchestrator = self.orchestrator;
        let saved = (self.scope, self.depth);
        self.scope = trigger.scope;
        self.depth += 1;
        let result = orchestrator.resolve_waiting_branch(self, &trigger);
        (self.scope, self.depth) = saved;
        result
    }
}
