use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use client_core::{EntityService, ServiceError};
use shared::{
    domain::{Entity, EntityId},
    error::ErrorCode,
};
use tokio::sync::oneshot;

/// In-memory entity service with call counters and scripted failures.
#[derive(Default)]
pub(crate) struct TestEntityService {
    records: Mutex<Vec<Entity>>,
    next_id: AtomicUsize,
    rejected_names: HashSet<String>,
    fail_fetch: AtomicBool,
    fail_writes: AtomicBool,
    fetch_gates: Mutex<VecDeque<oneshot::Receiver<Vec<Entity>>>>,
    pub fetch_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    fetches_in_flight: AtomicUsize,
    pub max_fetches_in_flight: AtomicUsize,
    creates_in_flight: AtomicUsize,
    pub max_creates_in_flight: AtomicUsize,
}

impl TestEntityService {
    pub(crate) fn with_records(records: Vec<Entity>) -> Self {
        let service = Self::default();
        service.next_id.store(records.len(), Ordering::SeqCst);
        *service.records.lock().expect("records") = records;
        service
    }

    /// `create` rejects any record whose `name` attribute is in `names`.
    pub(crate) fn rejecting(mut self, names: &[&str]) -> Self {
        self.rejected_names = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub(crate) fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The next `fetch_all` blocks until the returned sender supplies its result.
    pub(crate) fn gate_next_fetch(&self) -> oneshot::Sender<Vec<Entity>> {
        let (tx, rx) = oneshot::channel();
        self.fetch_gates.lock().expect("gates").push_back(rx);
        tx
    }

    pub(crate) fn records(&self) -> Vec<Entity> {
        self.records.lock().expect("records").clone()
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn write_failure(&self) -> Option<ServiceError> {
        self.fail_writes.load(Ordering::SeqCst).then(|| ServiceError::Status {
            status: 500,
            code: ErrorCode::Internal,
            message: "database offline".to_string(),
        })
    }
}

fn track_max(current: &AtomicUsize, max: &AtomicUsize) {
    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
    max.fetch_max(now, Ordering::SeqCst);
}

#[async_trait]
impl EntityService for TestEntityService {
    async fn fetch_all(&self) -> Result<Vec<Entity>, ServiceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        track_max(&self.fetches_in_flight, &self.max_fetches_in_flight);

        let gate = self.fetch_gates.lock().expect("gates").pop_front();
        let result = match gate {
            Some(gate) => gate
                .await
                .map_err(|_| ServiceError::Unavailable("fetch gate dropped".to_string())),
            None => {
                tokio::task::yield_now().await;
                if self.fail_fetch.load(Ordering::SeqCst) {
                    Err(ServiceError::Unavailable("list endpoint down".to_string()))
                } else {
                    Ok(self.records())
                }
            }
        };

        self.fetches_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn create(&self, entity: Entity) -> Result<Entity, ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        track_max(&self.creates_in_flight, &self.max_creates_in_flight);
        tokio::task::yield_now().await;
        self.creates_in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.write_failure() {
            return Err(err);
        }
        if self.rejected_names.contains(&entity.display_label()) {
            return Err(ServiceError::Status {
                status: 422,
                code: ErrorCode::Validation,
                message: format!("customer '{}' rejected", entity.display_label()),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = entity;
        created.id = Some(EntityId::new(id.to_string()));
        self.records.lock().expect("records").push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &EntityId, entity: Entity) -> Result<Entity, ServiceError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(err) = self.write_failure() {
            return Err(err);
        }

        let mut records = self.records.lock().expect("records");
        let Some(slot) = records
            .iter_mut()
            .find(|record| record.id.as_ref() == Some(id))
        else {
            return Err(ServiceError::Status {
                status: 404,
                code: ErrorCode::NotFound,
                message: format!("customer {id} not found"),
            });
        };
        let mut updated = entity;
        updated.id = Some(id.clone());
        *slot = updated.clone();
        Ok(updated)
    }
}
