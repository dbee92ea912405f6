//! In-memory [`Store`] implementation for tests and dry runs.
//!
//! Rows live in insertion-ordered `Vec`s behind `std::sync::RwLock`.
//! Schedule queries return rows in insertion order.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{MonitorError, Result};
use crate::models::{Diff, Endpoint, Repository};

use super::{EndpointUpdate, Store};

#[derive(Default)]
pub struct InMemoryStore {
    endpoints: RwLock<Vec<Endpoint>>,
    repositories: RwLock<Vec<Repository>>,
    diffs: RwLock<Vec<Diff>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| MonitorError::Persistence("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| MonitorError::Persistence("in-memory store lock poisoned".to_string()))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_endpoints_by_schedule(&self, schedule_hours: u32) -> Result<Vec<Endpoint>> {
        Ok(read(&self.endpoints)?
            .iter()
            .filter(|e| e.schedule_hours == schedule_hours && !e.deleted)
            .cloned()
            .collect())
    }

    async fn get_endpoint_by_url(&self, url: &str) -> Result<Option<Endpoint>> {
        Ok(read(&self.endpoints)?.iter().find(|e| e.url == url).cloned())
    }

    async fn get_all_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(read(&self.endpoints)?.clone())
    }

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        let mut endpoints = write(&self.endpoints)?;
        if endpoints.iter().any(|e| e.url == endpoint.url) {
            return Err(MonitorError::Persistence(format!(
                "endpoint already exists: {}",
                endpoint.url
            )));
        }
        endpoints.push(endpoint.clone());
        Ok(())
    }

    async fn update_endpoint(&self, endpoint: &Endpoint, update: EndpointUpdate) -> Result<()> {
        let mut endpoints = write(&self.endpoints)?;
        let Some(stored) = endpoints.iter_mut().find(|e| e.url == endpoint.url) else {
            return Err(MonitorError::NotFound(format!("endpoint {}", endpoint.url)));
        };
        stored.selector = endpoint.selector.clone();
        stored.profile = endpoint.profile;
        match update {
            EndpointUpdate::Crawl => {
                stored.status_code = endpoint.status_code;
                stored.response_body = endpoint.response_body.clone();
                stored.previous_response_body = endpoint.previous_response_body.clone();
            }
            EndpointUpdate::Settings => {
                stored.schedule_hours = endpoint.schedule_hours;
                stored.deleted = endpoint.deleted;
            }
        }
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_endpoint(&self, url: &str) -> Result<u64> {
        let mut endpoints = write(&self.endpoints)?;
        let before = endpoints.len();
        endpoints.retain(|e| e.url != url);
        Ok((before - endpoints.len()) as u64)
    }

    async fn get_repositories_by_schedule(&self, schedule_hours: u32) -> Result<Vec<Repository>> {
        Ok(read(&self.repositories)?
            .iter()
            .filter(|r| r.schedule_hours == schedule_hours && !r.deleted)
            .cloned()
            .collect())
    }

    async fn get_repository_by_url(&self, url: &str) -> Result<Option<Repository>> {
        Ok(read(&self.repositories)?
            .iter()
            .find(|r| r.url == url)
            .cloned())
    }

    async fn get_all_repositories(&self) -> Result<Vec<Repository>> {
        Ok(read(&self.repositories)?.clone())
    }

    async fn create_repository(&self, repository: &Repository) -> Result<()> {
        let mut repositories = write(&self.repositories)?;
        if repositories.iter().any(|r| r.url == repository.url) {
            return Err(MonitorError::Persistence(format!(
                "repository already exists: {}",
                repository.url
            )));
        }
        repositories.push(repository.clone());
        Ok(())
    }

    async fn update_repository(&self, repository: &Repository) -> Result<()> {
        let mut repositories = write(&self.repositories)?;
        let Some(stored) = repositories.iter_mut().find(|r| r.url == repository.url) else {
            return Err(MonitorError::NotFound(format!(
                "repository {}",
                repository.url
            )));
        };
        *stored = repository.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn create_diff(&self, diff: &Diff) -> Result<()> {
        write(&self.diffs)?.push(diff.clone());
        Ok(())
    }

    async fn get_diff(&self, id: &str) -> Result<Option<Diff>> {
        Ok(read(&self.diffs)?.iter().find(|d| d.id == id).cloned())
    }

    async fn get_all_diffs(&self) -> Result<Vec<Diff>> {
        // Later inserts win ties on created_at.
        let mut diffs: Vec<Diff> = read(&self.diffs)?.iter().rev().cloned().collect();
        diffs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for d in &mut diffs {
            d.body.clear();
        }
        Ok(diffs)
    }
}
