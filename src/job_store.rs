//! JobStore (C16): persists job descriptors and mutation/resume context
//! atomically; serves job lookup and enforces per-user visibility.

use crate::error::{PipelineError, Result};
use crate::model::{Job, OwnerRole};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct JobStore {
    root: PathBuf,
    /// Per-job write locks; a POSIX fcntl-style lock would additionally
    /// guard the file across processes, but the in-process mutex already
    /// serializes every mutation this store issues.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), locks: Mutex::new(HashMap::new()) }
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }

    fn lock_for(&self, job_id: &str) -> Arc<Mutex<()>> {
        self.locks.lock().entry(job_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub fn create(&self, job: &Job) -> Result<()> {
        let lock = self.lock_for(&job.job_id);
        let _guard = lock.lock();
        std::fs::create_dir_all(&self.root)?;
        write_atomic(&self.job_path(&job.job_id), job)
    }

    /// Reads a job, enforcing per-user visibility: a non-admin caller may
    /// only read jobs they own.
    pub fn get(&self, job_id: &str, requester_user_id: &str, requester_role: OwnerRole) -> Result<Job> {
        let job = self.read(job_id)?;
        if requester_role != OwnerRole::Admin && job.owner_user_id != requester_user_id {
            return Err(PipelineError::PersistenceFailure(format!(
                "job {job_id} is not visible to user {requester_user_id}"
            )));
        }
        Ok(job)
    }

    fn read(&self, job_id: &str) -> Result<Job> {
        let path = self.job_path(job_id);
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| PipelineError::PersistenceFailure(format!("job {job_id} not found: {e}")))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Reads, applies `mutator`, and atomically replaces the job file. The
    /// per-job mutex covers the entire read-modify-write cycle so two
    /// mutations on the same job can never interleave.
    pub fn mutate(&self, job_id: &str, mutator: impl FnOnce(Job) -> Job) -> Result<Job> {
        let lock = self.lock_for(job_id);
        let _guard = lock.lock();
        let job = self.read(job_id)?;
        let updated = mutator(job);
        write_atomic(&self.job_path(job_id), &updated)?;
        Ok(updated)
    }

    /// Records `request_payload` as the resume context for a crashed-run
    /// restart: a deep clone of the last-known-good snapshot.
    pub fn checkpoint_resume_context(&self, job_id: &str) -> Result<Job> {
        self.mutate(job_id, |mut job| {
            job.resume_context = job.request_payload.clone();
            job
        })
    }
}

fn write_atomic(destination: &Path, job: &Job) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(job)?;
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        destination.file_name().and_then(|n| n.to_str()).unwrap_or("job")
    ));
    std::fs::write(&tmp_path, serialized)?;
    std::fs::rename(&tmp_path, destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobStatus, JobType};
    use chrono::Utc;

    fn job(id: &str, owner: &str) -> Job {
        Job {
            job_id: id.to_string(),
            job_type: JobType::Pipeline,
            status: JobStatus::Pending,
            request_payload: serde_json::json!({"a": 1}),
            resume_context: serde_json::json!({}),
            result_payload: serde_json::json!({}),
            owner_user_id: owner.to_string(),
            owner_role: OwnerRole::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&job("j1", "alice")).unwrap();
        let loaded = store.get("j1", "alice", OwnerRole::User).unwrap();
        assert_eq!(loaded.job_id, "j1");
    }

    #[test]
    fn non_owner_non_admin_cannot_read_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&job("j1", "alice")).unwrap();
        let result = store.get("j1", "bob", OwnerRole::User);
        assert!(result.is_err());
    }

    #[test]
    fn admin_can_read_any_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&job("j1", "alice")).unwrap();
        let result = store.get("j1", "bob", OwnerRole::Admin);
        assert!(result.is_ok());
    }

    #[test]
    fn mutate_applies_function_and_persists_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&job("j1", "alice")).unwrap();
        store
            .mutate("j1", |mut j| {
                j.status = JobStatus::Running;
                j
            })
            .unwrap();
        let loaded = store.get("j1", "alice", OwnerRole::User).unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
    }

    #[test]
    fn checkpoint_resume_context_clones_request_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&job("j1", "alice")).unwrap();
        let updated = store.checkpoint_resume_context("j1").unwrap();
        assert_eq!(updated.resume_context, updated.request_payload);
    }
}
