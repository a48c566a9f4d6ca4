//! Simulated cluster state and the service task that owns it.
//!
//! One [`ClusterService`] task per simulated cluster holds the
//! [`ClusterState`] and answers requests sent through cloneable
//! [`ClusterHandle`]s. Agents report over the same channel, so a heartbeat
//! sent just before an agent halts can still be sitting in the queue after
//! the agent's task has finished.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use fleet_types::{AgentAddress, ClusterId, Role};

use crate::config::EmbeddedConfig;
use crate::error::ControlError;
use crate::status::{format_pools, ACTIVE_CLEAN, DEFAULT_POOLS};

/// Requests queued for a cluster service.
const REQUEST_QUEUE_DEPTH: usize = 256;

/// One simulated server as the cluster sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Server name.
    pub fqdn: AgentAddress,
    /// Roles hosted, monitors first.
    pub roles: Vec<Role>,
    /// Heartbeats received from this server's agent.
    pub heartbeats: u64,
    /// Unix time of the last heartbeat.
    pub last_seen: Option<u64>,
}

/// Membership of one OSD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsdRecord {
    /// Server hosting the OSD.
    pub host: AgentAddress,
    /// Daemon running.
    pub up: bool,
    /// Counted for data placement.
    pub r#in: bool,
}

/// Full state of one simulated cluster. Persisted as `cluster.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Cluster fsid.
    pub fsid: ClusterId,
    /// Cluster name (its domain).
    pub name: String,
    /// Bumped on every membership change.
    pub epoch: u64,
    /// Servers in creation order.
    pub hosts: Vec<HostRecord>,
    /// OSDs by id.
    pub osds: BTreeMap<u32, OsdRecord>,
    /// `(id, name)` pools.
    pub pools: Vec<(u32, String)>,
    /// Placement groups per pool.
    pub pgs_per_pool: u32,
}

impl ClusterState {
    /// A healthy cluster: every OSD up and in, default pools only.
    pub fn new(
        fsid: ClusterId,
        name: impl Into<String>,
        fqdns: &[AgentAddress],
        config: &EmbeddedConfig,
    ) -> Self {
        let mut hosts = Vec::with_capacity(fqdns.len());
        let mut osds = BTreeMap::new();
        let mut next_osd = 0u32;

        for (i, fqdn) in fqdns.iter().enumerate() {
            let mut roles = Vec::new();
            if i < config.mon_count {
                roles.push(Role::new(Role::MON, i as u32));
            }
            for _ in 0..config.osds_per_agent {
                roles.push(Role::new(Role::OSD, next_osd));
                osds.insert(
                    next_osd,
                    OsdRecord {
                        host: fqdn.clone(),
                        up: true,
                        r#in: true,
                    },
                );
                next_osd += 1;
            }
            hosts.push(HostRecord {
                fqdn: fqdn.clone(),
                roles,
                heartbeats: 0,
                last_seen: None,
            });
        }

        Self {
            fsid,
            name: name.into(),
            epoch: 1,
            hosts,
            osds,
            pools: DEFAULT_POOLS
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
            pgs_per_pool: config.pgs_per_pool,
        }
    }

    /// Set an OSD in or out. Returns `None` for an unknown id, otherwise
    /// whether anything changed.
    pub fn set_osd_in(&mut self, osd_id: u32, osd_in: bool) -> Option<bool> {
        let osd = self.osds.get_mut(&osd_id)?;
        if osd.r#in == osd_in {
            return Some(false);
        }
        osd.r#in = osd_in;
        self.epoch += 1;
        Some(true)
    }

    /// Servers hosting at least one role of `service_type`.
    pub fn service_fqdns(&self, service_type: &str) -> Vec<AgentAddress> {
        self.hosts
            .iter()
            .filter(|h| h.roles.iter().any(|r| r.is_service(service_type)))
            .map(|h| h.fqdn.clone())
            .collect()
    }

    /// Count a heartbeat from `fqdn`. Unknown senders are ignored.
    pub fn record_heartbeat(&mut self, fqdn: &AgentAddress, now: u64) -> bool {
        match self.hosts.iter_mut().find(|h| &h.fqdn == fqdn) {
            Some(host) => {
                host.heartbeats += 1;
                host.last_seen = Some(now);
                true
            }
            None => false,
        }
    }

    /// Heartbeats received from `fqdn` so far.
    pub fn heartbeats(&self, fqdn: &AgentAddress) -> Option<u64> {
        self.hosts
            .iter()
            .find(|h| &h.fqdn == fqdn)
            .map(|h| h.heartbeats)
    }

    /// `osd stat` line.
    pub fn osd_stat(&self) -> String {
        let up = self.osds.values().filter(|o| o.up).count();
        let r#in = self.osds.values().filter(|o| o.r#in).count();
        format!(
            "     osdmap e{}: {} osds: {} up, {} in",
            self.epoch,
            self.osds.len(),
            up,
            r#in
        )
    }

    /// `osd lspools` line.
    pub fn pool_list(&self) -> String {
        format_pools(self.pools.iter().map(|(id, name)| (*id, name.as_str())))
    }

    /// `pg stat` line. PGs are degraded in proportion to OSDs that are out.
    pub fn pg_stat(&self) -> String {
        let total = self.pools.len() as u64 * u64::from(self.pgs_per_pool);
        let out = self.osds.values().filter(|o| !o.r#in).count() as u64;
        let degraded = match self.osds.len() as u64 {
            0 => 0,
            n => (total * out).div_ceil(n),
        };
        let clean = total - degraded;

        let states = match (clean, degraded) {
            (_, 0) => format!("{clean} {ACTIVE_CLEAN}"),
            (0, _) => format!("{degraded} active+degraded"),
            _ => format!("{clean} {ACTIVE_CLEAN}, {degraded} active+degraded"),
        };
        format!(
            "v{}: {} pgs: {}; 0 bytes data, 0 MB used, 0 GB / 0 GB avail",
            self.epoch, total, states
        )
    }
}

/// Requests a [`ClusterService`] understands.
#[derive(Debug)]
enum ClusterRequest {
    Heartbeat {
        fqdn: AgentAddress,
    },
    SetOsdState {
        osd_id: u32,
        osd_in: bool,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    ServiceFqdns {
        service_type: String,
        reply: oneshot::Sender<Vec<AgentAddress>>,
    },
    Snapshot {
        reply: oneshot::Sender<ClusterState>,
    },
    Stop,
}

/// Cloneable handle to one cluster's state service.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    fsid: ClusterId,
    tx: mpsc::Sender<ClusterRequest>,
}

impl ClusterHandle {
    /// The cluster this handle reaches.
    pub fn fsid(&self) -> ClusterId {
        self.fsid
    }

    /// Report that `fqdn`'s agent is alive.
    pub async fn heartbeat(&self, fqdn: &AgentAddress) -> Result<(), ControlError> {
        self.send(ClusterRequest::Heartbeat { fqdn: fqdn.clone() })
            .await
    }

    /// Mark an OSD in or out.
    pub async fn set_osd_state(&self, osd_id: u32, osd_in: bool) -> Result<(), ControlError> {
        self.request(|reply| ClusterRequest::SetOsdState {
            osd_id,
            osd_in,
            reply,
        })
        .await?
    }

    /// Servers hosting `service_type`.
    pub async fn service_fqdns(&self, service_type: &str) -> Result<Vec<AgentAddress>, ControlError> {
        self.request(|reply| ClusterRequest::ServiceFqdns {
            service_type: service_type.to_string(),
            reply,
        })
        .await
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Result<ClusterState, ControlError> {
        self.request(|reply| ClusterRequest::Snapshot { reply }).await
    }

    /// Ask the service to exit once everything queued before this call has
    /// been handled.
    pub async fn stop(&self) -> Result<(), ControlError> {
        self.send(ClusterRequest::Stop).await
    }

    async fn send(&self, request: ClusterRequest) -> Result<(), ControlError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ControlError::ServiceUnavailable(self.fsid))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ClusterRequest,
    ) -> Result<T, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| ControlError::ServiceUnavailable(self.fsid))
    }
}

/// Task owning one cluster's state.
pub struct ClusterService {
    state: ClusterState,
    state_path: PathBuf,
    rx: mpsc::Receiver<ClusterRequest>,
}

impl ClusterService {
    /// Persist the initial state to `state_path` and start serving.
    pub fn spawn(
        state: ClusterState,
        state_path: PathBuf,
    ) -> Result<(ClusterHandle, JoinHandle<()>), ControlError> {
        std::fs::write(&state_path, serde_json::to_vec_pretty(&state)?)?;

        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let handle = ClusterHandle { fsid: state.fsid, tx };
        let service = Self {
            state,
            state_path,
            rx,
        };
        Ok((handle, tokio::spawn(service.run())))
    }

    async fn run(mut self) {
        tracing::debug!("Cluster state service {} started", self.state.fsid);

        while let Some(request) = self.rx.recv().await {
            match request {
                ClusterRequest::Heartbeat { fqdn } => {
                    if !self.state.record_heartbeat(&fqdn, unix_now()) {
                        tracing::warn!("Heartbeat from unknown agent {} ignored", fqdn);
                    }
                }
                ClusterRequest::SetOsdState {
                    osd_id,
                    osd_in,
                    reply,
                } => {
                    let result = self.set_osd_state(osd_id, osd_in).await;
                    let _ = reply.send(result);
                }
                ClusterRequest::ServiceFqdns {
                    service_type,
                    reply,
                } => {
                    let _ = reply.send(self.state.service_fqdns(&service_type));
                }
                ClusterRequest::Snapshot { reply } => {
                    let _ = reply.send(self.state.clone());
                }
                ClusterRequest::Stop => break,
            }
        }

        tracing::debug!("Cluster state service {} stopped", self.state.fsid);
    }

    async fn set_osd_state(&mut self, osd_id: u32, osd_in: bool) -> Result<(), ControlError> {
        // Apply to a copy so a failed write leaves the served state untouched.
        let mut next = self.state.clone();
        let changed = next
            .set_osd_in(osd_id, osd_in)
            .ok_or(ControlError::UnknownOsd {
                fsid: self.state.fsid,
                osd_id,
            })?;

        if changed {
            tokio::fs::write(&self.state_path, serde_json::to_vec_pretty(&next)?).await?;
            tracing::info!(
                "osd.{} marked {} in cluster {}",
                osd_id,
                if osd_in { "in" } else { "out" },
                next.fsid
            );
            self.state = next;
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{
        check_default_pools_only, check_osds_up_and_in, check_pgs_active_and_clean, Verdict,
    };

    fn fqdns(n: usize) -> Vec<AgentAddress> {
        (0..n)
            .map(|i| AgentAddress::new(format!("node{i:03}.cluster0.com")).unwrap())
            .collect()
    }

    fn state(n: usize) -> ClusterState {
        ClusterState::new(ClusterId::new(), "cluster0.com", &fqdns(n), &EmbeddedConfig::default())
    }

    #[test]
    fn new_cluster_layout() {
        let s = state(5);
        assert_eq!(s.hosts.len(), 5);
        assert_eq!(s.osds.len(), 20);
        assert_eq!(s.service_fqdns(Role::MON), fqdns(3));
        assert_eq!(s.service_fqdns(Role::OSD), fqdns(5));
        assert!(s.service_fqdns("mds").is_empty());
        assert_eq!(s.osds[&4].host, fqdns(5)[1]);
    }

    #[test]
    fn small_cluster_has_fewer_mons() {
        assert_eq!(state(2).service_fqdns(Role::MON).len(), 2);
    }

    #[test]
    fn fresh_cluster_passes_every_check() {
        let s = state(3);
        assert_eq!(check_osds_up_and_in(&s.osd_stat()), Verdict::Converged);
        assert_eq!(check_default_pools_only(&s.pool_list()), Verdict::Converged);
        assert_eq!(check_pgs_active_and_clean(&s.pg_stat()), Verdict::Converged);
    }

    #[test]
    fn osd_out_degrades_status() {
        let mut s = state(3);
        assert_eq!(s.set_osd_in(2, false), Some(true));
        assert_eq!(s.epoch, 2);
        assert_eq!(check_osds_up_and_in(&s.osd_stat()), Verdict::NotConverged);
        assert_eq!(check_pgs_active_and_clean(&s.pg_stat()), Verdict::NotConverged);
        assert!(s.pg_stat().contains("active+degraded"));
    }

    #[test]
    fn set_osd_in_is_idempotent() {
        let mut s = state(1);
        assert_eq!(s.set_osd_in(0, true), Some(false));
        assert_eq!(s.set_osd_in(0, false), Some(true));
        assert_eq!(s.set_osd_in(0, false), Some(false));
        assert_eq!(s.epoch, 2);
        assert_eq!(s.set_osd_in(99, false), None);
    }

    #[test]
    fn heartbeats_counted_per_host() {
        let mut s = state(2);
        let hosts = fqdns(2);
        assert!(s.record_heartbeat(&hosts[1], 100));
        assert!(s.record_heartbeat(&hosts[1], 101));
        assert_eq!(s.heartbeats(&hosts[0]), Some(0));
        assert_eq!(s.heartbeats(&hosts[1]), Some(2));
        assert_eq!(s.hosts[1].last_seen, Some(101));

        let stranger = AgentAddress::new("other.example").unwrap();
        assert!(!s.record_heartbeat(&stranger, 1));
    }

    #[test]
    fn state_json_roundtrip() {
        let s = state(2);
        let json = serde_json::to_string(&s).unwrap();
        let back: ClusterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[tokio::test]
    async fn service_handles_requests_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        let s = state(2);
        let fsid = s.fsid;
        let (handle, task) = ClusterService::spawn(s, path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(handle.fsid(), fsid);

        handle.set_osd_state(1, false).await.unwrap();
        let snap = handle.snapshot().await.unwrap();
        assert!(!snap.osds[&1].r#in);

        let on_disk: ClusterState =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(!on_disk.osds[&1].r#in);

        let err = handle.set_osd_state(42, true).await.unwrap_err();
        assert!(matches!(err, ControlError::UnknownOsd { osd_id: 42, .. }));

        assert_eq!(handle.service_fqdns(Role::MON).await.unwrap(), fqdns(2));

        handle.stop().await.unwrap();
        task.await.unwrap();
        assert!(matches!(
            handle.snapshot().await,
            Err(ControlError::ServiceUnavailable(id)) if id == fsid
        ));
    }

    #[tokio::test]
    async fn queued_heartbeats_are_applied_before_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) =
            ClusterService::spawn(state(1), dir.path().join("cluster.json")).unwrap();
        let host = &fqdns(1)[0];

        for _ in 0..10 {
            handle.heartbeat(host).await.unwrap();
        }
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.heartbeats(host), Some(10));

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_persist_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("cluster0");
        std::fs::create_dir(&workdir).unwrap();
        let path = workdir.join("cluster.json");
        let (handle, task) = ClusterService::spawn(state(1), path.clone()).unwrap();

        std::fs::remove_dir_all(&workdir).unwrap();
        let err = handle.set_osd_state(0, false).await.unwrap_err();
        assert!(matches!(err, ControlError::Io(_)));

        let snap = handle.snapshot().await.unwrap();
        assert!(snap.osds[&0].r#in);
        assert_eq!(snap.epoch, 1);

        // Once the directory is back the same request goes through and is written.
        std::fs::create_dir(&workdir).unwrap();
        handle.set_osd_state(0, false).await.unwrap();
        let on_disk: ClusterState =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(!on_disk.osds[&0].r#in);
        assert_eq!(on_disk.epoch, 2);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
