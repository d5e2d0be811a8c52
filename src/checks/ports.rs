//! Local port occupancy probe

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{timestamp, ProbeStatus};
use crate::probe::{HostProbe, PortState, ProbePool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus {
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Result of `probe_ports`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortReport {
    pub timestamp: String,
    pub ports: BTreeMap<u16, PortStatus>,
    pub conflicts: Vec<u16>,
    pub recommendations: Vec<String>,
}

/// Probe each port once; duplicates in `ports` are ignored
pub async fn probe_ports(ports: &[u16], probe: Arc<dyn HostProbe>, pool: &ProbePool) -> PortReport {
    let mut requested: Vec<u16> = Vec::with_capacity(ports.len());
    for port in ports {
        if !requested.contains(port) {
            requested.push(*port);
        }
    }

    let mut handles = Vec::with_capacity(requested.len());
    for port in &requested {
        let port = *port;
        let probe = Arc::clone(&probe);
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.run(format!("port {}", port), move || probe.port_status(port))
                .await
        }));
    }

    let mut report = PortReport {
        timestamp: timestamp(),
        ports: BTreeMap::new(),
        conflicts: Vec::new(),
        recommendations: Vec::new(),
    };

    for (port, handle) in requested.into_iter().zip(handles) {
        let outcome = match handle.await {
            Ok(Ok(state)) => state.map_err(|e| e.to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let status = match outcome {
            Ok(PortState::InUse { owner }) => {
                report.conflicts.push(port);
                PortStatus {
                    status: ProbeStatus::InUse,
                    details: owner,
                }
            }
            Ok(PortState::Available) => PortStatus {
                status: ProbeStatus::Available,
                details: None,
            },
            Err(reason) => {
                debug!(port, reason = %reason, "port probe inconclusive");
                PortStatus {
                    status: ProbeStatus::Available,
                    details: Some(format!("Probe inconclusive: {}", reason)),
                }
            }
        };
        report.ports.insert(port, status);
    }

    if !report.conflicts.is_empty() {
        report.recommendations.push(
            "Consider configuring MCP servers to use different ports if they support it".to_string(),
        );
        report.recommendations.push(
            "Check if processes using these ports can be stopped when running MCPs".to_string(),
        );
    }

    report
}
