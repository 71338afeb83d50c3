//! GoBGP gRPC client

use super::apipb::gobgp_api_client::GobgpApiClient;
use super::apipb::family::{Afi, Safi};
use super::apipb::{Family, ListPathRequest, TableType};
use super::{BgpSpeaker, RawPath};
use crate::lens::rib::AddressFamily;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::time::Duration;
use tonic::transport::Endpoint;
use tracing::{debug, info};

/// Blocking client for GoBGP's `GobgpApi/ListPath`
///
/// The client owns a single-threaded tokio runtime and drives each
/// server-streaming call to completion before returning, so callers stay
/// synchronous. Every call opens a fresh channel bounded by `timeout`.
pub struct GobgpClient {
    endpoint: String,
    timeout: Duration,
    runtime: tokio::runtime::Runtime,
}

impl GobgpClient {
    /// Create a new client for the given endpoint, e.g. `http://127.0.0.1:50051`
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| anyhow!("Failed to create gRPC runtime: {}", e))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout,
            runtime,
        })
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn list_path_async(&self, family: AddressFamily) -> Result<Vec<RawPath>> {
        let channel = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| anyhow!("Invalid speaker endpoint '{}': {}", self.endpoint, e))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await
            .map_err(|e| anyhow!("Failed to connect to speaker at {}: {}", self.endpoint, e))?;

        let mut client = GobgpApiClient::new(channel);
        let request = ListPathRequest {
            table_type: TableType::Global as i32,
            name: String::new(),
            family: Some(api_family(family)),
        };

        let mut stream = client
            .list_path(request)
            .await
            .map_err(|e| anyhow!("ListPath({}) failed: {}", family, e))?
            .into_inner();

        let listed_at = Utc::now();
        let mut paths = vec![];
        let mut destinations = 0usize;
        while let Some(response) = stream
            .message()
            .await
            .map_err(|e| anyhow!("ListPath({}) stream failed: {}", family, e))?
        {
            if let Some(destination) = response.destination {
                destinations += 1;
                debug!(
                    "destination {} with {} paths",
                    destination.prefix,
                    destination.paths.len()
                );
                paths.extend(
                    destination
                        .paths
                        .into_iter()
                        .map(|path| RawPath::from_api(path, listed_at)),
                );
            }
        }

        info!(
            "listed {} {} paths across {} destinations from {}",
            paths.len(),
            family,
            destinations,
            self.endpoint
        );
        Ok(paths)
    }
}

impl BgpSpeaker for GobgpClient {
    fn list_path(&self, family: AddressFamily) -> Result<Vec<RawPath>> {
        self.runtime.block_on(self.list_path_async(family))
    }
}

fn api_family(family: AddressFamily) -> Family {
    let afi = match family {
        AddressFamily::Ipv4 => Afi::Ip,
        AddressFamily::Ipv6 => Afi::Ip6,
    };
    Family {
        afi: afi as i32,
        safi: Safi::Unicast as i32,
    }
}
