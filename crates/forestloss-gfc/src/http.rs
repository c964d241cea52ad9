//! HTTP JSON implementations of the compute backend, raster store and object store.
//!
//! All three talk to one service rooted at a base URL:
//!
//! | Call | Request |
//! |------|---------|
//! | submit | `POST {base}/v1/jobs` with an [`AreaJobSpec`] body, answers `{"id": ...}` |
//! | list active | `GET {base}/v1/jobs?state=active` |
//! | status | `GET {base}/v1/jobs/{id}` |
//! | masks | `PUT`, `GET` and `HEAD` on `{base}/v1/assets/{id}` |
//! | objects | `PUT` and `GET` on `{base}/v1/objects/{path}`, `GET {base}/v1/objects?prefix=` |
//!
//! Masks travel as packed bytes with the grid as JSON in the
//! `x-forestloss-grid` header.

use std::thread;
use std::time::Duration;

use forestloss_raster::{PackedMask, PixelGrid, RasterError, RasterStore};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{is_under_prefix, AreaJobSpec, ComputeBackend, GfcError, JobId, JobStatus, ObjectStore, Result};

/// Header carrying a mask's grid as JSON.
pub const GRID_HEADER: &str = "x-forestloss-grid";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between status polls while waiting on a job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct Service {
    base_url: String,
    client: Client,
}

impl Service {
    fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request, turning non-success statuses into errors.
    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();
        trace!(url = %response.url(), %status, "HTTP response");
        if !status.is_success() {
            return Err(GfcError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct Submitted {
    id: JobId,
}

/// A [`ComputeBackend`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    service: Service,
    poll_interval: Duration,
}

impl HttpBackend {
    /// Create a backend client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration, poll_interval: Duration) -> Result<Self> {
        Ok(Self {
            service: Service::new(base_url, timeout)?,
            poll_interval,
        })
    }
}

impl ComputeBackend for HttpBackend {
    fn submit(&self, spec: &AreaJobSpec) -> Result<JobId> {
        let request = self.service.client.post(self.service.url("jobs")).json(spec);
        let submitted: Submitted = self.service.send(request)?.json()?;
        debug!(job = %submitted.id, asset = %spec.asset.asset_id, "submitted area job");
        Ok(submitted.id)
    }

    fn status(&self, id: &JobId) -> Result<JobStatus> {
        let request = self.service.client.get(self.service.url(&format!("jobs/{id}")));
        match self.service.send(request) {
            Err(GfcError::HttpStatus { status: 404, .. }) => Err(GfcError::UnknownJob(id.to_string())),
            other => Ok(other?.json()?),
        }
    }

    fn list_active(&self) -> Result<Vec<JobStatus>> {
        let request = self
            .service
            .client
            .get(self.service.url("jobs"))
            .query(&[("state", "active")]);
        Ok(self.service.send(request)?.json()?)
    }

    fn wait(&self, id: &JobId) -> Result<JobStatus> {
        loop {
            let status = self.status(id)?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            trace!(job = %id, state = %status.state, "job still active");
            thread::sleep(self.poll_interval);
        }
    }
}

/// A [`RasterStore`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRasterStore {
    service: Service,
}

impl HttpRasterStore {
    /// Create a store client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            service: Service::new(base_url, timeout)?,
        })
    }

    fn asset_url(&self, asset_id: &str) -> String {
        self.service.url(&format!("assets/{asset_id}"))
    }
}

fn remote(error: GfcError) -> RasterError {
    RasterError::Remote(error.to_string())
}

impl RasterStore for HttpRasterStore {
    fn put_mask(&self, asset_id: &str, mask: &PackedMask) -> forestloss_raster::Result<u64> {
        let grid = serde_json::to_string(mask.grid())?;
        let bytes = mask.to_bytes();
        let len = bytes.len() as u64;
        let request = self
            .service
            .client
            .put(self.asset_url(asset_id))
            .header(GRID_HEADER, grid)
            .body(bytes);
        self.service.send(request).map_err(remote)?;
        Ok(len)
    }

    fn get_mask(&self, asset_id: &str) -> forestloss_raster::Result<PackedMask> {
        let request = self.service.client.get(self.asset_url(asset_id));
        let response = match self.service.send(request) {
            Err(GfcError::HttpStatus { status: 404, .. }) => {
                return Err(RasterError::AssetNotFound(asset_id.to_string()))
            }
            other => other.map_err(remote)?,
        };

        let grid: PixelGrid = match response.headers().get(GRID_HEADER) {
            Some(value) => serde_json::from_slice(value.as_bytes())?,
            None => {
                return Err(RasterError::Remote(format!(
                    "asset {asset_id} has no {GRID_HEADER} header"
                )))
            }
        };
        let bytes = response.bytes().map_err(|e| RasterError::Remote(e.to_string()))?;
        PackedMask::from_bytes(grid, &bytes)
    }

    fn contains(&self, asset_id: &str) -> forestloss_raster::Result<bool> {
        let response = self
            .service
            .client
            .head(self.asset_url(asset_id))
            .send()
            .map_err(|e| RasterError::Remote(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(RasterError::Remote(format!("HTTP {status} checking {asset_id}"))),
        }
    }
}

/// An [`ObjectStore`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    service: Service,
}

impl HttpObjectStore {
    /// Create a store client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            service: Service::new(base_url, timeout)?,
        })
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let request = self
            .service
            .client
            .put(self.service.url(&format!("objects/{path}")))
            .body(bytes.to_vec());
        self.service.send(request)?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        let request = self.service.client.get(self.service.url(&format!("objects/{path}")));
        match self.service.send(request) {
            Err(GfcError::HttpStatus { status: 404, .. }) => Err(GfcError::ObjectNotFound(path.to_string())),
            other => Ok(other?.bytes()?.to_vec()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let request = self
            .service
            .client
            .get(self.service.url("objects"))
            .query(&[("prefix", prefix)]);
        let mut paths: Vec<String> = self.service.send(request)?.json()?;
        paths.retain(|p| is_under_prefix(p, prefix));
        paths.sort();
        Ok(paths)
    }
}
