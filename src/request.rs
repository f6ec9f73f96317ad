//! Queue of path requests resolved once per tick.
use std::time::{Duration, Instant};

use bevy::{log, math::Vec2, prelude::Resource};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    error::{NavError, PathError},
    lifecycle::ChunkGrids,
    neighbor::Neighborhood,
    path::{PathResult, PathStatus, PathWaypoint},
    pathfind::find_path,
    settings::NavSettings,
};

/// Handle returned by [`PathRequests::submit`].
///
/// Handles are reused once their request has been taken or discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestHandle(usize);

impl RequestHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Everything a resolved request produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPath {
    pub result: PathResult,
    /// Empty unless the request succeeded.
    pub waypoints: Vec<PathWaypoint>,
    /// Why the request failed or timed out.
    pub error: Option<PathError>,
}

#[derive(Debug)]
struct PathRequest {
    start: Vec2,
    target: Vec2,
    max_length: usize,
    submitted: Duration,
    resolved: Option<ResolvedPath>,
}

/// Pending and resolved path requests.
///
/// Requests are submitted at any time and searched in [`PathRequests::resolve`]. Resolved
/// requests stay in the queue until the caller takes or discards them.
#[derive(Resource, Default, Debug)]
pub struct PathRequests {
    requests: slab::Slab<PathRequest>,
}

impl PathRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a request from `start` to `target`.
    ///
    /// # Arguments
    /// * `start` - World position to start from.
    /// * `target` - World position to reach.
    /// * `max_length` - Longest raw cell path accepted.
    /// * `now` - Submission time, compared against the request timeout when resolving.
    pub fn submit(
        &mut self,
        start: Vec2,
        target: Vec2,
        max_length: usize,
        now: Duration,
    ) -> RequestHandle {
        let key = self.requests.insert(PathRequest {
            start,
            target,
            max_length,
            submitted: now,
            resolved: None,
        });

        log::debug!("Queued path request {} from {} to {}", key, start, target);

        RequestHandle(key)
    }

    /// The result of a request, or `None` while it is still pending.
    pub fn poll(&self, handle: RequestHandle) -> Result<Option<PathResult>, NavError> {
        Ok(self.get(handle)?.resolved.as_ref().map(|resolved| resolved.result))
    }

    /// Current status of a request.
    pub fn status(&self, handle: RequestHandle) -> Result<PathStatus, NavError> {
        Ok(self.poll(handle)?.map_or(PathStatus::Pending, |result| result.status))
    }

    /// Waypoints of a request. Empty while pending or when no path was found.
    pub fn waypoints(&self, handle: RequestHandle) -> Result<&[PathWaypoint], NavError> {
        Ok(self
            .get(handle)?
            .resolved
            .as_ref()
            .map_or(&[][..], |resolved| resolved.waypoints.as_slice()))
    }

    /// Why a resolved request has no path.
    pub fn error(&self, handle: RequestHandle) -> Result<Option<&PathError>, NavError> {
        Ok(self
            .get(handle)?
            .resolved
            .as_ref()
            .and_then(|resolved| resolved.error.as_ref()))
    }

    /// Removes a resolved request and returns its outcome.
    ///
    /// Pending requests are left in the queue and `Ok(None)` is returned.
    pub fn take(&mut self, handle: RequestHandle) -> Result<Option<ResolvedPath>, NavError> {
        if self.get(handle)?.resolved.is_none() {
            return Ok(None);
        }

        Ok(self.requests.remove(handle.0).resolved)
    }

    /// Drops a request whether or not it was resolved.
    pub fn discard(&mut self, handle: RequestHandle) -> Result<(), NavError> {
        self.requests
            .try_remove(handle.0)
            .map(|_| ())
            .ok_or(NavError::UnknownRequest(handle.0))
    }

    /// Number of requests waiting for [`PathRequests::resolve`].
    pub fn pending(&self) -> usize {
        self.requests
            .iter()
            .filter(|(_, request)| request.resolved.is_none())
            .count()
    }

    /// Number of requests in the queue, resolved or not.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Resolves every pending request against the current grids.
    ///
    /// Requests older than the request timeout are marked [`PathStatus::Timeout`] without
    /// searching. The rest are searched independently, in parallel with the `parallel`
    /// feature. Returns the number of requests resolved.
    pub fn resolve<N: Neighborhood>(
        &mut self,
        neighborhood: &N,
        grids: &ChunkGrids,
        settings: &NavSettings,
        now: Duration,
    ) -> usize {
        let mut jobs = Vec::new();
        let mut timed_out = 0;

        for (key, request) in self.requests.iter_mut() {
            if request.resolved.is_some() {
                continue;
            }

            let age = now.saturating_sub(request.submitted);
            if age > settings.request_timeout() {
                log::warn!(
                    "Path request {} from {} to {} timed out after {:?}",
                    key,
                    request.start,
                    request.target,
                    age
                );
                request.resolved = Some(ResolvedPath::from_error(
                    PathError::Timeout { age },
                    Duration::ZERO,
                ));
                timed_out += 1;
                continue;
            }

            jobs.push((key, request.start, request.target, request.max_length));
        }

        let search = |&(key, start, target, max_length): &(usize, Vec2, Vec2, usize)| {
            let started = Instant::now();
            let outcome = find_path(neighborhood, grids, start, target, max_length, settings);
            let duration = started.elapsed();

            let resolved = match outcome {
                Ok(path) => ResolvedPath {
                    result: PathResult::success(&path, duration),
                    waypoints: path.into_waypoints(),
                    error: None,
                },
                Err(error) => {
                    log::debug!("Path request {} failed: {}", key, error);
                    ResolvedPath::from_error(error, duration)
                }
            };

            (key, resolved)
        };

        let resolved: Vec<(usize, ResolvedPath)> = timed!("Resolved path requests", {
            #[cfg(feature = "parallel")]
            let resolved = jobs.par_iter().map(search).collect();

            #[cfg(not(feature = "parallel"))]
            let resolved = jobs.iter().map(search).collect();

            resolved
        });

        let searched = resolved.len();
        for (key, outcome) in resolved {
            if let Some(request) = self.requests.get_mut(key) {
                request.resolved = Some(outcome);
            }
        }

        timed_out + searched
    }

    fn get(&self, handle: RequestHandle) -> Result<&PathRequest, NavError> {
        self.requests
            .get(handle.0)
            .ok_or(NavError::UnknownRequest(handle.0))
    }
}

impl ResolvedPath {
    fn from_error(error: PathError, duration: Duration) -> Self {
        let iterations = match error {
            PathError::Exhausted { iterations } => iterations,
            PathError::IterationCap { cap } => cap,
            _ => 0,
        };

        ResolvedPath {
            result: PathResult::failed(error.status(), duration, iterations),
            waypoints: Vec::new(),
            error: Some(error),
        }
    }
}
