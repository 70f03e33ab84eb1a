//! Read-only dashboard aggregations. No business rules beyond grouping and filtering.

pub mod handlers;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::job::{ApplicationView, JobWithApplicationCount};
use crate::tasks::tracker::TaskProgress;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct JobFilter {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmployerDashboard {
    pub total_jobs: usize,
    pub open_jobs: usize,
    pub total_applications: i64,
    pub applications_by_status: BTreeMap<String, usize>,
    pub jobs: Vec<JobWithApplicationCount>,
    pub recent_applications: Vec<ApplicationView>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeDashboard {
    pub total_applications: usize,
    pub applications_by_status: BTreeMap<String, usize>,
    pub applications: Vec<ApplicationView>,
    pub onboarding: TaskProgress,
}

const RECENT_APPLICATIONS: usize = 5;

/// Status equality and case-insensitive title search, both optional.
pub fn filter_jobs(
    jobs: Vec<JobWithApplicationCount>,
    filter: &JobFilter,
) -> Vec<JobWithApplicationCount> {
    let status = filter.status.as_deref().filter(|s| !s.is_empty() && *s != "all");
    let needle = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    jobs.into_iter()
        .filter(|job| status.map_or(true, |s| job.status == s))
        .filter(|job| {
            needle
                .as_deref()
                .map_or(true, |n| job.title.to_lowercase().contains(n))
        })
        .collect()
}

pub fn count_by_status(applications: &[ApplicationView]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for application in applications {
        *counts.entry(application.status.clone()).or_insert(0) += 1;
    }
    counts
}

/// Totals are computed over all jobs; `filter` only narrows the returned list.
pub fn employer_dashboard(
    jobs: Vec<JobWithApplicationCount>,
    mut applications: Vec<ApplicationView>,
    filter: &JobFilter,
) -> EmployerDashboard {
    let total_jobs = jobs.len();
    let open_jobs = jobs.iter().filter(|j| j.status == "open").count();
    let total_applications = jobs.iter().map(|j| j.application_count).sum();
    let applications_by_status = count_by_status(&applications);

    applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    applications.truncate(RECENT_APPLICATIONS);

    EmployerDashboard {
        total_jobs,
        open_jobs,
        total_applications,
        applications_by_status,
        jobs: filter_jobs(jobs, filter),
        recent_applications: applications,
    }
}

pub fn employee_dashboard(
    applications: Vec<ApplicationView>,
    onboarding: TaskProgress,
) -> EmployeeDashboard {
    EmployeeDashboard {
        total_applications: applications.len(),
        applications_by_status: count_by_status(&applications),
        applications,
        onboarding,
    }
}
