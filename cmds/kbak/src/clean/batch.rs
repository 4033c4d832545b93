//! Jobs and cron jobs.
//!
//! The job controller generates the selector and stamps its own labels on the job and its pod
//! template; neither survives a re-apply, so both are dropped.

use k8s_openapi::api::batch::v1::{CronJob, Job, JobSpec};

use super::metadata::{clean_job_labels, clean_object_meta, clean_template_meta};

pub(super) fn clean_job(job: &mut Job) {
	clean_object_meta(&mut job.metadata);
	clean_job_labels(&mut job.metadata);
	job.status = None;

	if let Some(spec) = &mut job.spec {
		clean_job_spec(spec);
	}
}

pub(super) fn clean_cron_job(cron_job: &mut CronJob) {
	clean_object_meta(&mut cron_job.metadata);
	cron_job.status = None;

	if let Some(spec) = &mut cron_job.spec {
		let job_template = &mut spec.job_template;
		clean_template_meta(&mut job_template.metadata, true);
		if let Some(job_spec) = &mut job_template.spec {
			clean_job_spec(job_spec);
		}
	}
}

fn clean_job_spec(spec: &mut JobSpec) {
	clean_template_meta(&mut spec.template.metadata, true);
	spec.selector = None;
	if spec.manual_selector == Some(false) {
		spec.manual_selector = None;
	}
}
