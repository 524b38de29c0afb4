//! Parallel-execution gate.
//!
//! Decides once per tuning run whether resampling iterations may be spread
//! over the registered workers. Parallel dispatch requires all of:
//!
//! * more than one registered worker,
//! * the caller allowing it,
//! * no workflow dependency on a package in [`PARALLEL_BLACKLIST`].
//!
//! A blacklisted package under an otherwise parallel-eligible run produces a
//! warning and sequential dispatch. Nothing here fails.

use tracing::{debug, warn};

use tg_types::DependencyLister;

use crate::backend::ParallelBackend;
use crate::strategy::{DispatchHandle, Parallel, Sequential};

/// Packages that are unsafe or ineffective on parallel workers.
pub const PARALLEL_BLACKLIST: [&str; 2] = ["keras", "rJava"];

pub const PROHIBIT_PARALLEL_MSG: &str = "Some required packages prohibit parallel processing";

/// Outcome of the decision table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    /// Whether iterations should run in parallel.
    pub parallel: bool,
    /// Worker count the decision was made against.
    pub workers: usize,
    /// Blacklisted packages that overrode an otherwise parallel run.
    pub blocked: Vec<String>,
}

impl GateDecision {
    /// The user-facing warning, present only when blacklisted packages forced
    /// sequential dispatch.
    pub fn warning(&self) -> Option<String> {
        if self.blocked.is_empty() {
            None
        } else {
            Some(format!("{PROHIBIT_PARALLEL_MSG}: {}", self.blocked.join(", ")))
        }
    }
}

/// Blacklisted entries of `pkgs`, in the order they appear there.
pub fn blacklisted_in(pkgs: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for pkg in pkgs {
        if PARALLEL_BLACKLIST.contains(&pkg.as_str()) && !found.contains(pkg) {
            found.push(pkg.clone());
        }
    }
    found
}

/// Pure decision table over an explicit worker count.
///
/// `pkgs` is `None` when the dependency list could not be derived, which
/// counts as "parallelism unavailable".
pub fn decide(allow: bool, workers: usize, pkgs: Option<&[String]>) -> GateDecision {
    let available = workers > 1;
    let mut allow = allow;
    let mut blocked = Vec::new();

    if available && allow {
        match pkgs {
            Some(pkgs) => {
                blocked = blacklisted_in(pkgs);
                if !blocked.is_empty() {
                    allow = false;
                }
            }
            None => allow = false,
        }
    }

    GateDecision {
        parallel: allow && available,
        workers,
        blocked,
    }
}

/// Pick the dispatch handle for a tuning run over `workflow`.
///
/// Reads the worker count from `backend`, emits the blacklist warning when it
/// applies, and returns a parallel handle bound to the registered pool only if
/// the decision allows it.
pub fn select_dispatch<W>(allow: bool, backend: &ParallelBackend, workflow: &W) -> DispatchHandle
where
    W: DependencyLister + ?Sized,
{
    let workers = backend.worker_count();
    let pkgs = workflow.required_pkgs();

    if pkgs.is_none() {
        debug!("Package list unavailable, treating parallelism as unavailable");
    }

    let decision = decide(allow, workers, pkgs.as_deref());
    if let Some(message) = decision.warning() {
        warn!(packages = %decision.blocked.join(", "), "{}", message);
    }

    match backend.pool() {
        Some(pool) if decision.parallel => {
            debug!("Dispatching iterations over {} workers", workers);
            DispatchHandle::Parallel(Parallel::new(pool))
        }
        _ => DispatchHandle::Sequential(Sequential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendConfig;
    use crate::strategy::IterationStrategy;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tg_types::{ModelSpec, Preprocessor, Workflow};

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct FixedDeps(Option<Vec<String>>);

    impl DependencyLister for FixedDeps {
        fn required_pkgs(&self) -> Option<Vec<String>> {
            self.0.clone()
        }
    }

    fn parallel_backend() -> ParallelBackend {
        ParallelBackend::with_config(&BackendConfig::default().with_workers(2)).unwrap()
    }

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with a subscriber that records WARN-and-above output.
    fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let writer = CaptureWriter::default();
        let sink = writer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let logged = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
        (out, logged)
    }

    #[test]
    fn disjoint_deps_go_parallel() {
        let decision = decide(true, 4, Some(pkgs(&["glmnet", "recipes"]).as_slice()));
        assert!(decision.parallel);
        assert!(decision.warning().is_none());
    }

    #[test]
    fn caller_disallow_is_always_sequential() {
        for workers in [0, 1, 2, 8] {
            for deps in [pkgs(&[]), pkgs(&["ranger"]), pkgs(&["keras", "rJava"])] {
                let decision = decide(false, workers, Some(deps.as_slice()));
                assert!(!decision.parallel);
                assert!(decision.warning().is_none());
            }
        }
    }

    #[test]
    fn single_or_zero_workers_is_sequential() {
        for workers in [0, 1] {
            for allow in [true, false] {
                let decision = decide(allow, workers, Some(pkgs(&["keras"]).as_slice()));
                assert!(!decision.parallel);
                assert!(decision.warning().is_none());
            }
        }
    }

    #[test]
    fn keras_blocks_parallel_with_warning() {
        let decision = decide(true, 2, Some(pkgs(&["keras"]).as_slice()));
        assert!(!decision.parallel);
        assert_eq!(
            decision.warning().as_deref(),
            Some("Some required packages prohibit parallel processing: keras")
        );
    }

    #[test]
    fn warning_lists_packages_in_dependency_order() {
        let decision = decide(true, 2, Some(pkgs(&["rJava", "recipes", "keras"]).as_slice()));
        assert_eq!(decision.blocked, vec!["rJava", "keras"]);
        assert_eq!(
            decision.warning().unwrap(),
            "Some required packages prohibit parallel processing: rJava, keras"
        );

        let decision = decide(true, 2, Some(pkgs(&["keras", "rJava"]).as_slice()));
        assert!(decision.warning().unwrap().ends_with(": keras, rJava"));
    }

    #[test]
    fn blacklist_match_is_case_sensitive() {
        assert!(blacklisted_in(&pkgs(&["Keras", "rjava"])).is_empty());
        assert_eq!(blacklisted_in(&pkgs(&["keras", "keras"])), vec!["keras"]);
    }

    #[test]
    fn empty_or_missing_deps() {
        assert!(decide(true, 2, Some(pkgs(&[]).as_slice())).parallel);

        let decision = decide(true, 2, None);
        assert!(!decision.parallel);
        assert!(decision.warning().is_none());
    }

    #[test]
    fn select_dispatch_parallel_for_safe_workflow() {
        let backend = parallel_backend();
        let wf = Workflow::new("glm", ModelSpec::new("logistic_reg", "glmnet"));

        let (handle, logged) = capture_warnings(|| select_dispatch(true, &backend, &wf));
        assert!(handle.is_parallel());
        assert_eq!(handle.workers(), 2);
        assert!(logged.is_empty());
    }

    #[test]
    fn select_dispatch_warns_once_for_keras() {
        let backend = parallel_backend();
        let wf = Workflow::new("mlp", ModelSpec::new("mlp", "keras"));

        let (handle, logged) = capture_warnings(|| select_dispatch(true, &backend, &wf));
        assert!(!handle.is_parallel());
        assert_eq!(logged.matches(PROHIBIT_PARALLEL_MSG).count(), 1);
        assert!(logged.contains("prohibit parallel processing: keras"));
    }

    #[test]
    fn select_dispatch_names_preprocessor_packages() {
        let backend = parallel_backend();
        let model = ModelSpec::new("bart", "bartMachine").with_packages(["bartMachine", "rJava"]);
        let prep = Preprocessor::new().add_step("embed", ["keras"]);
        let wf = Workflow::new("bart", model).with_preprocessor(prep);

        let (handle, logged) = capture_warnings(|| select_dispatch(true, &backend, &wf));
        assert!(!handle.is_parallel());
        assert!(logged.contains("prohibit parallel processing: rJava, keras"));
    }

    #[test]
    fn select_dispatch_quiet_without_workers_or_permission() {
        let wf = Workflow::new("mlp", ModelSpec::new("mlp", "keras"));

        let sequential = ParallelBackend::sequential();
        let (handle, logged) = capture_warnings(|| select_dispatch(true, &sequential, &wf));
        assert!(!handle.is_parallel());
        assert!(logged.is_empty());

        let backend = parallel_backend();
        let (handle, logged) = capture_warnings(|| select_dispatch(false, &backend, &wf));
        assert!(!handle.is_parallel());
        assert!(logged.is_empty());
    }

    #[test]
    fn select_dispatch_sequential_when_deps_unknown() {
        let backend = parallel_backend();
        let (handle, logged) =
            capture_warnings(|| select_dispatch(true, &backend, &FixedDeps(None)));
        assert!(!handle.is_parallel());
        assert!(logged.is_empty());
    }

    #[test]
    fn repeated_calls_repeat_the_warning() {
        let backend = parallel_backend();
        let deps = FixedDeps(Some(pkgs(&["keras", "rJava"])));

        let (handles, logged) = capture_warnings(|| {
            (
                select_dispatch(true, &backend, &deps),
                select_dispatch(true, &backend, &deps),
            )
        });
        assert_eq!(handles.0.is_parallel(), handles.1.is_parallel());
        assert_eq!(logged.matches(PROHIBIT_PARALLEL_MSG).count(), 2);

        let safe = FixedDeps(Some(pkgs(&["kknn"])));
        let first = select_dispatch(true, &backend, &safe);
        let second = select_dispatch(true, &backend, &safe);
        assert!(first.is_parallel() && second.is_parallel());
    }

    #[test]
    fn stopping_backend_changes_next_decision() {
        let backend = parallel_backend();
        let wf = Workflow::new("knn", ModelSpec::new("nearest_neighbor", "kknn"));
        assert!(select_dispatch(true, &backend, &wf).is_parallel());

        backend.stop();
        assert!(!select_dispatch(true, &backend, &wf).is_parallel());
    }

    #[test]
    fn parallel_handle_uses_backend_worker_count() {
        let backend = parallel_backend();
        let wf = Workflow::new("knn", ModelSpec::new("nearest_neighbor", "kknn"));
        let handle = select_dispatch(true, &backend, &wf);
        assert!(handle.is_parallel());
        assert_eq!(handle.workers(), backend.worker_count());

        backend.stop();
        let handle = select_dispatch(true, &backend, &wf);
        assert_eq!(backend.worker_count(), 1);
        assert_eq!(handle.workers(), 1);
    }
}
