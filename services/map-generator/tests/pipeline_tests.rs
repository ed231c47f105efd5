//! Pipeline tests with fake collaborators: no network, no NetCDF files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use forecast_common::{ForecastDataset, MemoryDataset, RenderTask, TaskResult};
use map_generator::config::ImageConfig;
use map_generator::{
    drain, DatasetOpener, MapConfig, ModelOutcome, Orchestrator, PipelineError, PipelineResult,
    PngRenderer, Renderer, RunReport, RunSummary, SourceFetcher, TaskBuilder, WorkerPool,
};
use test_utils::{fixture_run_time, ForecastFixture};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeFetcher {
    urls: Mutex<Vec<String>>,
    /// Models whose download fails
    failing: Vec<String>,
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> PipelineResult<u64> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.failing.iter().any(|m| url.contains(m.as_str())) {
            return Err(PipelineError::DownloadFailure {
                url: url.to_string(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        std::fs::write(dest, b"not really netcdf").unwrap();
        Ok(17)
    }
}

impl FakeFetcher {
    fn calls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

struct FakeOpener {
    dataset: MemoryDataset,
    fail: bool,
}

impl DatasetOpener for FakeOpener {
    fn open(&self, path: &Path) -> PipelineResult<Box<dyn ForecastDataset>> {
        assert!(path.exists(), "opened a file that is not on disk");
        if self.fail {
            return Err(PipelineError::DatasetOpenFailure {
                path: path.to_path_buf(),
                message: "HDF error".to_string(),
            });
        }
        Ok(Box::new(self.dataset.clone()))
    }
}

/// Blocks while opening and records how far a runtime ticker advanced
/// meanwhile.
struct SlowOpener {
    dataset: MemoryDataset,
    ticks: Arc<AtomicUsize>,
    ticks_while_open: AtomicUsize,
}

impl DatasetOpener for SlowOpener {
    fn open(&self, _path: &Path) -> PipelineResult<Box<dyn ForecastDataset>> {
        let start = self.ticks.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(250));
        let advanced = self.ticks.load(Ordering::SeqCst) - start;
        self.ticks_while_open.store(advanced, Ordering::SeqCst);
        Ok(Box::new(self.dataset.clone()))
    }
}

#[derive(Default)]
struct RecordingRenderer {
    rendered: Mutex<Vec<String>>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    slow_on: Option<String>,
}

impl Renderer for RecordingRenderer {
    fn render(&self, task: &RenderTask) -> TaskResult {
        if self.panic_on.as_deref() == Some(task.filename.as_str()) {
            panic!("drawing backend exploded");
        }
        if self.slow_on.as_deref() == Some(task.filename.as_str()) {
            std::thread::sleep(Duration::from_millis(400));
        }
        self.rendered.lock().unwrap().push(task.filename.clone());
        if self.fail_on.as_deref() == Some(task.filename.as_str()) {
            return TaskResult::failure(&task.filename, "contourf: no levels in range");
        }
        TaskResult::success(&task.filename)
    }
}

impl RecordingRenderer {
    fn names(&self) -> BTreeSet<String> {
        self.rendered.lock().unwrap().iter().cloned().collect()
    }
}

fn dataset_without_skt() -> MemoryDataset {
    ForecastFixture::new().without("skt").build().unwrap()
}

fn test_config(root: &Path, models: &[&str]) -> MapConfig {
    MapConfig {
        output_dir: root.join("out"),
        download_dir: root.join("downloads"),
        workers: 3,
        models: models.iter().map(|m| m.to_string()).collect(),
        ..MapConfig::default()
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn completed(report: &RunReport, index: usize) -> &RunSummary {
    match &report.models[index].outcome {
        ModelOutcome::Completed { summary } => summary,
        other => panic!("model {} did not complete: {:?}", index, other),
    }
}

struct Harness {
    fetcher: Arc<FakeFetcher>,
    renderer: Arc<RecordingRenderer>,
    orchestrator: Orchestrator,
}

fn harness(
    config: MapConfig,
    fetcher: FakeFetcher,
    opener: FakeOpener,
    renderer: RecordingRenderer,
) -> Harness {
    let fetcher = Arc::new(fetcher);
    let renderer = Arc::new(renderer);
    let orchestrator = Orchestrator::new(
        Arc::new(config),
        fetcher.clone(),
        Arc::new(opener),
        renderer.clone(),
    );
    Harness {
        fetcher,
        renderer,
        orchestrator,
    }
}

// ============================================================================
// Task Builder
// ============================================================================

#[test]
fn test_builds_72_tasks_when_one_variable_is_absent() {
    let config = MapConfig::default();
    let dataset = dataset_without_skt();
    assert_eq!(dataset.lead_count(), 9);

    let tasks = TaskBuilder::new(&config, "FOUR_v200_GFS", fixture_run_time().date_naive())
        .build(&dataset);

    assert_eq!(tasks.len(), 8 * 3 * 3);
    assert!(tasks.iter().all(|t| !t.filename.starts_with("skt")));
}

#[test]
fn test_filenames_are_pairwise_unique() {
    let config = MapConfig::default();
    let dataset = ForecastFixture::new().build().unwrap();
    let tasks = TaskBuilder::new(&config, "GRAP_v100_GFS", fixture_run_time().date_naive())
        .build(&dataset);

    let names: BTreeSet<&str> = tasks.iter().map(|t| t.filename.as_str()).collect();
    assert_eq!(tasks.len(), 81);
    assert_eq!(names.len(), tasks.len());
    assert!(names.contains("hgt_500f048europe_GRAP.png"));
}

#[test]
fn test_absent_vector_component_skips_only_its_variable() {
    let config = MapConfig::default();
    let dataset = ForecastFixture::new().without("v10").build().unwrap();
    let tasks = TaskBuilder::new(&config, "FOUR", fixture_run_time().date_naive()).build(&dataset);

    assert_eq!(tasks.len(), 72);
    assert!(!tasks.iter().any(|t| t.filename.starts_with("wind_10m")));
}

#[test]
fn test_tasks_are_self_contained() {
    let config = MapConfig::default();
    let dataset = dataset_without_skt();
    let tasks = TaskBuilder::new(&config, "FOUR", fixture_run_time().date_naive()).build(&dataset);
    drop(dataset);

    let hgt = tasks
        .iter()
        .find(|t| t.filename == "hgt_500f000turkey_FOUR.png")
        .unwrap();
    let overlay = hgt.contours.as_ref().unwrap();
    assert_eq!(overlay.grid.lons, hgt.field.lons);
    assert!(hgt.field.value_range().is_some());

    // A task survives a serialization round trip unchanged
    let json = serde_json::to_string(hgt).unwrap();
    let back: RenderTask = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, hgt);
}

#[test]
fn test_europe_crop_crosses_prime_meridian() {
    let config = MapConfig::default();
    let dataset = dataset_without_skt();
    let tasks = TaskBuilder::new(&config, "FOUR", fixture_run_time().date_naive()).build(&dataset);
    let europe = tasks
        .iter()
        .find(|t| t.filename == "temp_2mf000europe_FOUR.png")
        .unwrap();

    assert_eq!(europe.field.lons.first(), Some(&-21.0));
    assert_eq!(europe.field.lons.last(), Some(&61.0));
}

// ============================================================================
// Worker Pool + Aggregator
// ============================================================================

fn batch(n: usize) -> Vec<RenderTask> {
    let config = MapConfig::default();
    let dataset = dataset_without_skt();
    let mut tasks =
        TaskBuilder::new(&config, "FOUR", fixture_run_time().date_naive()).build(&dataset);
    tasks.truncate(n);
    tasks
}

#[tokio::test]
async fn test_one_injected_failure_affects_no_other_task() {
    let tasks = batch(72);
    let victim = tasks[40].filename.clone();
    let renderer = Arc::new(RecordingRenderer {
        fail_on: Some(victim.clone()),
        ..RecordingRenderer::default()
    });

    let pool = WorkerPool::new(4, renderer.clone());
    let summary = drain("FOUR", pool.submit(tasks)).await;

    assert_eq!(summary.total, 72);
    assert_eq!(summary.succeeded, 71);
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.failed[0].filename, victim);
    assert_eq!(renderer.names().len(), 72);
}

#[tokio::test]
async fn test_panicking_render_becomes_failure_result() {
    let tasks = batch(12);
    let victim = tasks[3].filename.clone();
    let renderer = Arc::new(RecordingRenderer {
        panic_on: Some(victim.clone()),
        ..RecordingRenderer::default()
    });

    let summary = drain("FOUR", WorkerPool::new(2, renderer.clone()).submit(tasks)).await;

    assert_eq!(summary.total, 12);
    assert_eq!(summary.succeeded, 11);
    assert_eq!(summary.failed[0].filename, victim);
    assert!(summary.failed[0].message.contains("panicked"));
}

#[tokio::test]
async fn test_hung_task_times_out_without_blocking_others() {
    let tasks = batch(6);
    let victim = tasks[0].filename.clone();
    let renderer = Arc::new(RecordingRenderer {
        slow_on: Some(victim.clone()),
        ..RecordingRenderer::default()
    });

    let pool = WorkerPool::new(2, renderer).with_task_timeout(Some(Duration::from_millis(100)));
    let summary = drain("FOUR", pool.submit(tasks)).await;

    assert_eq!(summary.total, 6);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed[0].filename, victim);
    assert!(summary.failed[0].message.contains("timed out"));
}

// ============================================================================
// Orchestrator
// ============================================================================

#[tokio::test]
async fn test_end_to_end_run_removes_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["FOUR_v200_GFS"]);
    let h = harness(
        config,
        FakeFetcher::default(),
        FakeOpener {
            dataset: dataset_without_skt(),
            fail: false,
        },
        RecordingRenderer::default(),
    );

    let report = h.orchestrator.run_at(noon()).await.unwrap();

    let summary = completed(&report, 0);
    assert_eq!(summary.total, 72);
    assert_eq!(summary.succeeded, 72);
    assert_eq!(h.renderer.names().len(), 72);
    assert_eq!(
        h.fetcher.calls(),
        vec!["https://noaa-oar-mlwp-data.s3.amazonaws.com/FOUR_v200_GFS/2024/0115/FOUR_v200_GFS_2024011500_f000_f240_06.nc"]
    );
    assert!(files_in(&dir.path().join("downloads")).is_empty());
}

#[tokio::test]
async fn test_download_failure_skips_only_that_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["FOUR_v200_GFS", "PANG_v100_GFS"]);
    let h = harness(
        config,
        FakeFetcher {
            failing: vec!["FOUR_v200_GFS".to_string()],
            ..FakeFetcher::default()
        },
        FakeOpener {
            dataset: dataset_without_skt(),
            fail: false,
        },
        RecordingRenderer::default(),
    );

    let report = h.orchestrator.run_at(noon()).await.unwrap();

    assert!(matches!(
        report.models[0].outcome,
        ModelOutcome::DownloadFailed { .. }
    ));
    assert_eq!(completed(&report, 1).succeeded, 72);
    assert!(h.renderer.names().iter().all(|n| n.ends_with("_PANG.png")));
    assert!(files_in(&dir.path().join("downloads")).is_empty());
}

#[tokio::test]
async fn test_open_failure_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["AURO_v100_GFS"]);
    let h = harness(
        config,
        FakeFetcher::default(),
        FakeOpener {
            dataset: dataset_without_skt(),
            fail: true,
        },
        RecordingRenderer::default(),
    );

    let report = h.orchestrator.run_at(noon()).await.unwrap();

    assert!(matches!(report.models[0].outcome, ModelOutcome::OpenFailed { .. }));
    assert!(h.renderer.names().is_empty());
    assert!(files_in(&dir.path().join("downloads")).is_empty());
}

#[tokio::test]
async fn test_render_panic_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["FOUR_v200_GFS"]);
    let h = harness(
        config,
        FakeFetcher::default(),
        FakeOpener {
            dataset: dataset_without_skt(),
            fail: false,
        },
        RecordingRenderer {
            panic_on: Some("mslpf024turkey_FOUR.png".to_string()),
            ..RecordingRenderer::default()
        },
    );

    let report = h.orchestrator.run_at(noon()).await.unwrap();

    let summary = completed(&report, 0);
    assert_eq!(summary.succeeded, 71);
    assert_eq!(summary.failed[0].filename, "mslpf024turkey_FOUR.png");
    assert!(files_in(&dir.path().join("downloads")).is_empty());
}

#[tokio::test]
async fn test_existing_source_file_skips_download() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["FOUR_v200_GFS"]);
    let downloads = config.download_dir.clone();
    let h = harness(
        config,
        FakeFetcher::default(),
        FakeOpener {
            dataset: dataset_without_skt(),
            fail: false,
        },
        RecordingRenderer::default(),
    );

    // First run downloads
    h.orchestrator.run_at(noon()).await.unwrap();
    let first = h.renderer.names();
    assert_eq!(h.fetcher.calls().len(), 1);

    // Second run finds the file already on disk
    std::fs::write(
        downloads.join("FOUR_v200_GFS_2024011500_f000_f240_06.nc"),
        b"cached",
    )
    .unwrap();
    h.renderer.rendered.lock().unwrap().clear();
    let report = h.orchestrator.run_at(noon()).await.unwrap();

    assert_eq!(h.fetcher.calls().len(), 1);
    assert_eq!(completed(&report, 0).succeeded, 72);
    assert_eq!(h.renderer.names(), first);
    assert!(files_in(&downloads).is_empty());
}

#[tokio::test]
async fn test_reference_date_follows_cutoff_hour() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["FOUR_v200_GFS"]);
    let h = harness(
        config,
        FakeFetcher::default(),
        FakeOpener {
            dataset: ForecastFixture::new().leads(9).build().unwrap(),
            fail: false,
        },
        RecordingRenderer::default(),
    );

    let before = Utc.with_ymd_and_hms(2024, 3, 1, 5, 59, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2024, 3, 1, 6, 1, 0).unwrap();
    h.orchestrator.run_at(before).await.unwrap();
    h.orchestrator.run_at(after).await.unwrap();

    let calls = h.fetcher.calls();
    assert!(calls[0].ends_with("/2024/0229/FOUR_v200_GFS_2024022900_f000_f240_06.nc"));
    assert!(calls[1].ends_with("/2024/0301/FOUR_v200_GFS_2024030100_f000_f240_06.nc"));
}

#[tokio::test]
async fn test_invalid_config_aborts_before_any_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig {
        workers: 0,
        ..test_config(dir.path(), &["FOUR_v200_GFS"])
    };
    let h = harness(
        config,
        FakeFetcher::default(),
        FakeOpener {
            dataset: dataset_without_skt(),
            fail: false,
        },
        RecordingRenderer::default(),
    );

    let err = h.orchestrator.run_at(noon()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_png_renderer_writes_maps() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["FOUR_v200_GFS"]);
    config.variables.retain(|v| v.key == "z");
    config.domains.retain(|d| d.name == "marmara");
    config.image = ImageConfig {
        width: 360,
        height: 280,
        ..ImageConfig::default()
    };
    let renderer = PngRenderer::from_config(&config.image, &config.output_dir).unwrap();
    let out = config.output_dir.clone();

    let orchestrator = Orchestrator::new(
        Arc::new(config),
        Arc::new(FakeFetcher::default()),
        Arc::new(FakeOpener {
            dataset: dataset_without_skt(),
            fail: false,
        }),
        Arc::new(renderer),
    );
    let report = orchestrator.run_at(noon()).await.unwrap();

    assert_eq!(completed(&report, 0).succeeded, 3);
    let mut written: Vec<String> = files_in(&out)
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    written.sort();
    assert_eq!(
        written,
        vec![
            "hgt_500f000marmara_FOUR.png",
            "hgt_500f024marmara_FOUR.png",
            "hgt_500f048marmara_FOUR.png",
        ]
    );
}

#[tokio::test]
async fn test_dataset_open_does_not_block_the_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["FOUR_v200_GFS"]);
    config.variables.truncate(1);

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = ticks.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let opener = Arc::new(SlowOpener {
        dataset: dataset_without_skt(),
        ticks: ticks.clone(),
        ticks_while_open: AtomicUsize::new(0),
    });
    let orchestrator = Orchestrator::new(
        Arc::new(config),
        Arc::new(FakeFetcher::default()),
        opener.clone(),
        Arc::new(RecordingRenderer::default()),
    );

    let report = orchestrator.run_at(noon()).await.unwrap();
    ticker.abort();

    assert_eq!(completed(&report, 0).succeeded, 9);
    // Single-threaded test runtime: the ticker only advances if the open
    // ran off the runtime thread
    assert!(opener.ticks_while_open.load(Ordering::SeqCst) >= 5);
}
