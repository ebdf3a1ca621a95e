use crate::compose::{BurnJob, Composer};
use crate::cover::CoverRenderer;
use crate::{logi, logok, logw};
use anyhow::{Context, Result, anyhow, bail};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

const VIDEO_EXTS: &[&str] = &["mp4", "mkv", "mov", "webm", "m4v"];
const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn log(&self, what: &str) {
        for outcome in self.outcomes.iter().filter(|o| !o.is_ok()) {
            logw(format!(
                "FAILED {}: {}",
                outcome.input.display(),
                outcome.error.as_deref().unwrap_or_default()
            ));
        }
        logi(format!(
            "{what}: {} ok, {} failed",
            self.succeeded(),
            self.failed()
        ));
    }
}

pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| exts.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn files_under(dir: &Path, skip: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || is_hidden(path) || path.starts_with(skip) {
            continue;
        }
        if has_ext(path, exts) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// `<stem>.<kind>.srt` beside the video, else `<kind>.srt` in its directory.
fn side_file(video: &Path, kind: &str) -> Option<PathBuf> {
    let dir = video.parent().unwrap_or(Path::new("."));
    [
        dir.join(format!("{}.{kind}.srt", stem(video))),
        dir.join(format!("{kind}.srt")),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// `out_dir` plus the folder of `file` relative to `input_dir`, so inputs
/// that share a stem in different folders never share an output.
fn mirrored_output(input_dir: &Path, out_dir: &Path, file: &Path, name: &str) -> PathBuf {
    let rel_dir = file
        .strip_prefix(input_dir)
        .ok()
        .and_then(Path::parent)
        .unwrap_or(Path::new(""));
    out_dir.join(rel_dir).join(name)
}

/// Records `output` as belonging to `input`; fails if another input already
/// claimed it.
fn claim_output(claimed: &mut HashMap<PathBuf, PathBuf>, output: &Path, input: &Path) -> Result<()> {
    if let Some(first) = claimed.insert(output.to_path_buf(), input.to_path_buf()) {
        bail!(
            "{} and {} would both write {}",
            first.display(),
            input.display(),
            output.display()
        );
    }
    Ok(())
}

/// Every video under `input_dir` with a translation track. Outputs go to
/// `out_dir/<relative folder>/<stem>_sub.mp4`; two videos mapping to the same
/// output is an error before anything runs.
pub fn discover_burn_jobs(input_dir: &Path, out_dir: &Path) -> Result<Vec<BurnJob>> {
    let mut jobs = Vec::new();
    let mut claimed = HashMap::new();
    for video in files_under(input_dir, out_dir, VIDEO_EXTS)? {
        let name = stem(&video);
        if name.ends_with("_sub") {
            continue;
        }
        let Some(translation_srt) = side_file(&video, "trans") else {
            logw(format!("No trans.srt for {}, skipping", video.display()));
            continue;
        };
        let output = mirrored_output(input_dir, out_dir, &video, &format!("{name}_sub.mp4"));
        claim_output(&mut claimed, &output, &video)?;
        jobs.push(BurnJob {
            source_srt: side_file(&video, "src"),
            translation_srt,
            output,
            source_video: video,
        });
    }
    Ok(jobs)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverItem {
    pub image: PathBuf,
    pub title: String,
    pub output: PathBuf,
}

/// Title map keyed by file name or stem.
pub async fn load_title_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read title map: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid title map: {}", path.display()))
}

/// Every image under `input_dir`. Titles come from `titles`, falling back to
/// the file stem. Outputs go to `out_dir/<relative folder>/<stem>_new.png`.
pub fn discover_cover_items(
    input_dir: &Path,
    out_dir: &Path,
    titles: &HashMap<String, String>,
) -> Result<Vec<CoverItem>> {
    let mut items = Vec::new();
    let mut claimed = HashMap::new();
    for image in files_under(input_dir, out_dir, IMAGE_EXTS)? {
        let name = stem(&image);
        if name.ends_with("_new") {
            continue;
        }
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = titles
            .get(&file_name)
            .or_else(|| titles.get(&name))
            .cloned()
            .unwrap_or_else(|| name.clone());
        let output = mirrored_output(input_dir, out_dir, &image, &format!("{name}_new.png"));
        claim_output(&mut claimed, &output, &image)?;
        items.push(CoverItem {
            output,
            title,
            image,
        });
    }
    Ok(items)
}

/// Runs `work` over `items` on `workers` scoped threads fed from a shared
/// queue. Outcomes come back in input order.
pub fn run_pool<T, F>(items: Vec<T>, workers: usize, work: F) -> Result<Vec<ItemOutcome>>
where
    T: Send,
    F: Fn(&T) -> ItemOutcome + Sync,
{
    let total = items.len();
    let workers = workers.clamp(1, total.max(1));
    let (job_tx, job_rx) = crossbeam::channel::unbounded();
    let (done_tx, done_rx) = crossbeam::channel::unbounded();
    for job in items.into_iter().enumerate() {
        job_tx.send(job).map_err(|_| anyhow!("work queue closed"))?;
    }
    drop(job_tx);

    crossbeam::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let work = &work;
            scope.spawn(move |_| {
                for (index, item) in job_rx.iter() {
                    if done_tx.send((index, work(&item))).is_err() {
                        break;
                    }
                }
            });
        }
    })
    .map_err(|_| anyhow!("worker thread panicked"))?;
    drop(done_tx);

    let mut outcomes: Vec<(usize, ItemOutcome)> = done_rx.iter().collect();
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

pub fn render_covers(renderer: &CoverRenderer, items: Vec<CoverItem>, workers: usize) -> Result<BatchSummary> {
    logi(format!("Rendering {} covers on {} workers", items.len(), workers));
    let outcomes = run_pool(items, workers, |item| {
        let result = renderer.render(&item.image, &item.title, &item.output);
        ItemOutcome {
            input: item.image.clone(),
            output: item.output.clone(),
            error: result.err().map(|err| err.to_string()),
        }
    })?;
    Ok(BatchSummary { outcomes })
}

/// Runs `work` for every item with at most `limit` in flight.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Vec<ItemOutcome>
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ItemOutcome> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let task = work(item);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (index, task.await)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(done) => outcomes.push(done),
            Err(err) => logw(format!("Batch task aborted: {err}")),
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Composes every job with the encoder's concurrency bound. A failed item
/// never stops the others; a configuration error stops items not yet started.
pub async fn burn_all(composer: Arc<Composer>, jobs: Vec<BurnJob>, cores: usize) -> BatchSummary {
    let limit = composer.encoder().concurrency_limit(cores);
    logi(format!("Burning {} videos, {} at a time", jobs.len(), limit));
    let halted = Arc::new(AtomicBool::new(false));

    let outcomes = run_bounded(jobs, limit, |job| {
        let composer = composer.clone();
        let halted = halted.clone();
        async move {
            let mut outcome = ItemOutcome {
                input: job.source_video.clone(),
                output: job.output.clone(),
                error: None,
            };
            if halted.load(Ordering::SeqCst) {
                outcome.error = Some("skipped after a configuration error".into());
                return outcome;
            }
            match composer.run(&job).await {
                Ok(report) => logok(format!("{} ({})", report.output.display(), report.codec)),
                Err(err) => {
                    if err.is_fatal_for_batch() {
                        halted.store(true, Ordering::SeqCst);
                    }
                    outcome.error = Some(err.to_string());
                }
            }
            outcome
        }
    })
    .await;
    BatchSummary { outcomes }
}
