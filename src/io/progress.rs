use std::sync::{Mutex, OnceLock};

type DownloadCb = Box<dyn Fn(u64, u64) + Send + 'static>;
type PipelineCb = Box<dyn Fn(PipelineProgress) + Send + 'static>;

static DOWNLOAD_PROGRESS_CB: OnceLock<Mutex<Option<DownloadCb>>> = OnceLock::new();
static PIPELINE_PROGRESS_CB: OnceLock<Mutex<Option<PipelineCb>>> = OnceLock::new();

#[derive(Clone, Debug, PartialEq)]
pub enum PipelineProgress {
    /// A pipeline stage started: "acquire", "separate", "resolve_stems",
    /// "probe", "record", "clean", "mix", "finalize".
    Stage(&'static str),
    /// An external tool exited.
    ToolExited { tool: String, success: bool },
    Finished,
}

pub fn set_download_progress_callback(cb: impl Fn(u64, u64) + Send + 'static) {
    let slot = DOWNLOAD_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn set_pipeline_progress_callback(cb: impl Fn(PipelineProgress) + Send + 'static) {
    let slot = PIPELINE_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn emit_download_progress(done: u64, total: u64) {
    if let Some(m) = DOWNLOAD_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(done, total);
            }
        }
    }
}

pub fn emit_pipeline_progress(p: PipelineProgress) {
    if let Some(m) = PIPELINE_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(p);
            }
        }
    }
}

pub(crate) fn stage(name: &'static str) {
    tracing::info!(stage = name, "stage started");
    emit_pipeline_progress(PipelineProgress::Stage(name));
}
