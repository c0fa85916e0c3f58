#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assetdag::config::ConfigFile;
use assetdag::dag::TaskRegistry;
use assetdag::engine::{Runtime, RuntimeEvent, RuntimeOptions};
use assetdag::exec::RealExecutorBackend;
use assetdag::facade::BuildFacade;
use assetdag::fs::RealFileSystem;
use assetdag::tasks::TaskContext;
use assetdag_test_utils::fake_executor::FakeExecutor;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub use assetdag_test_utils::{init_tracing, with_timeout};

/// A project tree in a temporary directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write project file");
        self
    }

    pub fn read_string(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel))
            .unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Facade over the real filesystem with the standard toolchain.
    pub fn facade(&self, config: ConfigFile) -> BuildFacade {
        let ctx = TaskContext::new(self.root(), Arc::new(RealFileSystem), Arc::new(config));
        BuildFacade::new(ctx).expect("valid task graph")
    }
}

/// Runtime that runs actions on the blocking pool, as the binary does.
pub fn real_runtime(
    registry: Arc<TaskRegistry>,
    max_concurrency: usize,
) -> Runtime<RealExecutorBackend> {
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(tx);
    Runtime::new(registry, rx, executor, RuntimeOptions { max_concurrency })
}

/// Runtime over [`FakeExecutor`]; the returned list holds dispatched task
/// names in dispatch order.
pub fn fake_runtime(
    registry: TaskRegistry,
    max_concurrency: usize,
) -> (Runtime<FakeExecutor>, Arc<Mutex<Vec<String>>>) {
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx, Arc::clone(&executed));
    let runtime = Runtime::new(
        Arc::new(registry),
        rx,
        executor,
        RuntimeOptions { max_concurrency },
    );
    (runtime, executed)
}

/// A small PNG that the optimizer can shrink.
pub fn sample_png() -> Vec<u8> {
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};
    use image::{DynamicImage, ImageBuffer, Rgb};

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(32, 32, |x, y| Rgb([((x + y) % 2) as u8 * 200, 0, 40]));
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter);
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(encoder)
        .expect("encode sample png");
    out
}
