use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use scanshelf_application::{
    ApplicationError, Job, JobReport, JobRunner, PageRenderer, RenderOutcome,
};
use scanshelf_domain::{DocumentId, Raster};
use tracing::warn;

/// Bounded worker pool shared by renders and background jobs. `workers == 0`
/// sizes it to the available cores.
pub fn build_pool(workers: usize) -> Result<Arc<ThreadPool>, ApplicationError> {
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("scanshelf-render-{index}"))
        .build()
        .map(Arc::new)
        .map_err(|error| ApplicationError::InvalidInput(format!("render pool: {error}")))
}

/// Runs page renders off the caller's thread and reports through callbacks.
#[derive(Clone)]
pub struct RenderPool {
    pool: Arc<ThreadPool>,
    renderer: Arc<dyn PageRenderer>,
}

impl RenderPool {
    pub fn new(pool: Arc<ThreadPool>, renderer: Arc<dyn PageRenderer>) -> Self {
        Self { pool, renderer }
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn submit_preview<F>(&self, document_id: DocumentId, index: u32, target_width: u32, done: F)
    where
        F: FnOnce(Result<Raster, ApplicationError>) + Send + 'static,
    {
        let renderer = Arc::clone(&self.renderer);
        self.pool.spawn(move || {
            let result = renderer.render_preview(&document_id, index, target_width);
            if let Err(error) = &result {
                warn!(document = %document_id, index, %error, "preview failed");
            }
            done(result);
        });
    }

    pub fn submit_persist<F>(&self, document_id: DocumentId, index: u32, quality: u8, done: F)
    where
        F: FnOnce(Result<RenderOutcome, ApplicationError>) + Send + 'static,
    {
        let renderer = Arc::clone(&self.renderer);
        self.pool.spawn(move || {
            let result = renderer.render_and_persist(&document_id, index, quality);
            if let Err(error) = &result {
                warn!(document = %document_id, index, %error, "render failed");
            }
            done(result);
        });
    }
}

/// Executes [`Job`]s on the pool; the outcome goes to the callback.
#[derive(Clone)]
pub struct BackgroundJobs {
    pool: Arc<ThreadPool>,
    runner: Arc<JobRunner>,
}

impl BackgroundJobs {
    pub fn new(pool: Arc<ThreadPool>, runner: Arc<JobRunner>) -> Self {
        Self { pool, runner }
    }

    pub fn submit<F>(&self, job: Job, done: F)
    where
        F: FnOnce(Result<JobReport, ApplicationError>) + Send + 'static,
    {
        let runner = Arc::clone(&self.runner);
        self.pool.spawn(move || {
            let result = runner.run(&job);
            if let Err(error) = &result {
                warn!(job = job.name(), %error, "job failed");
            }
            done(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    use scanshelf_application::ThumbnailArtifact;
    use scanshelf_domain::EncodedPage;

    use super::*;

    const WAIT: Duration = Duration::from_secs(10);

    #[derive(Default)]
    struct CountingRenderer {
        threads: Mutex<Vec<String>>,
    }

    impl CountingRenderer {
        fn note_thread(&self) {
            let name = std::thread::current()
                .name()
                .unwrap_or_default()
                .to_string();
            self.threads.lock().expect("lock").push(name);
        }
    }

    impl PageRenderer for CountingRenderer {
        fn render_preview(
            &self,
            _document_id: &DocumentId,
            index: u32,
            target_width: u32,
        ) -> Result<Raster, ApplicationError> {
            self.note_thread();
            if index == 9 {
                return Err(ApplicationError::MissingAsset("page_0009".to_string()));
            }
            Ok(Raster::new(target_width, 1, vec![0; target_width as usize * 4])?)
        }

        fn render_final(
            &self,
            document_id: &DocumentId,
            index: u32,
            _quality: u8,
        ) -> Result<Raster, ApplicationError> {
            self.render_preview(document_id, index, 1)
        }

        fn render_final_jpeg(
            &self,
            _document_id: &DocumentId,
            index: u32,
            _quality: u8,
        ) -> Result<EncodedPage, ApplicationError> {
            Err(ApplicationError::Decode(format!("page {index}")))
        }

        fn render_and_persist(
            &self,
            _document_id: &DocumentId,
            index: u32,
            _quality: u8,
        ) -> Result<RenderOutcome, ApplicationError> {
            self.note_thread();
            Ok(RenderOutcome::Persisted {
                path: PathBuf::from(format!("page_{index:04}/render.jpg")),
            })
        }

        fn render_thumbnail(
            &self,
            _document_id: &DocumentId,
            index: u32,
            _max_edge: u32,
        ) -> Result<ThumbnailArtifact, ApplicationError> {
            Err(ApplicationError::Decode(format!("page {index}")))
        }
    }

    fn doc() -> DocumentId {
        DocumentId::new("doc").expect("id")
    }

    #[test]
    fn previews_are_delivered_from_named_workers() {
        let renderer = Arc::new(CountingRenderer::default());
        let pool = RenderPool::new(build_pool(2).expect("pool"), renderer.clone());
        assert_eq!(pool.workers(), 2);

        let (tx, rx) = mpsc::channel();
        for index in 0..4 {
            let tx = tx.clone();
            pool.submit_preview(doc(), index, 8, move |result| {
                tx.send((index, result.map(|raster| raster.width)))
                    .expect("send");
            });
        }

        let mut widths: Vec<(u32, u32)> = (0..4)
            .map(|_| {
                let (index, width) = rx.recv_timeout(WAIT).expect("result");
                (index, width.expect("preview"))
            })
            .collect();
        widths.sort();
        assert_eq!(widths, vec![(0, 8), (1, 8), (2, 8), (3, 8)]);
        assert!(renderer
            .threads
            .lock()
            .expect("lock")
            .iter()
            .all(|name| name.starts_with("scanshelf-render-")));
    }

    #[test]
    fn failures_reach_the_callback() {
        let pool = RenderPool::new(build_pool(1).expect("pool"), Arc::new(CountingRenderer::default()));
        let (tx, rx) = mpsc::channel();
        pool.submit_preview(doc(), 9, 8, move |result| {
            tx.send(result).expect("send");
        });

        let result = rx.recv_timeout(WAIT).expect("result");
        assert!(matches!(result, Err(ApplicationError::MissingAsset(_))));
    }

    #[test]
    fn persist_outcome_is_forwarded() {
        let pool = RenderPool::new(build_pool(0).expect("pool"), Arc::new(CountingRenderer::default()));
        let (tx, rx) = mpsc::channel();
        pool.submit_persist(doc(), 2, 90, move |result| {
            tx.send(result).expect("send");
        });

        assert_eq!(
            rx.recv_timeout(WAIT).expect("result").expect("outcome"),
            RenderOutcome::Persisted {
                path: PathBuf::from("page_0002/render.jpg")
            }
        );
    }
}
