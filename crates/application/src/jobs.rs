use std::sync::Arc;

use scanshelf_domain::{DocumentId, EncodedPage, ExportRecord, ExportSettings, Page};
use tracing::{debug, info, warn};

use crate::{
    ApplicationError, AssetStore, CacheCleanReport, CatalogRepository, Clock, ExportWriter,
    NewExport, PageRenderer, RenderOutcome, ThumbnailArtifact,
};

/// Work that runs off the interactive path. A job either succeeds as a whole
/// or fails; there is no partial progress and no retry.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    CleanCache {
        max_bytes: u64,
    },
    /// Thumbnails for one page, or for every page when `page_index` is `None`.
    Thumbnails {
        document_id: DocumentId,
        page_index: Option<u32>,
        max_edge: u32,
    },
    /// Persists final renders. Without a page index only pages whose edit
    /// record changed since their last render are processed.
    Render {
        document_id: DocumentId,
        page_index: Option<u32>,
        quality: u8,
    },
    Export {
        document_id: DocumentId,
        settings: ExportSettings,
    },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CleanCache { .. } => "clean_cache",
            Self::Thumbnails { .. } => "thumbnails",
            Self::Render { .. } => "render",
            Self::Export { .. } => "export",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobReport {
    CacheCleaned(CacheCleanReport),
    Thumbnails(Vec<ThumbnailArtifact>),
    Rendered { persisted: usize, superseded: usize },
    Exported(ExportRecord),
}

pub struct JobRunner {
    catalog: Arc<dyn CatalogRepository>,
    assets: Arc<dyn AssetStore>,
    renderer: Arc<dyn PageRenderer>,
    exporter: Arc<dyn ExportWriter>,
    clock: Arc<dyn Clock>,
}

impl JobRunner {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        assets: Arc<dyn AssetStore>,
        renderer: Arc<dyn PageRenderer>,
        exporter: Arc<dyn ExportWriter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            assets,
            renderer,
            exporter,
            clock,
        }
    }

    pub fn run(&self, job: &Job) -> Result<JobReport, ApplicationError> {
        let report = match job {
            Job::CleanCache { max_bytes } => {
                JobReport::CacheCleaned(self.assets.clean_cache(*max_bytes)?)
            }
            Job::Thumbnails {
                document_id,
                page_index,
                max_edge,
            } => JobReport::Thumbnails(self.thumbnails(document_id, *page_index, *max_edge)?),
            Job::Render {
                document_id,
                page_index,
                quality,
            } => self.render(document_id, *page_index, *quality)?,
            Job::Export {
                document_id,
                settings,
            } => JobReport::Exported(self.export(document_id, settings)?),
        };
        info!(job = job.name(), "job finished");
        Ok(report)
    }

    fn thumbnails(
        &self,
        document_id: &DocumentId,
        page_index: Option<u32>,
        max_edge: u32,
    ) -> Result<Vec<ThumbnailArtifact>, ApplicationError> {
        let pages = self.target_pages(document_id, page_index)?;
        let (artifacts, failed) = collect_per_page(document_id, &pages, |page| {
            self.renderer
                .render_thumbnail(document_id, page.index, max_edge)
        });
        fail_on_pages(document_id, failed)?;
        Ok(artifacts)
    }

    fn render(
        &self,
        document_id: &DocumentId,
        page_index: Option<u32>,
        quality: u8,
    ) -> Result<JobReport, ApplicationError> {
        let pages: Vec<Page> = match page_index {
            Some(_) => self.target_pages(document_id, page_index)?,
            None => self
                .target_pages(document_id, None)?
                .into_iter()
                .filter(Page::needs_render)
                .collect(),
        };
        let (outcomes, failed) = collect_per_page(document_id, &pages, |page| {
            self.renderer
                .render_and_persist(document_id, page.index, quality)
        });
        fail_on_pages(document_id, failed)?;

        let superseded = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, RenderOutcome::Superseded))
            .count();
        Ok(JobReport::Rendered {
            persisted: outcomes.len() - superseded,
            superseded,
        })
    }

    fn export(
        &self,
        document_id: &DocumentId,
        settings: &ExportSettings,
    ) -> Result<ExportRecord, ApplicationError> {
        let pages = self.target_pages(document_id, None)?;
        if pages.is_empty() {
            return Err(ApplicationError::InvalidInput(format!(
                "document {document_id} has no pages to export"
            )));
        }

        let (encoded, failed): (Vec<EncodedPage>, Vec<u32>) =
            collect_per_page(document_id, &pages, |page| {
                self.renderer
                    .render_final_jpeg(document_id, page.index, settings.quality)
            });
        fail_on_pages(document_id, failed)?;

        let version = self
            .catalog
            .list_exports(document_id)?
            .len() as u32
            + 1;
        let destination = self
            .assets
            .export_path(document_id, version, settings.kind)?;
        self.exporter
            .write_export(settings.kind, &encoded, &destination)?;

        let settings_json = serde_json::to_string(settings)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let record = self.catalog.insert_export(&NewExport {
            document_id: document_id.clone(),
            kind: settings.kind,
            artifact_path: destination.to_string_lossy().to_string(),
            settings_json,
            created_at: self.clock.now_timestamp_string(),
        })?;
        debug!(document = %document_id, version, pages = encoded.len(), "export written");
        Ok(record)
    }

    fn target_pages(
        &self,
        document_id: &DocumentId,
        page_index: Option<u32>,
    ) -> Result<Vec<Page>, ApplicationError> {
        if self.catalog.find_document(document_id)?.is_none() {
            return Err(ApplicationError::NotFound(format!("document {document_id}")));
        }
        match page_index {
            Some(index) => {
                let page = self.catalog.find_page(document_id, index)?.ok_or_else(|| {
                    ApplicationError::NotFound(format!("page {index} of document {document_id}"))
                })?;
                Ok(vec![page])
            }
            None => self.catalog.list_pages(document_id),
        }
    }
}

/// Runs `work` for every page; a failing page never stops its siblings.
fn collect_per_page<T>(
    document_id: &DocumentId,
    pages: &[Page],
    mut work: impl FnMut(&Page) -> Result<T, ApplicationError>,
) -> (Vec<T>, Vec<u32>) {
    let mut done = Vec::with_capacity(pages.len());
    let mut failed = Vec::new();
    for page in pages {
        match work(page) {
            Ok(value) => done.push(value),
            Err(error) => {
                warn!(
                    document = %document_id,
                    page = page.index,
                    fatal = error.is_fatal_for_page(),
                    %error,
                    "page failed"
                );
                failed.push(page.index);
            }
        }
    }
    (done, failed)
}

fn fail_on_pages(document_id: &DocumentId, failed: Vec<u32>) -> Result<(), ApplicationError> {
    if failed.is_empty() {
        return Ok(());
    }
    Err(ApplicationError::PagesFailed {
        document: document_id.clone(),
        pages: failed,
    })
}
