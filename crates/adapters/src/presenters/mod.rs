use scanshelf_application::{CacheCleanReport, ImportSummary, JobReport, RenderOutcome};
use scanshelf_domain::{Document, EditOperation, Folder, Page};

pub fn present_document_row(document: &Document) -> String {
    format!(
        "{}\t{}\t{} pages\tcover={}\t{}\t{}",
        document.id,
        document.status.as_str(),
        document.page_count,
        document.cover_index,
        document.title,
        document.labels.join(",")
    )
}

pub fn present_page_row(page: &Page) -> String {
    let state = if page.needs_render() {
        "dirty"
    } else if page.rendered_path.is_some() {
        "rendered"
    } else {
        "original"
    };
    format!(
        "{:>4}\t{}x{}@{}dpi\t{}\t{}",
        page.index, page.width, page.height, page.dpi, state, page.original_path
    )
}

pub fn present_folder_row(folder: &Folder) -> String {
    match folder.parent_id {
        Some(parent) => format!("{}\t{}\tparent={}", folder.id, folder.name, parent),
        None => format!("{}\t{}", folder.id, folder.name),
    }
}

pub fn present_edit(edit: &EditOperation) -> String {
    let mut line = format!(
        "rotate={} filter={:?} contrast={} brightness={} sharpen={}",
        edit.rotate.degrees(),
        edit.filter.mode,
        edit.filter.contrast,
        edit.filter.brightness,
        edit.filter.sharpen
    );
    if let Some(crop) = edit.crop {
        line.push_str(&format!(
            " crop={},{},{},{}",
            crop.left, crop.top, crop.width, crop.height
        ));
    }
    if edit.denoise != 0.0 {
        line.push_str(&format!(" denoise={}", edit.denoise));
    }
    if edit.deskew != 0.0 {
        line.push_str(&format!(" deskew={}", edit.deskew));
    }
    if edit.warp.is_some() {
        line.push_str(" warp=set");
    }
    line
}

pub fn present_import_summary(summary: &ImportSummary) -> String {
    let mut line = format!(
        "import finished: scanned={}, supported={}, imported={}",
        summary.scanned_files, summary.supported_files, summary.imported
    );
    if !summary.skipped.is_empty() {
        line.push_str(&format!(", skipped={}", summary.skipped.join(" ")));
    }
    line
}

pub fn present_render_outcome(outcome: &RenderOutcome) -> String {
    match outcome {
        RenderOutcome::Persisted { path } => format!("rendered {}", path.display()),
        RenderOutcome::Superseded => "render superseded by a newer one".to_string(),
    }
}

fn present_cache_report(report: &CacheCleanReport) -> String {
    format!(
        "cache cleaned: {} -> {} bytes, {} files removed",
        report.bytes_before, report.bytes_after, report.files_removed
    )
}

pub fn present_job_report(report: &JobReport) -> String {
    match report {
        JobReport::CacheCleaned(report) => present_cache_report(report),
        JobReport::Thumbnails(artifacts) => {
            let mut lines = vec![format!("{} thumbnails", artifacts.len())];
            lines.extend(artifacts.iter().map(|artifact| {
                format!(
                    "{:>4}\t{}x{}\t{}",
                    artifact.page_index, artifact.width, artifact.height, artifact.file_path
                )
            }));
            lines.join("\n")
        }
        JobReport::Rendered {
            persisted,
            superseded,
        } => format!("rendered {persisted} pages ({superseded} superseded)"),
        JobReport::Exported(record) => format!(
            "exported {} {} to {}",
            record.document_id,
            record.kind.as_str(),
            record.artifact_path
        ),
    }
}
