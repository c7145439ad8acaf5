mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use config::AppConfig;
use scanshelf_adapters::{
    build_pool, present_document_row, present_edit, present_folder_row, present_import_summary,
    present_job_report, present_page_row, present_render_outcome, AssetPathResolver,
    BackgroundJobs, FsAssetStore, ImageCrateProbe, PdfExportWriter, RenderEngine, RenderPool,
    SqliteCatalogRepository, SystemClock, WalkdirFileScanner,
};
use scanshelf_application::{
    AddPageCommand, ApplicationError, ApplicationService, BootstrapCatalogCommand,
    CreateDocumentCommand, CreateFolderCommand, DeletePageCommand, ImportFolderCommand, Job,
    JobReport, JobRunner, ListDocumentsCommand, ListFoldersCommand, ListPagesCommand,
    OpenDocumentCommand, PageSource, PurgeDocumentCommand, ReorderPageCommand,
    ReplaceOriginalCommand, SetDocumentStatusCommand, SetPageEditCommand, ShowPageEditCommand,
};
use scanshelf_domain::{
    CropRect, DocumentId, DocumentStatus, EditOperation, ExportSettings, FilterMode, FolderId,
    Rotation,
};

fn main() -> ExitCode {
    logging::init_logging();
    let args: Vec<String> = std::env::args().collect();

    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(error) => return report(error),
    };
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            return ExitCode::from(1);
        }
    };

    let app = match App::build(&config) {
        Ok(app) => app,
        Err(error) => {
            eprintln!("failed to start scanshelf: {error}");
            return ExitCode::from(1);
        }
    };
    if let Err(error) = app.service.bootstrap_catalog(BootstrapCatalogCommand) {
        eprintln!("failed to bootstrap scanshelf: {error}");
        return ExitCode::from(1);
    }

    match run_command(command, &app, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(error),
    }
}

fn report(error: CommandError) -> ExitCode {
    match error {
        CommandError::Usage(msg) => {
            eprintln!("{msg}");
            print_usage();
            ExitCode::from(2)
        }
        CommandError::Runtime(msg) => {
            eprintln!("{msg}");
            ExitCode::from(1)
        }
    }
}

/// Composition root: every collaborator is built here and passed down.
struct App {
    service: ApplicationService,
    renders: RenderPool,
    jobs: BackgroundJobs,
}

impl App {
    fn build(config: &AppConfig) -> Result<Self, ApplicationError> {
        let resolver = AssetPathResolver::new(config.root_dir.clone());
        let catalog = Arc::new(SqliteCatalogRepository::new(config.catalog_path.clone()));
        let assets = Arc::new(FsAssetStore::new(resolver.clone()));
        let clock = Arc::new(SystemClock);
        let renderer = Arc::new(RenderEngine::new(
            catalog.clone(),
            resolver,
            clock.clone(),
        ));
        let pool = build_pool(config.render_workers)?;

        let service = ApplicationService::new(
            catalog.clone(),
            assets.clone(),
            Arc::new(WalkdirFileScanner),
            Arc::new(ImageCrateProbe),
            clock.clone(),
        );
        let runner = JobRunner::new(
            catalog,
            assets,
            renderer.clone(),
            Arc::new(PdfExportWriter),
            clock,
        );
        Ok(Self {
            service,
            renders: RenderPool::new(pool.clone(), renderer),
            jobs: BackgroundJobs::new(pool, Arc::new(runner)),
        })
    }

    /// Submits `job` to the pool and waits for its callback.
    fn run_job(&self, job: Job) -> Result<JobReport, CommandError> {
        let name = job.name();
        let (tx, rx) = mpsc::channel();
        self.jobs.submit(job, move |result| {
            let _ = tx.send(result);
        });
        rx.recv()
            .map_err(|_| CommandError::Runtime(format!("{name} job did not report back")))?
            .map_err(|error| CommandError::Runtime(format!("{name} failed: {error}")))
    }
}

#[derive(Debug, Clone)]
enum Command {
    New { title: String },
    List,
    Pages { document_id: DocumentId },
    Add {
        document_id: DocumentId,
        image: PathBuf,
        index: Option<u32>,
    },
    Move {
        document_id: DocumentId,
        from: u32,
        to: u32,
    },
    Delete { document_id: DocumentId, index: u32 },
    Edit {
        document_id: DocumentId,
        index: u32,
        changes: Vec<EditChange>,
    },
    ShowEdit { document_id: DocumentId, index: u32 },
    Render { document_id: DocumentId, index: u32 },
    Thumbs { document_id: DocumentId },
    Export { document_id: DocumentId },
    Clean { max_bytes: Option<u64> },
    Status {
        document_id: DocumentId,
        status: DocumentStatus,
    },
    Purge { document_id: DocumentId },
    Folder {
        name: String,
        parent_id: Option<FolderId>,
    },
    Folders,
    Import { document_id: DocumentId, folder: String },
    Rescan {
        document_id: DocumentId,
        index: u32,
        image: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum EditChange {
    Reset,
    Rotate(Rotation),
    Filter(FilterMode),
    Contrast(f32),
    Brightness(f32),
    Sharpen(f32),
    Denoise(f32),
    Deskew(f32),
    Crop(Option<CropRect>),
}

#[derive(Debug, Clone)]
enum CommandError {
    Usage(String),
    Runtime(String),
}

fn runtime(context: &str) -> impl FnOnce(ApplicationError) -> CommandError + '_ {
    move |error| CommandError::Runtime(format!("{context} failed: {error}"))
}

fn arg<'a>(args: &'a [String], position: usize, what: &str) -> Result<&'a str, CommandError> {
    args.get(position)
        .map(String::as_str)
        .ok_or_else(|| CommandError::Usage(format!("missing {what}")))
}

fn document_arg(args: &[String], position: usize) -> Result<DocumentId, CommandError> {
    let value = arg(args, position, "document id")?;
    DocumentId::new(value)
        .map_err(|error| CommandError::Usage(format!("invalid document id: {error}")))
}

fn number_arg<T: std::str::FromStr>(
    args: &[String],
    position: usize,
    what: &str,
) -> Result<T, CommandError> {
    let value = arg(args, position, what)?;
    value
        .parse::<T>()
        .map_err(|_| CommandError::Usage(format!("invalid {what}: {value}")))
}

fn parse_command(args: &[String]) -> Result<Command, CommandError> {
    let Some(name) = args.get(1) else {
        return Err(CommandError::Usage("missing command".to_string()));
    };

    match name.as_str() {
        "new" => {
            let title = args.get(2..).unwrap_or_default().join(" ");
            if title.trim().is_empty() {
                return Err(CommandError::Usage("missing document title".to_string()));
            }
            Ok(Command::New { title })
        }
        "list" => Ok(Command::List),
        "pages" => Ok(Command::Pages {
            document_id: document_arg(args, 2)?,
        }),
        "add" => Ok(Command::Add {
            document_id: document_arg(args, 2)?,
            image: PathBuf::from(arg(args, 3, "image path")?),
            index: match args.get(4) {
                Some(_) => Some(number_arg(args, 4, "page index")?),
                None => None,
            },
        }),
        "move" => Ok(Command::Move {
            document_id: document_arg(args, 2)?,
            from: number_arg(args, 3, "source index")?,
            to: number_arg(args, 4, "target index")?,
        }),
        "delete" => Ok(Command::Delete {
            document_id: document_arg(args, 2)?,
            index: number_arg(args, 3, "page index")?,
        }),
        "edit" => {
            let changes = args
                .get(4..)
                .unwrap_or_default()
                .iter()
                .map(|change| parse_edit_change(change))
                .collect::<Result<Vec<_>, _>>()?;
            if changes.is_empty() {
                return Err(CommandError::Usage("missing key=value edits".to_string()));
            }
            Ok(Command::Edit {
                document_id: document_arg(args, 2)?,
                index: number_arg(args, 3, "page index")?,
                changes,
            })
        }
        "show-edit" => Ok(Command::ShowEdit {
            document_id: document_arg(args, 2)?,
            index: number_arg(args, 3, "page index")?,
        }),
        "render" => Ok(Command::Render {
            document_id: document_arg(args, 2)?,
            index: number_arg(args, 3, "page index")?,
        }),
        "thumbs" => Ok(Command::Thumbs {
            document_id: document_arg(args, 2)?,
        }),
        "export" => Ok(Command::Export {
            document_id: document_arg(args, 2)?,
        }),
        "clean" => Ok(Command::Clean {
            max_bytes: match args.get(2) {
                Some(_) => Some(number_arg(args, 2, "byte quota")?),
                None => None,
            },
        }),
        "trash" => Ok(Command::Status {
            document_id: document_arg(args, 2)?,
            status: DocumentStatus::Trashed,
        }),
        "restore" => Ok(Command::Status {
            document_id: document_arg(args, 2)?,
            status: DocumentStatus::Active,
        }),
        "purge" => Ok(Command::Purge {
            document_id: document_arg(args, 2)?,
        }),
        "folder" => {
            let name = arg(args, 2, "folder name")?.to_string();
            let parent_id = match args.get(3) {
                Some(_) => {
                    let raw: i64 = number_arg(args, 3, "parent folder id")?;
                    Some(FolderId::new(raw).map_err(|error| {
                        CommandError::Usage(format!("invalid parent folder id: {error}"))
                    })?)
                }
                None => None,
            };
            Ok(Command::Folder { name, parent_id })
        }
        "folders" => Ok(Command::Folders),
        "import" => Ok(Command::Import {
            document_id: document_arg(args, 2)?,
            folder: arg(args, 3, "folder path")?.to_string(),
        }),
        "rescan" => Ok(Command::Rescan {
            document_id: document_arg(args, 2)?,
            index: number_arg(args, 3, "page index")?,
            image: PathBuf::from(arg(args, 4, "image path")?),
        }),
        other => Err(CommandError::Usage(format!("unknown command: {other}"))),
    }
}

fn parse_edit_change(raw: &str) -> Result<EditChange, CommandError> {
    if raw == "reset" {
        return Ok(EditChange::Reset);
    }
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CommandError::Usage(format!("expected key=value, got {raw}")));
    };
    let invalid = || CommandError::Usage(format!("invalid value for {key}: {value}"));
    let float = || value.parse::<f32>().map_err(|_| invalid());

    match key {
        "rotate" => {
            let degrees = value.parse::<i32>().map_err(|_| invalid())?;
            Rotation::try_from(degrees)
                .map(EditChange::Rotate)
                .map_err(|_| invalid())
        }
        "filter" => match value {
            "original" => Ok(EditChange::Filter(FilterMode::Original)),
            "gray" | "grey" => Ok(EditChange::Filter(FilterMode::Gray)),
            "bw" | "black_and_white" => Ok(EditChange::Filter(FilterMode::BlackAndWhite)),
            "boost" | "color_boost" => Ok(EditChange::Filter(FilterMode::ColorBoost)),
            _ => Err(invalid()),
        },
        "contrast" => Ok(EditChange::Contrast(float()?)),
        "brightness" => Ok(EditChange::Brightness(float()?)),
        "sharpen" => Ok(EditChange::Sharpen(float()?)),
        "denoise" => Ok(EditChange::Denoise(float()?)),
        "deskew" => Ok(EditChange::Deskew(float()?)),
        "crop" if value == "none" => Ok(EditChange::Crop(None)),
        "crop" => {
            let parts = value
                .split(',')
                .map(|part| part.trim().parse::<u32>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?;
            let [left, top, width, height] = parts[..] else {
                return Err(invalid());
            };
            Ok(EditChange::Crop(Some(CropRect {
                left,
                top,
                width,
                height,
            })))
        }
        other => Err(CommandError::Usage(format!("unknown edit key: {other}"))),
    }
}

/// Layers each change onto the current record with `EditOperation::merge`.
/// A change back to a field's identity value cannot win a merge, so that
/// one is assigned directly.
fn apply_changes(current: EditOperation, changes: &[EditChange]) -> EditOperation {
    changes.iter().fold(current, |edit, change| {
        let delta = assign(EditOperation::identity(), change);
        match change {
            EditChange::Reset => EditOperation::identity(),
            _ if delta.is_identity() => assign(edit, change),
            _ => EditOperation::merge(&edit, &delta),
        }
    })
}

fn assign(mut edit: EditOperation, change: &EditChange) -> EditOperation {
    match change {
        EditChange::Reset => return EditOperation::identity(),
        EditChange::Rotate(rotation) => edit.rotate = *rotation,
        EditChange::Filter(mode) => edit.filter.mode = *mode,
        EditChange::Contrast(value) => edit.filter.contrast = *value,
        EditChange::Brightness(value) => edit.filter.brightness = *value,
        EditChange::Sharpen(value) => edit.filter.sharpen = *value,
        EditChange::Denoise(value) => edit.denoise = *value,
        EditChange::Deskew(value) => edit.deskew = *value,
        EditChange::Crop(crop) => edit.crop = *crop,
    }
    edit
}

fn run_command(command: Command, app: &App, config: &AppConfig) -> Result<(), CommandError> {
    let service = &app.service;
    match command {
        Command::New { title } => {
            let document = service
                .create_document(CreateDocumentCommand {
                    title,
                    folder_id: None,
                    labels: Vec::new(),
                })
                .map_err(runtime("create"))?;
            println!("{}", present_document_row(&document));
        }
        Command::List => {
            let documents = service
                .list_documents(ListDocumentsCommand)
                .map_err(runtime("list"))?;
            if documents.is_empty() {
                println!("no documents in catalog");
            }
            for document in documents {
                println!("{}", present_document_row(&document));
            }
        }
        Command::Pages { document_id } => {
            let document = service
                .open_document(OpenDocumentCommand {
                    document_id: document_id.clone(),
                })
                .map_err(runtime("open"))?;
            println!("{}", present_document_row(&document));
            for page in service
                .list_pages(ListPagesCommand { document_id })
                .map_err(runtime("pages"))?
            {
                println!("{}", present_page_row(&page));
            }
        }
        Command::Add {
            document_id,
            image,
            index,
        } => {
            let page = service
                .add_page(AddPageCommand {
                    document_id,
                    source: PageSource::File(image),
                    index,
                    dpi: config.default_dpi,
                })
                .map_err(runtime("add"))?;
            println!("{}", present_page_row(&page));
        }
        Command::Move {
            document_id,
            from,
            to,
        } => {
            let document = service
                .reorder_page(ReorderPageCommand {
                    document_id,
                    from,
                    to,
                })
                .map_err(runtime("move"))?;
            println!("{}", present_document_row(&document));
        }
        Command::Delete { document_id, index } => {
            let document = service
                .delete_page(DeletePageCommand { document_id, index })
                .map_err(runtime("delete"))?;
            println!("{}", present_document_row(&document));
        }
        Command::Edit {
            document_id,
            index,
            changes,
        } => {
            let current = service
                .show_page_edit(ShowPageEditCommand {
                    document_id: document_id.clone(),
                    index,
                })
                .map_err(runtime("edit"))?;
            let edit = apply_changes(current, &changes);
            service
                .set_page_edit(SetPageEditCommand {
                    document_id,
                    index,
                    edit,
                })
                .map_err(runtime("edit"))?;
            println!("{}", present_edit(&edit));
        }
        Command::ShowEdit { document_id, index } => {
            let edit = service
                .show_page_edit(ShowPageEditCommand { document_id, index })
                .map_err(runtime("show-edit"))?;
            println!("{}", present_edit(&edit));
        }
        Command::Render { document_id, index } => {
            let (tx, rx) = mpsc::channel();
            app.renders
                .submit_persist(document_id, index, config.final_quality, move |result| {
                    let _ = tx.send(result);
                });
            let outcome = rx
                .recv()
                .map_err(|_| CommandError::Runtime("render did not report back".to_string()))?
                .map_err(runtime("render"))?;
            println!("{}", present_render_outcome(&outcome));
        }
        Command::Thumbs { document_id } => {
            let report = app.run_job(Job::Thumbnails {
                document_id,
                page_index: None,
                max_edge: config.thumbnail_edge,
            })?;
            println!("{}", present_job_report(&report));
        }
        Command::Export { document_id } => {
            let report = app.run_job(Job::Export {
                document_id,
                settings: ExportSettings {
                    quality: config.final_quality,
                    ..ExportSettings::default()
                },
            })?;
            println!("{}", present_job_report(&report));
        }
        Command::Clean { max_bytes } => {
            let report = app.run_job(Job::CleanCache {
                max_bytes: max_bytes.unwrap_or(config.cache_quota_bytes),
            })?;
            println!("{}", present_job_report(&report));
        }
        Command::Status {
            document_id,
            status,
        } => {
            let document = service
                .set_document_status(SetDocumentStatusCommand {
                    document_id,
                    status,
                })
                .map_err(runtime("status change"))?;
            println!("{}", present_document_row(&document));
        }
        Command::Purge { document_id } => {
            service
                .purge_document(PurgeDocumentCommand {
                    document_id: document_id.clone(),
                })
                .map_err(runtime("purge"))?;
            println!("purged {document_id}");
        }
        Command::Folder { name, parent_id } => {
            let folder = service
                .create_folder(CreateFolderCommand { name, parent_id })
                .map_err(runtime("folder"))?;
            println!("{}", present_folder_row(&folder));
        }
        Command::Folders => {
            for folder in service
                .list_folders(ListFoldersCommand)
                .map_err(runtime("folders"))?
            {
                println!("{}", present_folder_row(&folder));
            }
        }
        Command::Import {
            document_id,
            folder,
        } => {
            let summary = service
                .import_folder(ImportFolderCommand {
                    document_id,
                    folder,
                    dpi: config.default_dpi,
                })
                .map_err(runtime("import"))?;
            println!("{}", present_import_summary(&summary));
        }
        Command::Rescan {
            document_id,
            index,
            image,
        } => {
            let page = service
                .replace_original(ReplaceOriginalCommand {
                    document_id,
                    index,
                    source: PageSource::File(image),
                })
                .map_err(runtime("rescan"))?;
            println!("{}", present_page_row(&page));
        }
    }
    Ok(())
}

fn print_usage() {
    println!("usage:");
    println!("  scanshelf new <title>");
    println!("  scanshelf list");
    println!("  scanshelf pages <doc>");
    println!("  scanshelf add <doc> <image> [index]");
    println!("  scanshelf import <doc> <folder>");
    println!("  scanshelf move <doc> <from> <to>");
    println!("  scanshelf delete <doc> <index>");
    println!("  scanshelf rescan <doc> <index> <image>");
    println!("  scanshelf edit <doc> <index> <key=value>...");
    println!("      keys: rotate filter contrast brightness sharpen denoise deskew crop, or reset");
    println!("  scanshelf show-edit <doc> <index>");
    println!("  scanshelf render <doc> <index>");
    println!("  scanshelf thumbs <doc>");
    println!("  scanshelf export <doc>");
    println!("  scanshelf clean [bytes]");
    println!("  scanshelf trash <doc> | restore <doc> | purge <doc>");
    println!("  scanshelf folder <name> [parent]");
    println!("  scanshelf folders");
}
